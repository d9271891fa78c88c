use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 보드 한 변의 칸 수
pub const BOARD_SIZE: i32 = 8;

/// 나이트 도약 오프셋 (row, col)
pub const KNIGHT_OFFSETS: [(i32, i32); 8] = [
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];

/// 킹 이동 오프셋 (주변 8칸)
pub const KING_OFFSETS: [(i32, i32); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1), (0, 1),
    (1, -1), (1, 0), (1, 1),
];

/// 룩 슬라이드 방향
pub const ROOK_DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// 비숍 슬라이드 방향
pub const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// 퀸 슬라이드 방향 (룩 + 비숍)
pub const QUEEN_DIRECTIONS: [(i32, i32); 8] = [
    (0, 1), (0, -1), (1, 0), (-1, 0),
    (1, 1), (1, -1), (-1, 1), (-1, -1),
];

/// 칸 표기 파싱 오류
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareError {
    #[error("잘못된 칸 표기입니다: {0:?}")]
    InvalidNotation(String),
    #[error("보드 밖 좌표입니다: ({row}, {col})")]
    OffBoard { row: i32, col: i32 },
}

/// 보드 좌표 (0-indexed: row=0~7, col=0~7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub row: i32, // 0=8랭크(흑 진영), 7=1랭크(백 진영)
    pub col: i32, // 0=a, 7=h
}

impl Square {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// 보드 안의 좌표인지
    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.row < BOARD_SIZE && self.col >= 0 && self.col < BOARD_SIZE
    }

    /// (dr, dc)만큼 떨어진 칸. 보드 밖일 수 있다.
    pub fn offset(self, dr: i32, dc: i32) -> Self {
        Self { row: self.row + dr, col: self.col + dc }
    }

    /// "e2" 같은 문자열에서 파싱
    pub fn from_algebraic(s: &str) -> Result<Self, SquareError> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(SquareError::InvalidNotation(s.to_string()));
        }
        let col = bytes[0] as i32 - b'a' as i32;
        let rank = bytes[1] as i32 - b'0' as i32;
        let square = Self { row: BOARD_SIZE - rank, col };
        if (1..=BOARD_SIZE).contains(&rank) && square.is_valid() {
            Ok(square)
        } else {
            Err(SquareError::InvalidNotation(s.to_string()))
        }
    }

    /// 체스 표기법으로 변환. 보드 밖 칸은 좌표 그대로 적는다.
    pub fn to_algebraic(&self) -> String {
        if !self.is_valid() {
            return format!("({}, {})", self.row, self.col);
        }
        let file = (b'a' + self.col as u8) as char;
        let rank = BOARD_SIZE - self.row;
        format!("{}{}", file, rank)
    }

    /// 검증된 칸 생성
    pub fn checked(row: i32, col: i32) -> Result<Self, SquareError> {
        let square = Self::new(row, col);
        if square.is_valid() {
            Ok(square)
        } else {
            Err(SquareError::OffBoard { row, col })
        }
    }

    /// 64칸 전체 (row-major)
    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Square::new(row, col)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

impl FromStr for Square {
    type Err = SquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_algebraic(s)
    }
}

/// 진영. 사람은 백, 상대(AI)는 흑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// 폰의 전진 방향 (백은 row 감소, 흑은 row 증가)
    pub fn forward(self) -> i32 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// 폰 시작 랭크
    pub fn pawn_start_row(self) -> i32 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    /// 두 글자 코드의 앞 글자 ('w' / 'b')
    pub fn code(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

/// 기물 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// 두 글자 코드의 뒷 글자
    pub fn code(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    pub fn from_code(c: char) -> Option<PieceKind> {
        match c {
            'P' => Some(PieceKind::Pawn),
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// CSS 클래스 이름으로 쓰이는 소문자 이름
    pub fn name(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }

    /// 슬라이드 기물의 방향 목록. 슬라이드가 아니면 None
    pub fn slide_directions(self) -> Option<&'static [(i32, i32)]> {
        match self {
            PieceKind::Rook => Some(&ROOK_DIRECTIONS),
            PieceKind::Bishop => Some(&BISHOP_DIRECTIONS),
            PieceKind::Queen => Some(&QUEEN_DIRECTIONS),
            _ => None,
        }
    }
}

/// 기물
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    /// "wP", "bK" 형태의 코드
    pub fn code(&self) -> String {
        format!("{}{}", self.color.code(), self.kind.code())
    }

    pub fn from_code(code: &str) -> Option<Piece> {
        let mut chars = code.chars();
        let color = match chars.next()? {
            'w' => Color::White,
            'b' => Color::Black,
            _ => return None,
        };
        let kind = PieceKind::from_code(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Piece { color, kind })
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.color.code(), self.kind.code())
    }
}

/// 이동 명령. 기록(히스토리) 밖에서는 보관하지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>, // 도착 칸에 있던 적 기물
}

impl Move {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.piece, self.from, self.to)
    }
}

/// 초기 배치 (row 0 = 흑 백랭크)
const INITIAL_LAYOUT: [[&str; 8]; 8] = [
    ["bR", "bN", "bB", "bQ", "bK", "bB", "bN", "bR"],
    ["bP", "bP", "bP", "bP", "bP", "bP", "bP", "bP"],
    ["", "", "", "", "", "", "", ""],
    ["", "", "", "", "", "", "", ""],
    ["", "", "", "", "", "", "", ""],
    ["", "", "", "", "", "", "", ""],
    ["wP", "wP", "wP", "wP", "wP", "wP", "wP", "wP"],
    ["wR", "wN", "wB", "wQ", "wK", "wB", "wN", "wR"],
];

/// 8x8 보드. 칸마다 기물 하나 또는 빈 칸
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Piece>; 8]; 8],
}

impl Board {
    /// 빈 보드
    pub fn empty() -> Self {
        Self::default()
    }

    /// 표준 시작 배치
    pub fn initial() -> Self {
        let mut board = Self::empty();
        for (row, codes) in INITIAL_LAYOUT.iter().enumerate() {
            for (col, code) in codes.iter().enumerate() {
                board.cells[row][col] = Piece::from_code(code);
            }
        }
        board
    }

    /// 특정 위치의 기물. 보드 밖이거나 빈 칸이면 None
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        if !square.is_valid() {
            return None;
        }
        self.cells[square.row as usize][square.col as usize]
    }

    /// 보드 안의 빈 칸인지
    pub fn is_empty(&self, square: Square) -> bool {
        square.is_valid() && self.piece_at(square).is_none()
    }

    /// 칸 내용을 바꾸고 이전 내용을 반환. 보드 밖은 무시
    pub fn set(&mut self, square: Square, piece: Option<Piece>) -> Option<Piece> {
        if !square.is_valid() {
            return None;
        }
        std::mem::replace(&mut self.cells[square.row as usize][square.col as usize], piece)
    }

    pub fn put(&mut self, square: Square, piece: Piece) -> Option<Piece> {
        self.set(square, Some(piece))
    }

    pub fn remove(&mut self, square: Square) -> Option<Piece> {
        self.set(square, None)
    }

    /// from의 기물을 to로 옮긴다. to에 있던 기물은 덮어써지고 반환된다.
    pub fn relocate(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.remove(from);
        self.set(to, piece)
    }

    /// 보드 위의 모든 기물 (row-major)
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    /// 해당 진영 기물이 있는 칸들
    pub fn squares_of(&self, color: Color) -> Vec<Square> {
        self.pieces()
            .filter(|(_, p)| p.color == color)
            .map(|(sq, _)| sq)
            .collect()
    }

    /// 해당 기물이 보드 위에 하나라도 있는지
    pub fn contains(&self, piece: Piece) -> bool {
        self.pieces().any(|(_, p)| p == piece)
    }

    /// 렌더링용 두 글자 코드 (빈 칸은 "")
    pub fn codes(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(|p| p.code()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.cells.iter().enumerate() {
            write!(f, "{} ", BOARD_SIZE - row as i32)?;
            for cell in cells {
                match cell {
                    Some(p) => write!(f, "{} ", p)?,
                    None => write!(f, ".. ")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "  a  b  c  d  e  f  g  h")
    }
}

/// 해당 칸 기물의 의사합법수(pseudo-legal) 목록.
///
/// 자기 킹이 잡힐 수 있는 수도 걸러내지 않는다. 빈 칸이면 빈 목록.
pub fn pseudo_legal_moves(board: &Board, from: Square) -> Vec<Move> {
    let piece = match board.piece_at(from) {
        Some(p) => p,
        None => return Vec::new(),
    };

    let targets = match piece.kind {
        PieceKind::Pawn => pawn_targets(board, from, piece.color),
        PieceKind::Knight => step_targets(board, from, piece.color, &KNIGHT_OFFSETS),
        PieceKind::King => step_targets(board, from, piece.color, &KING_OFFSETS),
        PieceKind::Rook | PieceKind::Bishop | PieceKind::Queen => {
            let directions = piece.kind.slide_directions().unwrap_or(&[]);
            slide_targets(board, from, piece.color, directions)
        }
    };

    debug!("{} {}: {} moves", piece, from, targets.len());

    targets
        .into_iter()
        .map(|to| Move { from, to, piece, captured: board.piece_at(to) })
        .collect()
}

/// 도착 칸만 필요한 경우
pub fn destinations(board: &Board, from: Square) -> Vec<Square> {
    pseudo_legal_moves(board, from).into_iter().map(|m| m.to).collect()
}

/// 한 진영의 모든 의사합법수
pub fn moves_for(board: &Board, color: Color) -> Vec<Move> {
    board
        .squares_of(color)
        .into_iter()
        .flat_map(|sq| pseudo_legal_moves(board, sq))
        .collect()
}

fn is_enemy(board: &Board, square: Square, color: Color) -> bool {
    matches!(board.piece_at(square), Some(p) if p.color != color)
}

/// 폰: 전진 1칸, 시작 랭크에서 2칸, 전방 대각 잡기
fn pawn_targets(board: &Board, from: Square, color: Color) -> Vec<Square> {
    let mut targets = Vec::new();
    let dir = color.forward();

    let one = from.offset(dir, 0);
    if board.is_empty(one) {
        targets.push(one);
        let two = from.offset(dir * 2, 0);
        if from.row == color.pawn_start_row() && board.is_empty(two) {
            targets.push(two);
        }
    }

    for dc in [-1, 1] {
        let diag = from.offset(dir, dc);
        if is_enemy(board, diag, color) {
            targets.push(diag);
        }
    }

    targets
}

/// 나이트/킹: 고정 오프셋. 보드 안이고 아군이 없으면 가능
fn step_targets(board: &Board, from: Square, color: Color, offsets: &[(i32, i32)]) -> Vec<Square> {
    offsets
        .iter()
        .map(|&(dr, dc)| from.offset(dr, dc))
        .filter(|sq| sq.is_valid())
        .filter(|&sq| !matches!(board.piece_at(sq), Some(p) if p.color == color))
        .collect()
}

/// 룩/비숍/퀸: 막힐 때까지 슬라이드
fn slide_targets(board: &Board, from: Square, color: Color, directions: &[(i32, i32)]) -> Vec<Square> {
    let mut targets = Vec::new();

    for &(dr, dc) in directions {
        let mut sq = from.offset(dr, dc);
        while sq.is_valid() {
            match board.piece_at(sq) {
                None => targets.push(sq),
                Some(p) => {
                    // 적이면 잡고 멈춤, 아군이면 그냥 멈춤
                    if p.color != color {
                        targets.push(sq);
                    }
                    break;
                }
            }
            sq = sq.offset(dr, dc);
        }
    }

    targets
}
