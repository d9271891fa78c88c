use std::collections::HashMap;

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// 보드/행마 규칙은 rules 크레이트에서 재export
pub use rules::{
    destinations, moves_for, pseudo_legal_moves, Board, Color, Move, Piece, PieceKind, Square,
    SquareError,
};

/// 사람 플레이어 진영
pub const HUMAN: Color = Color::White;
/// 랜덤 상대 진영
pub const OPPONENT: Color = Color::Black;

/// 시드가 주어지지 않았을 때 쓰는 기본 시드
pub const DEFAULT_SEED: u64 = 0x5EED_C0DE_CAFE_BABE;

/// 상대 수 선택에 쓰는 난수 생성기
pub type OpponentRng = ChaCha8Rng;

/// 게임 설정 (JS 객체에서 역직렬화)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// 사람 수 이후 상대가 두기까지의 대기 시간
    pub opponent_delay_ms: u32,
    pub seed: Option<u64>,
    /// 누적 승수를 저장하는 키
    pub score_key: String,
    pub guest_name: String,
    pub name_prompt: String,
    pub default_name: String,
    pub debug: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            opponent_delay_ms: 500,
            seed: None,
            score_key: "chess_score".to_string(),
            guest_name: "Guest".to_string(),
            name_prompt: "Enter your name:".to_string(),
            default_name: "Player 1".to_string(),
            debug: false,
        }
    }
}

/// 게임 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    HumanWins,
    OpponentWins,
}

impl GameResult {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameResult::Ongoing)
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::Ongoing => None,
            GameResult::HumanWins => Some(HUMAN),
            GameResult::OpponentWins => Some(OPPONENT),
        }
    }

    /// 상태 표시줄과 알림에 쓰는 문구
    pub fn message(&self) -> &'static str {
        match self {
            GameResult::Ongoing => "",
            GameResult::HumanWins => "You Win!",
            GameResult::OpponentWins => "AI Wins!",
        }
    }
}

/// 대기 중인 상대 차례 하나를 가리키는 표
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnTicket(pub u32);

/// 컨트롤러 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    AwaitingSelection,
    AwaitingDestination {
        selected: Square,
        destinations: Vec<Square>,
    },
    OpponentTurn {
        ticket: TurnTicket,
    },
    Ended(GameResult),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingSelection => "awaiting-selection",
            Phase::AwaitingDestination { .. } => "awaiting-destination",
            Phase::OpponentTurn { .. } => "opponent-turn",
            Phase::Ended(_) => "ended",
        }
    }
}

/// 칸 강조 종류 (CSS 클래스 이름과 같다)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Highlight {
    Selected,
    PossibleMove,
}

/// 칸 클릭 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Ignored,
    Selected {
        square: Square,
        destinations: Vec<Square>,
    },
    Deselected,
    Moved {
        mv: Move,
        opponent: Option<TurnTicket>,
    },
}

/// 상대 차례 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentOutcome {
    /// 이미 취소되었거나 다른 차례의 표
    Stale,
    Moved(Move),
    NoLegalMoves,
}

/// 점수 저장소 오류
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("저장소를 사용할 수 없습니다: {0}")]
    Unavailable(String),
    #[error("저장된 값이 정수가 아닙니다 ({key} = {value:?})")]
    Corrupt { key: String, value: String },
}

/// 수 제출 오류
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("게임이 이미 끝났습니다")]
    GameOver,
    #[error("자신의 턴이 아닙니다")]
    NotYourTurn,
    #[error("{0}에 자신의 기물이 없습니다")]
    NotYourPiece(Square),
    #[error("{from} -> {to} 는 둘 수 없는 수입니다")]
    IllegalMove { from: Square, to: Square },
}

/// 누적 승수 저장소 (브라우저에서는 localStorage)
pub trait ScoreStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StorageError>;
    fn set(&mut self, key: &str, value: i64) -> Result<(), StorageError>;
}

/// 메모리 저장소
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    values: HashMap<String, i64>,
}

impl ScoreStore for MemoryScoreStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StorageError> {
        Ok(self.values.get(key).copied())
    }

    fn set(&mut self, key: &str, value: i64) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// 화면 쪽 협력자. 컨트롤러는 이 trait을 통해서만 UI에 접근한다.
pub trait Presenter {
    fn render_board(&mut self, board: &Board, turn_label: &str);
    fn highlight(&mut self, square: Square, kind: Highlight);
    fn clear_highlights(&mut self);
    fn append_move_log(&mut self, entry: &str);
    fn clear_move_log(&mut self);
    fn set_status(&mut self, status: &str);
    fn show_leaderboard(&mut self, name: &str, score: i64);
    fn prompt_for_name(&mut self, message: &str, default: &str) -> Option<String>;
    fn notify(&mut self, message: &str);
}

/// JS로 넘겨 렌더링할 화면 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PresenterEvent {
    RenderBoard { board: Vec<Vec<String>>, turn_label: String },
    Highlight { square: String, kind: Highlight },
    ClearHighlights,
    AppendMoveLog { entry: String },
    ClearMoveLog,
    SetStatus { status: String },
    ShowLeaderboard { name: String, score: i64 },
    Notify { message: String },
}

/// 이벤트를 쌓아두는 Presenter. 이름 입력에는 미리 정한 값을 돌려준다.
#[derive(Debug, Clone, Default)]
pub struct BufferedPresenter {
    events: Vec<PresenterEvent>,
    name_reply: Option<String>,
    pub prompts: usize,
}

impl BufferedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: &str) -> Self {
        Self { name_reply: Some(name.to_string()), ..Self::default() }
    }

    pub fn events(&self) -> &[PresenterEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PresenterEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn push(&mut self, event: PresenterEvent) {
        self.events.push(event);
    }
}

impl Presenter for BufferedPresenter {
    fn render_board(&mut self, board: &Board, turn_label: &str) {
        self.push(PresenterEvent::RenderBoard {
            board: board.codes(),
            turn_label: turn_label.to_string(),
        });
    }

    fn highlight(&mut self, square: Square, kind: Highlight) {
        self.push(PresenterEvent::Highlight { square: square.to_algebraic(), kind });
    }

    fn clear_highlights(&mut self) {
        self.push(PresenterEvent::ClearHighlights);
    }

    fn append_move_log(&mut self, entry: &str) {
        self.push(PresenterEvent::AppendMoveLog { entry: entry.to_string() });
    }

    fn clear_move_log(&mut self) {
        self.push(PresenterEvent::ClearMoveLog);
    }

    fn set_status(&mut self, status: &str) {
        self.push(PresenterEvent::SetStatus { status: status.to_string() });
    }

    fn show_leaderboard(&mut self, name: &str, score: i64) {
        self.push(PresenterEvent::ShowLeaderboard { name: name.to_string(), score });
    }

    fn prompt_for_name(&mut self, _message: &str, _default: &str) -> Option<String> {
        self.prompts += 1;
        self.name_reply.clone()
    }

    fn notify(&mut self, message: &str) {
        self.push(PresenterEvent::Notify { message: message.to_string() });
    }
}

/// 수 하나 직전의 보드와 그 수를 둔 쪽
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub mover: Color,
    pub board: Board,
}

/// 한 판의 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub turn: Color,
    pub phase: Phase,
    /// 수마다 한 장씩 쌓이는 보드 스냅샷
    pub history: Vec<Snapshot>,
    pub move_log: Vec<String>,
    pub status: String,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_board(Board::initial())
    }

    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            turn: HUMAN,
            phase: Phase::AwaitingSelection,
            history: Vec::new(),
            move_log: Vec::new(),
            status: String::new(),
        }
    }

    pub fn ended(&self) -> bool {
        matches!(self.phase, Phase::Ended(_))
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// 킹 포획 기준 승패 판정 (체크메이트는 보지 않는다)
pub fn evaluate_win(board: &Board) -> GameResult {
    if !board.contains(Piece::new(HUMAN, PieceKind::King)) {
        GameResult::OpponentWins
    } else if !board.contains(Piece::new(OPPONENT, PieceKind::King)) {
        GameResult::HumanWins
    } else {
        GameResult::Ongoing
    }
}

/// 게임 진행 컨트롤러
pub struct GameController<P, S, R = OpponentRng> {
    state: GameState,
    presenter: P,
    scores: S,
    rng: R,
    config: GameConfig,
    player_name: Option<String>,
    last_ticket: u32,
}

impl<P: Presenter, S: ScoreStore> GameController<P, S, OpponentRng> {
    /// 설정의 시드(없으면 DEFAULT_SEED)로 난수 생성기를 만든다
    pub fn seeded(config: GameConfig, presenter: P, scores: S) -> Self {
        let rng = OpponentRng::seed_from_u64(config.seed.unwrap_or(DEFAULT_SEED));
        Self::new(config, presenter, scores, rng)
    }
}

impl<P: Presenter, S: ScoreStore, R: Rng> GameController<P, S, R> {
    pub fn new(config: GameConfig, presenter: P, scores: S, rng: R) -> Self {
        Self {
            state: GameState::new(),
            presenter,
            scores,
            rng,
            config,
            player_name: None,
            last_ticket: 0,
        }
    }

    // === 조회 ===

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    pub fn turn(&self) -> Color {
        self.state.turn
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn status(&self) -> &str {
        &self.state.status
    }

    pub fn move_log(&self) -> &[String] {
        &self.state.move_log
    }

    pub fn history_len(&self) -> usize {
        self.state.history.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.state.history.is_empty()
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended()
    }

    pub fn result(&self) -> GameResult {
        match self.state.phase {
            Phase::Ended(result) => result,
            _ => GameResult::Ongoing,
        }
    }

    /// 현재 선택된 칸
    pub fn selected(&self) -> Option<Square> {
        match &self.state.phase {
            Phase::AwaitingDestination { selected, .. } => Some(*selected),
            _ => None,
        }
    }

    pub fn pending_opponent_turn(&self) -> Option<TurnTicket> {
        match self.state.phase {
            Phase::OpponentTurn { ticket } => Some(ticket),
            _ => None,
        }
    }

    pub fn turn_label(&self) -> &'static str {
        if self.state.turn == HUMAN {
            "White (You)"
        } else {
            "AI (Thinking...)"
        }
    }

    pub fn player_name(&self) -> &str {
        self.player_name.as_deref().unwrap_or(&self.config.guest_name)
    }

    pub fn set_player_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.player_name = Some(name.to_string());
            self.load_leaderboard();
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn scores(&self) -> &S {
        &self.scores
    }

    /// 특정 칸 기물의 의사합법수
    pub fn legal_moves_at(&self, square: Square) -> Vec<Move> {
        pseudo_legal_moves(&self.state.board, square)
    }

    /// 누적 승수 (없으면 0)
    pub fn score(&self) -> i64 {
        match self.scores.get(&self.config.score_key) {
            Ok(score) => score.unwrap_or(0),
            Err(err) => {
                warn!("점수를 읽지 못했습니다: {}", err);
                0
            }
        }
    }

    // === 게임 진행 ===

    /// 새 게임. 보드/기록/로그를 초기화하고 대기 중인 상대 차례를 무효화한다.
    pub fn new_game(&mut self) {
        self.state = GameState::new();

        if self.player_name.is_none() {
            let reply = self
                .presenter
                .prompt_for_name(&self.config.name_prompt, &self.config.default_name);
            if let Some(name) = reply.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
                self.player_name = Some(name);
            }
        }

        info!("새 게임 시작: {}", self.player_name());
        self.presenter.clear_move_log();
        self.presenter.set_status("");
        self.load_leaderboard();
        self.render();
    }

    /// 임의 배치로 시작 (백 차례, 기록 없음)
    pub fn set_position(&mut self, board: Board) {
        self.state = GameState::with_board(board);
        self.presenter.clear_move_log();
        self.presenter.set_status("");
        self.render();
    }

    /// 칸 클릭 처리. 잘못된 입력은 조용히 무시하거나 선택을 해제한다.
    pub fn on_square_clicked(&mut self, square: Square) -> ClickOutcome {
        if self.state.ended() || self.state.turn != HUMAN {
            return ClickOutcome::Ignored;
        }

        // 아군 기물이면 (재)선택
        if matches!(self.state.board.piece_at(square), Some(p) if p.color == HUMAN) {
            return self.select(square);
        }

        let (from, legal) = match &self.state.phase {
            Phase::AwaitingDestination { selected, destinations } => {
                (*selected, destinations.contains(&square))
            }
            _ => return ClickOutcome::Ignored,
        };

        if !legal {
            self.deselect();
            return ClickOutcome::Deselected;
        }

        match self.play_human_move(from, square) {
            Some((mv, opponent)) => ClickOutcome::Moved { mv, opponent },
            None => ClickOutcome::Ignored,
        }
    }

    /// 사람 수를 직접 제출. 상대 차례는 돌려받은 표로 따로 처리한다.
    pub fn submit_human_move(&mut self, from: Square, to: Square) -> Result<Option<TurnTicket>, GameError> {
        if self.state.ended() {
            return Err(GameError::GameOver);
        }
        if self.state.turn != HUMAN {
            return Err(GameError::NotYourTurn);
        }
        match self.state.board.piece_at(from) {
            Some(p) if p.color == HUMAN => {}
            _ => return Err(GameError::NotYourPiece(from)),
        }
        if !destinations(&self.state.board, from).contains(&to) {
            return Err(GameError::IllegalMove { from, to });
        }

        let (_, ticket) = self
            .play_human_move(from, to)
            .ok_or(GameError::NotYourPiece(from))?;
        Ok(ticket)
    }

    /// 수 실행: 스냅샷 저장, 기물 이동(도착 칸은 덮어씀), 로그, 턴 교대, 승패 확인.
    ///
    /// 합법성은 검사하지 않는다. from이 빈 칸이면 아무 일도 하지 않는다.
    pub fn execute_move(&mut self, from: Square, to: Square) -> Option<Move> {
        let piece = self.state.board.piece_at(from)?;
        if !to.is_valid() {
            return None;
        }

        self.state.history.push(Snapshot {
            mover: piece.color,
            board: self.state.board.clone(),
        });
        let captured = self.state.board.relocate(from, to);
        let mv = Move { from, to, piece, captured };

        let entry = mv.to_string();
        debug!("{}", entry);
        self.presenter.append_move_log(&entry);
        self.state.move_log.push(entry);

        self.state.turn = self.state.turn.opponent();
        if matches!(self.state.phase, Phase::AwaitingDestination { .. }) {
            self.state.phase = Phase::AwaitingSelection;
        }

        self.check_win_condition();
        self.render();
        Some(mv)
    }

    /// 대기 중인 상대 차례를 처리한다.
    ///
    /// 상대 기물 칸을 섞은 뒤 수가 있는 첫 기물을 골라 그 수 중 하나를 무작위로 둔다.
    pub fn resolve_opponent_turn(&mut self, ticket: TurnTicket) -> OpponentOutcome {
        if self.pending_opponent_turn() != Some(ticket) {
            debug!("만료된 상대 차례 표: {:?}", ticket);
            return OpponentOutcome::Stale;
        }

        let mut squares = self.state.board.squares_of(OPPONENT);
        squares.shuffle(&mut self.rng);

        let board = &self.state.board;
        let candidates = squares
            .iter()
            .map(|&sq| pseudo_legal_moves(board, sq))
            .find(|moves| !moves.is_empty());

        let outcome = match candidates.and_then(|moves| moves.choose(&mut self.rng).copied()) {
            Some(mv) => {
                self.execute_move(mv.from, mv.to);
                OpponentOutcome::Moved(mv)
            }
            None => {
                info!("상대가 둘 수 있는 수가 없습니다");
                self.check_win_condition();
                OpponentOutcome::NoLegalMoves
            }
        };

        if !self.state.ended() {
            self.state.turn = HUMAN;
            self.state.phase = Phase::AwaitingSelection;
            if outcome == OpponentOutcome::NoLegalMoves {
                self.render();
            }
        }

        outcome
    }

    /// 대기 중인 상대 차례를 취소하고 사람에게 차례를 돌려준다
    pub fn cancel_opponent_turn(&mut self) -> bool {
        if self.pending_opponent_turn().is_none() {
            return false;
        }
        self.state.turn = HUMAN;
        self.state.phase = Phase::AwaitingSelection;
        self.render();
        true
    }

    /// 되돌리기. 마지막 수가 상대 응수였으면 사람 수 이전까지 두 장을 되돌린다.
    ///
    /// 마지막 수를 둔 쪽은 스냅샷에 기록된 값으로 판단한다. 응수가 취소됐거나
    /// 상대가 둘 수가 없었던 경우에도 차례 표시는 사람이므로 그것으로는 알 수 없다.
    pub fn undo(&mut self) -> bool {
        let history = &mut self.state.history;
        let last_mover = match history.last() {
            Some(snapshot) => snapshot.mover,
            None => return false,
        };

        let restored = if history.len() >= 2 && last_mover == OPPONENT {
            history.pop();
            history.pop()
        } else {
            history.pop()
        };

        if let Some(snapshot) = restored {
            self.state.board = snapshot.board;
        }
        self.state.turn = HUMAN;
        self.state.phase = Phase::AwaitingSelection;
        self.state.status.clear();

        info!("되돌리기 (남은 기록 {})", self.state.history.len());
        self.presenter.set_status("");
        self.render();
        true
    }

    pub fn evaluate_win(&self) -> GameResult {
        evaluate_win(&self.state.board)
    }

    /// 승패 확인 후 끝났으면 종료 처리
    pub fn check_win_condition(&mut self) -> GameResult {
        let result = self.evaluate_win();
        if result.is_over() && !self.state.ended() {
            self.end_game(result);
        }
        result
    }

    /// 리더보드 갱신
    pub fn load_leaderboard(&mut self) {
        let score = self.score();
        let name = self.player_name().to_string();
        self.presenter.show_leaderboard(&name, score);
    }

    // === 내부 ===

    fn select(&mut self, square: Square) -> ClickOutcome {
        let destinations = destinations(&self.state.board, square);

        self.presenter.clear_highlights();
        self.presenter.highlight(square, Highlight::Selected);
        for &to in &destinations {
            self.presenter.highlight(to, Highlight::PossibleMove);
        }

        self.state.phase = Phase::AwaitingDestination {
            selected: square,
            destinations: destinations.clone(),
        };
        ClickOutcome::Selected { square, destinations }
    }

    fn deselect(&mut self) {
        self.presenter.clear_highlights();
        self.state.phase = Phase::AwaitingSelection;
    }

    fn play_human_move(&mut self, from: Square, to: Square) -> Option<(Move, Option<TurnTicket>)> {
        let mv = self.execute_move(from, to)?;
        if self.state.ended() {
            return Some((mv, None));
        }

        let ticket = self.issue_ticket();
        self.state.phase = Phase::OpponentTurn { ticket };
        Some((mv, Some(ticket)))
    }

    fn issue_ticket(&mut self) -> TurnTicket {
        self.last_ticket = self.last_ticket.wrapping_add(1);
        TurnTicket(self.last_ticket)
    }

    fn end_game(&mut self, result: GameResult) {
        let message = result.message();
        info!("게임 종료: {}", message);

        self.state.phase = Phase::Ended(result);
        self.state.status = message.to_string();
        self.presenter.set_status(message);
        self.presenter.notify(message);

        if result == GameResult::HumanWins {
            match self.bump_score() {
                Ok(score) => debug!("누적 승수 {}", score),
                Err(err) => warn!("점수를 저장하지 못했습니다: {}", err),
            }
            self.load_leaderboard();
        }
    }

    fn bump_score(&mut self) -> Result<i64, StorageError> {
        let key = self.config.score_key.clone();
        // 정수가 아닌 값은 0으로 보고 덮어쓴다
        let current = match self.scores.get(&key) {
            Ok(score) => score.unwrap_or(0),
            Err(StorageError::Corrupt { value, .. }) => {
                warn!("잘못된 점수 값 {:?}를 0으로 처리합니다", value);
                0
            }
            Err(err) => return Err(err),
        };
        let score = current + 1;
        self.scores.set(&key, score)?;
        Ok(score)
    }

    fn render(&mut self) {
        let label = self.turn_label();
        self.presenter.render_board(&self.state.board, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestController = GameController<BufferedPresenter, MemoryScoreStore>;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn config(seed: u64) -> GameConfig {
        GameConfig { seed: Some(seed), ..GameConfig::default() }
    }

    fn controller(seed: u64) -> TestController {
        let mut game = GameController::seeded(
            config(seed),
            BufferedPresenter::with_name("Tester"),
            MemoryScoreStore::default(),
        );
        game.new_game();
        game
    }

    fn board_with(pieces: &[(&str, &str)]) -> Board {
        let mut board = Board::empty();
        for (at, code) in pieces {
            board.put(sq(at), Piece::from_code(code).unwrap());
        }
        board
    }

    /// 흑 기물이 전부 막혀 둘 수가 없는 배치
    fn stuck_black() -> Board {
        board_with(&[
            ("a1", "bK"),
            ("a2", "bP"),
            ("b2", "bP"),
            ("b1", "bP"),
            ("c1", "bP"),
            ("h8", "wK"),
        ])
    }

    #[test]
    fn test_new_game_initial_state() {
        let game = controller(1);
        assert_eq!(game.board(), &Board::initial());
        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
        assert_eq!(game.history_len(), 0);
        assert!(!game.can_undo());
        assert_eq!(game.player_name(), "Tester");
        assert_eq!(game.turn_label(), "White (You)");
        assert_eq!(game.presenter().prompts, 1);
        assert!(game
            .presenter()
            .events()
            .contains(&PresenterEvent::ShowLeaderboard { name: "Tester".to_string(), score: 0 }));
    }

    #[test]
    fn test_name_prompted_once() {
        let mut game = controller(1);
        game.new_game();
        game.new_game();
        assert_eq!(game.presenter().prompts, 1);
    }

    #[test]
    fn test_guest_when_prompt_declined() {
        let mut game: TestController =
            GameController::seeded(config(1), BufferedPresenter::new(), MemoryScoreStore::default());
        game.new_game();
        assert_eq!(game.player_name(), "Guest");
        game.new_game();
        assert_eq!(game.presenter().prompts, 2);

        game.set_player_name("  ");
        assert_eq!(game.player_name(), "Guest");
        game.set_player_name("Somchai");
        assert_eq!(game.player_name(), "Somchai");
    }

    #[test]
    fn test_select_own_piece() {
        let mut game = controller(1);
        let outcome = game.on_square_clicked(sq("e2"));
        match outcome {
            ClickOutcome::Selected { square, destinations } => {
                assert_eq!(square, sq("e2"));
                assert_eq!(destinations, vec![sq("e3"), sq("e4")]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(game.selected(), Some(sq("e2")));

        let events = game.presenter().events();
        assert!(events.contains(&PresenterEvent::Highlight {
            square: "e2".to_string(),
            kind: Highlight::Selected
        }));
        assert!(events.contains(&PresenterEvent::Highlight {
            square: "e4".to_string(),
            kind: Highlight::PossibleMove
        }));
    }

    #[test]
    fn test_click_ignored_without_selection() {
        let mut game = controller(1);
        assert_eq!(game.on_square_clicked(sq("e4")), ClickOutcome::Ignored);
        assert_eq!(game.on_square_clicked(sq("e7")), ClickOutcome::Ignored);
        assert_eq!(game.on_square_clicked(Square::new(-1, 3)), ClickOutcome::Ignored);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
    }

    #[test]
    fn test_reselect_and_deselect() {
        let mut game = controller(1);
        game.on_square_clicked(sq("e2"));
        assert!(matches!(game.on_square_clicked(sq("g1")), ClickOutcome::Selected { .. }));
        assert_eq!(game.selected(), Some(sq("g1")));

        // g1 나이트는 e5로 갈 수 없다
        assert_eq!(game.on_square_clicked(sq("e5")), ClickOutcome::Deselected);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
        assert_eq!(game.history_len(), 0);
    }

    #[test]
    fn test_human_move_enters_opponent_turn() {
        let mut game = controller(1);
        game.on_square_clicked(sq("e2"));
        let outcome = game.on_square_clicked(sq("e4"));

        let ticket = match outcome {
            ClickOutcome::Moved { mv, opponent } => {
                assert_eq!(mv.from, sq("e2"));
                assert_eq!(mv.to, sq("e4"));
                opponent.unwrap()
            }
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(game.pending_opponent_turn(), Some(ticket));
        assert_eq!(game.turn(), Color::Black);
        assert_eq!(game.turn_label(), "AI (Thinking...)");
        assert_eq!(game.history_len(), 1);
        assert_eq!(game.move_log(), &["wP e2 -> e4".to_string()]);

        // 상대 차례에는 클릭 무시
        assert_eq!(game.on_square_clicked(sq("d2")), ClickOutcome::Ignored);
        assert_eq!(game.submit_human_move(sq("d2"), sq("d4")), Err(GameError::NotYourTurn));
    }

    #[test]
    fn test_submit_human_move_errors() {
        let mut game = controller(1);
        assert_eq!(
            game.submit_human_move(sq("e4"), sq("e5")),
            Err(GameError::NotYourPiece(sq("e4")))
        );
        assert_eq!(
            game.submit_human_move(sq("e7"), sq("e5")),
            Err(GameError::NotYourPiece(sq("e7")))
        );
        assert_eq!(
            game.submit_human_move(sq("e2"), sq("e5")),
            Err(GameError::IllegalMove { from: sq("e2"), to: sq("e5") })
        );
        assert_eq!(game.history_len(), 0);
        assert!(game.submit_human_move(sq("b1"), sq("c3")).unwrap().is_some());
    }

    #[test]
    fn test_execute_move_snapshot_and_log() {
        let mut a = controller(1);
        let mut b = controller(2);

        let before = a.board().clone();
        let mv = a.execute_move(sq("g1"), sq("f3")).unwrap();
        b.execute_move(sq("g1"), sq("f3"));

        assert_eq!(mv.piece, Piece::new(Color::White, PieceKind::Knight));
        assert_eq!(a.board(), b.board());
        assert_eq!(a.history_len(), 1);
        assert_eq!(a.state().history[0], Snapshot { mover: Color::White, board: before });
        assert_eq!(a.move_log().len(), 1);
        assert_eq!(a.turn(), Color::Black);
        assert!(a
            .presenter()
            .events()
            .contains(&PresenterEvent::AppendMoveLog { entry: "wN g1 -> f3".to_string() }));
    }

    #[test]
    fn test_execute_move_capture_overwrites() {
        let mut game = controller(1);
        game.set_position(board_with(&[("e1", "wK"), ("e8", "bK"), ("d1", "wR"), ("d7", "bP")]));
        let mv = game.execute_move(sq("d1"), sq("d7")).unwrap();
        assert_eq!(mv.captured, Piece::from_code("bP"));
        assert_eq!(game.board().piece_at(sq("d7")), Piece::from_code("wR"));
        assert_eq!(game.board().pieces().count(), 3);
    }

    #[test]
    fn test_execute_move_from_empty_is_noop() {
        let mut game = controller(1);
        assert_eq!(game.execute_move(sq("e4"), sq("e5")), None);
        assert_eq!(game.history_len(), 0);
        assert!(game.move_log().is_empty());
        assert_eq!(game.turn(), Color::White);
    }

    #[test]
    fn test_opponent_reply_is_pseudo_legal() {
        let mut game = controller(42);
        let ticket = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        let before = game.board().clone();

        match game.resolve_opponent_turn(ticket) {
            OpponentOutcome::Moved(mv) => {
                assert_eq!(mv.piece.color, Color::Black);
                assert!(moves_for(&before, Color::Black).contains(&mv));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
        assert_eq!(game.history_len(), 2);
        assert_eq!(game.move_log().len(), 2);
    }

    #[test]
    fn test_opponent_seeded_reproducible() {
        let play = |seed: u64| {
            let mut game = controller(seed);
            let mut replies = Vec::new();
            for (from, to) in [("e2", "e3"), ("a2", "a3"), ("h2", "h3")] {
                let ticket = game.submit_human_move(sq(from), sq(to)).unwrap().unwrap();
                replies.push(game.resolve_opponent_turn(ticket));
            }
            replies
        };
        assert_eq!(play(7), play(7));
    }

    #[test]
    fn test_stale_ticket_after_new_game() {
        let mut game = controller(1);
        let ticket = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        game.new_game();
        assert_eq!(game.resolve_opponent_turn(ticket), OpponentOutcome::Stale);
        assert_eq!(game.board(), &Board::initial());
        assert_eq!(game.history_len(), 0);
    }

    #[test]
    fn test_stale_ticket_after_undo_and_new_move() {
        let mut game = controller(1);
        let old = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        assert!(game.undo());
        let new = game.submit_human_move(sq("d2"), sq("d4")).unwrap().unwrap();
        assert_ne!(old, new);
        assert_eq!(game.resolve_opponent_turn(old), OpponentOutcome::Stale);
        assert!(matches!(game.resolve_opponent_turn(new), OpponentOutcome::Moved(_)));
        assert_eq!(game.resolve_opponent_turn(new), OpponentOutcome::Stale);
    }

    #[test]
    fn test_cancel_opponent_turn() {
        let mut game = controller(1);
        assert!(!game.cancel_opponent_turn());
        let ticket = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        assert!(game.cancel_opponent_turn());
        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.resolve_opponent_turn(ticket), OpponentOutcome::Stale);
        assert_eq!(game.history_len(), 1);
    }

    #[test]
    fn test_undo_full_round() {
        let mut game = controller(3);
        let before = game.board().clone();
        let ticket = game.submit_human_move(sq("g1"), sq("f3")).unwrap().unwrap();
        game.resolve_opponent_turn(ticket);
        assert_eq!(game.history_len(), 2);

        assert!(game.undo());
        assert_eq!(game.board(), &before);
        assert_eq!(game.history_len(), 0);
        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
    }

    #[test]
    fn test_undo_pending_reply_restores_one() {
        let mut game = controller(3);
        let t1 = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        game.resolve_opponent_turn(t1);
        let after_round = game.board().clone();

        game.submit_human_move(sq("d2"), sq("d4")).unwrap();
        assert_eq!(game.history_len(), 3);
        assert!(game.undo());
        assert_eq!(game.board(), &after_round);
        assert_eq!(game.history_len(), 2);
        assert!(game.pending_opponent_turn().is_none());
    }

    #[test]
    fn test_undo_after_cancel_restores_one() {
        let mut game = controller(3);
        let t1 = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        game.resolve_opponent_turn(t1);
        let after_round = game.board().clone();

        game.submit_human_move(sq("d2"), sq("d4")).unwrap();
        assert!(game.cancel_opponent_turn());
        assert_eq!(game.turn(), Color::White);

        // 차례 표시는 사람이지만 마지막 수는 사람 수
        assert!(game.undo());
        assert_eq!(game.board(), &after_round);
        assert_eq!(game.history_len(), 2);
        assert_eq!(game.state().history[1].mover, Color::Black);
    }

    #[test]
    fn test_undo_after_no_legal_moves_restores_one() {
        let mut game = controller(1);
        game.set_position(stuck_black());
        let t1 = game.submit_human_move(sq("h8"), sq("g8")).unwrap().unwrap();
        assert_eq!(game.resolve_opponent_turn(t1), OpponentOutcome::NoLegalMoves);
        let after_first = game.board().clone();

        let t2 = game.submit_human_move(sq("g8"), sq("f8")).unwrap().unwrap();
        assert_eq!(game.resolve_opponent_turn(t2), OpponentOutcome::NoLegalMoves);
        assert_eq!(game.history_len(), 2);

        assert!(game.undo());
        assert_eq!(game.board(), &after_first);
        assert_eq!(game.board().piece_at(sq("g8")), Piece::from_code("wK"));
        assert_eq!(game.history_len(), 1);

        assert!(game.undo());
        assert_eq!(game.board(), &stuck_black());
        assert_eq!(game.history_len(), 0);
    }

    #[test]
    fn test_new_game_clears_move_log() {
        let mut game = controller(1);
        let ticket = game.submit_human_move(sq("e2"), sq("e4")).unwrap().unwrap();
        game.resolve_opponent_turn(ticket);
        game.presenter_mut().take_events();

        game.new_game();
        assert!(game.move_log().is_empty());
        let events = game.presenter().events();
        let cleared = events.iter().position(|e| *e == PresenterEvent::ClearMoveLog);
        let rendered = events.iter().position(|e| matches!(e, PresenterEvent::RenderBoard { .. }));
        assert!(cleared.is_some());
        assert!(cleared < rendered);
        assert!(!events.iter().any(|e| matches!(e, PresenterEvent::AppendMoveLog { .. })));
    }

    #[test]
    fn test_undo_empty_history() {
        let mut game = controller(1);
        assert!(!game.undo());
        assert_eq!(game.board(), &Board::initial());
    }

    #[test]
    fn test_win_detection() {
        let both = board_with(&[("e1", "wK"), ("e8", "bK")]);
        assert_eq!(evaluate_win(&both), GameResult::Ongoing);

        let no_black = board_with(&[("e1", "wK"), ("a8", "bR")]);
        assert_eq!(evaluate_win(&no_black), GameResult::HumanWins);

        let no_white = board_with(&[("a1", "wR"), ("e8", "bK")]);
        assert_eq!(evaluate_win(&no_white), GameResult::OpponentWins);
        assert_eq!(GameResult::OpponentWins.winner(), Some(Color::Black));
    }

    #[test]
    fn test_human_win_increments_score() {
        let mut game = controller(1);
        game.set_position(board_with(&[("a1", "wK"), ("e2", "wQ"), ("e8", "bK")]));

        assert_eq!(game.submit_human_move(sq("e2"), sq("e8")), Ok(None));
        assert!(game.is_ended());
        assert_eq!(game.result(), GameResult::HumanWins);
        assert_eq!(game.status(), "You Win!");
        assert_eq!(game.score(), 1);

        let events = game.presenter().events();
        assert!(events.contains(&PresenterEvent::Notify { message: "You Win!".to_string() }));
        assert!(events.contains(&PresenterEvent::ShowLeaderboard { name: "Tester".to_string(), score: 1 }));

        // 종료 후 입력은 무시
        assert_eq!(game.on_square_clicked(sq("a1")), ClickOutcome::Ignored);
        assert_eq!(game.submit_human_move(sq("a1"), sq("a2")), Err(GameError::GameOver));
        assert_eq!(game.check_win_condition(), GameResult::HumanWins);
        assert_eq!(game.score(), 1);
    }

    /// 처음에는 깨진 값을 돌려주는 저장소
    struct CorruptStore {
        written: Option<i64>,
    }

    impl ScoreStore for CorruptStore {
        fn get(&self, key: &str) -> Result<Option<i64>, StorageError> {
            match self.written {
                Some(value) => Ok(Some(value)),
                None => Err(StorageError::Corrupt { key: key.to_string(), value: "abc".to_string() }),
            }
        }

        fn set(&mut self, _key: &str, value: i64) -> Result<(), StorageError> {
            self.written = Some(value);
            Ok(())
        }
    }

    #[test]
    fn test_corrupt_score_treated_as_zero() {
        let mut game = GameController::seeded(
            config(1),
            BufferedPresenter::with_name("Tester"),
            CorruptStore { written: None },
        );
        game.new_game();
        assert_eq!(game.score(), 0);

        game.set_position(board_with(&[("a1", "wK"), ("e2", "wQ"), ("e8", "bK")]));
        game.submit_human_move(sq("e2"), sq("e8")).unwrap();
        assert_eq!(game.scores().written, Some(1));
        assert_eq!(game.score(), 1);
    }

    #[test]
    fn test_undo_clears_ended() {
        let mut game = controller(1);
        let start = board_with(&[("a1", "wK"), ("e2", "wQ"), ("e8", "bK")]);
        game.set_position(start.clone());
        game.submit_human_move(sq("e2"), sq("e8")).unwrap();
        assert!(game.is_ended());

        assert!(game.undo());
        assert!(!game.is_ended());
        assert_eq!(game.board(), &start);
        assert_eq!(game.status(), "");
    }

    #[test]
    fn test_opponent_win_keeps_score() {
        let mut game = controller(1);
        game.set_position(board_with(&[("a1", "wR"), ("e8", "bK")]));
        assert_eq!(game.check_win_condition(), GameResult::OpponentWins);
        assert_eq!(game.status(), "AI Wins!");
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_opponent_no_legal_moves() {
        let mut game = controller(1);
        game.set_position(stuck_black());
        let ticket = game.submit_human_move(sq("h8"), sq("g8")).unwrap().unwrap();

        assert_eq!(game.resolve_opponent_turn(ticket), OpponentOutcome::NoLegalMoves);
        assert!(!game.is_ended());
        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.phase(), &Phase::AwaitingSelection);
        assert_eq!(game.history_len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.opponent_delay_ms, 500);
        assert_eq!(config.score_key, "chess_score");
        assert_eq!(config.guest_name, "Guest");
        assert_eq!(config.seed, None);
    }
}
