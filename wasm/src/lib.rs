use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use engine::{
    BufferedPresenter, ClickOutcome, GameConfig, GameController, GameResult, Highlight,
    OpponentOutcome, Presenter, PresenterEvent, ScoreStore, StorageError, TurnTicket,
};
use rules::{Board, Move, Square};

/// 브라우저용 컨트롤러
type BrowserController = GameController<BrowserPresenter, LocalStorageScores>;

/// JS에서 사용할 게임 래퍼
#[wasm_bindgen]
pub struct Game {
    controller: BrowserController,
}

/// JS로 전달할 이동 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsMove {
    pub from: String,
    pub to: String,
    pub from_row: i32,
    pub from_col: i32,
    pub to_row: i32,
    pub to_col: i32,
    pub piece: String,
    pub is_capture: bool,
}

/// JS로 전달할 게임 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsGameState {
    pub board: Vec<Vec<String>>,
    pub turn: String,
    pub turn_label: String,
    pub phase: String,
    pub selected: Option<String>,
    pub possible_moves: Vec<String>,
    pub is_game_over: bool,
    pub winner: Option<String>,
    pub status: String,
    pub move_log: Vec<String>,
    pub player_name: String,
    pub score: i32,
    pub can_undo: bool,
    pub pending_ticket: Option<u32>,
}

/// 칸 클릭 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsClickOutcome {
    pub kind: String, // "ignored", "selected", "deselected", "moved"
    pub selected: Option<String>,
    pub possible_moves: Vec<String>,
    pub mv: Option<JsMove>,
    pub ticket: Option<u32>,
}

/// 상대 차례 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsOpponentOutcome {
    pub kind: String, // "stale", "moved", "no-legal-moves"
    pub mv: Option<JsMove>,
}

#[wasm_bindgen]
impl Game {
    /// 새 게임 래퍼 생성. config는 생략 가능
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Game, JsValue> {
        let mut config: GameConfig = if config.is_undefined() || config.is_null() {
            GameConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        init_logging(config.debug);

        // 시드가 없으면 현재 시각으로
        if config.seed.is_none() {
            config.seed = Some(js_sys::Date::now() as u64);
        }

        let window = web_sys::window();
        let scores = LocalStorageScores::new(window.as_ref());
        let presenter = BrowserPresenter::new(window);

        Ok(Game {
            controller: GameController::seeded(config, presenter, scores),
        })
    }

    /// 새 게임 시작 (이름이 없으면 입력 받음)
    #[wasm_bindgen]
    pub fn new_game(&mut self) {
        self.controller.new_game();
    }

    /// 칸 클릭
    #[wasm_bindgen]
    pub fn click(&mut self, row: i32, col: i32) -> Result<JsValue, JsValue> {
        let square = Square::checked(row, col).map_err(js_error)?;
        let outcome = self.controller.on_square_clicked(square);
        to_js(&js_click_outcome(outcome))
    }

    /// "e2" 같은 칸 id로 클릭
    #[wasm_bindgen]
    pub fn click_square(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let square = Square::from_algebraic(id).map_err(js_error)?;
        let outcome = self.controller.on_square_clicked(square);
        to_js(&js_click_outcome(outcome))
    }

    /// 수를 직접 제출. 상대 차례가 생기면 그 표를 반환
    #[wasm_bindgen]
    pub fn submit_move(&mut self, from: &str, to: &str) -> Result<Option<u32>, JsValue> {
        let from = Square::from_algebraic(from).map_err(js_error)?;
        let to = Square::from_algebraic(to).map_err(js_error)?;
        self.controller
            .submit_human_move(from, to)
            .map(|ticket| ticket.map(|t| t.0))
            .map_err(js_error)
    }

    /// 현재 게임 상태
    #[wasm_bindgen]
    pub fn get_state(&self) -> Result<JsValue, JsValue> {
        to_js(&build_js_state(&self.controller))
    }

    /// 특정 칸의 기물이 갈 수 있는 칸 목록
    #[wasm_bindgen]
    pub fn get_legal_moves(&self, row: i32, col: i32) -> Result<JsValue, JsValue> {
        let square = Square::checked(row, col).map_err(js_error)?;
        let moves: Vec<JsMove> = self
            .controller
            .legal_moves_at(square)
            .iter()
            .map(js_move)
            .collect();
        to_js(&moves)
    }

    /// 대기 중인 상대 차례 표
    #[wasm_bindgen]
    pub fn pending_ticket(&self) -> Option<u32> {
        self.controller.pending_opponent_turn().map(|t| t.0)
    }

    /// 상대가 두기 전 대기 시간 (JS setTimeout용)
    #[wasm_bindgen]
    pub fn opponent_delay_ms(&self) -> u32 {
        self.controller.config().opponent_delay_ms
    }

    /// 타이머가 끝나면 호출. 만료된 표면 아무 일도 하지 않는다
    #[wasm_bindgen]
    pub fn resolve_opponent_turn(&mut self, ticket: u32) -> Result<JsValue, JsValue> {
        let outcome = self.controller.resolve_opponent_turn(TurnTicket(ticket));
        to_js(&js_opponent_outcome(outcome))
    }

    #[wasm_bindgen]
    pub fn cancel_opponent_turn(&mut self) -> bool {
        self.controller.cancel_opponent_turn()
    }

    /// 되돌리기
    #[wasm_bindgen]
    pub fn undo(&mut self) -> bool {
        self.controller.undo()
    }

    #[wasm_bindgen]
    pub fn can_undo(&self) -> bool {
        self.controller.can_undo()
    }

    /// 쌓인 화면 이벤트를 꺼낸다
    #[wasm_bindgen]
    pub fn drain_events(&mut self) -> Result<JsValue, JsValue> {
        let events = self.controller.presenter_mut().take_events();
        to_js(&events)
    }

    /// 누적 승수
    #[wasm_bindgen]
    pub fn score(&self) -> i32 {
        clamp_score(self.controller.score())
    }

    #[wasm_bindgen]
    pub fn player_name(&self) -> String {
        self.controller.player_name().to_string()
    }

    #[wasm_bindgen]
    pub fn set_player_name(&mut self, name: &str) {
        self.controller.set_player_name(name);
    }
}

/// 브라우저 Presenter. 렌더링 이벤트는 쌓아두고 JS가 꺼내 간다.
/// 이름 입력만 window.prompt로 바로 처리한다.
pub struct BrowserPresenter {
    buffer: BufferedPresenter,
    window: Option<web_sys::Window>,
}

impl BrowserPresenter {
    pub fn new(window: Option<web_sys::Window>) -> Self {
        Self {
            buffer: BufferedPresenter::new(),
            window,
        }
    }

    pub fn take_events(&mut self) -> Vec<PresenterEvent> {
        self.buffer.take_events()
    }

    pub fn events(&self) -> &[PresenterEvent] {
        self.buffer.events()
    }
}

impl Presenter for BrowserPresenter {
    fn render_board(&mut self, board: &Board, turn_label: &str) {
        self.buffer.render_board(board, turn_label);
    }

    fn highlight(&mut self, square: Square, kind: Highlight) {
        self.buffer.highlight(square, kind);
    }

    fn clear_highlights(&mut self) {
        self.buffer.clear_highlights();
    }

    fn append_move_log(&mut self, entry: &str) {
        self.buffer.append_move_log(entry);
    }

    fn clear_move_log(&mut self) {
        self.buffer.clear_move_log();
    }

    fn set_status(&mut self, status: &str) {
        self.buffer.set_status(status);
    }

    fn show_leaderboard(&mut self, name: &str, score: i64) {
        self.buffer.show_leaderboard(name, score);
    }

    fn prompt_for_name(&mut self, message: &str, default: &str) -> Option<String> {
        let window = self.window.as_ref()?;
        match window.prompt_with_message_and_default(message, default) {
            Ok(name) => name,
            Err(err) => {
                warn!("이름 입력 실패: {:?}", err);
                None
            }
        }
    }

    // alert는 JS가 화면을 그린 뒤에 띄운다
    fn notify(&mut self, message: &str) {
        self.buffer.notify(message);
    }
}

/// localStorage 점수 저장소
pub struct LocalStorageScores {
    storage: Option<web_sys::Storage>,
}

impl LocalStorageScores {
    pub fn new(window: Option<&web_sys::Window>) -> Self {
        let storage = window.and_then(|w| w.local_storage().ok().flatten());
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("localStorage".to_string()))
    }
}

impl ScoreStore for LocalStorageScores {
    fn get(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let raw = self
            .storage()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))?;
        match raw {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StorageError::Corrupt { key: key.to_string(), value }),
        }
    }

    fn set(&mut self, key: &str, value: i64) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key, &value.to_string())
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }
}

// === 변환 헬퍼 ===

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(Into::into)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn clamp_score(score: i64) -> i32 {
    score.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn squares_to_strings(squares: &[Square]) -> Vec<String> {
    squares.iter().map(Square::to_algebraic).collect()
}

fn js_move(mv: &Move) -> JsMove {
    JsMove {
        from: mv.from.to_algebraic(),
        to: mv.to.to_algebraic(),
        from_row: mv.from.row,
        from_col: mv.from.col,
        to_row: mv.to.row,
        to_col: mv.to.col,
        piece: mv.piece.code(),
        is_capture: mv.is_capture(),
    }
}

fn js_click_outcome(outcome: ClickOutcome) -> JsClickOutcome {
    let mut js = JsClickOutcome {
        kind: String::new(),
        selected: None,
        possible_moves: Vec::new(),
        mv: None,
        ticket: None,
    };
    match outcome {
        ClickOutcome::Ignored => js.kind = "ignored".to_string(),
        ClickOutcome::Deselected => js.kind = "deselected".to_string(),
        ClickOutcome::Selected { square, destinations } => {
            js.kind = "selected".to_string();
            js.selected = Some(square.to_algebraic());
            js.possible_moves = squares_to_strings(&destinations);
        }
        ClickOutcome::Moved { mv, opponent } => {
            js.kind = "moved".to_string();
            js.mv = Some(js_move(&mv));
            js.ticket = opponent.map(|t| t.0);
        }
    }
    js
}

fn js_opponent_outcome(outcome: OpponentOutcome) -> JsOpponentOutcome {
    match outcome {
        OpponentOutcome::Stale => JsOpponentOutcome { kind: "stale".to_string(), mv: None },
        OpponentOutcome::Moved(mv) => JsOpponentOutcome {
            kind: "moved".to_string(),
            mv: Some(js_move(&mv)),
        },
        OpponentOutcome::NoLegalMoves => JsOpponentOutcome {
            kind: "no-legal-moves".to_string(),
            mv: None,
        },
    }
}

fn build_js_state<P: Presenter, S: ScoreStore>(controller: &GameController<P, S>) -> JsGameState {
    let result = controller.result();
    let possible_moves = match controller.phase() {
        engine::Phase::AwaitingDestination { destinations, .. } => squares_to_strings(destinations),
        _ => Vec::new(),
    };

    JsGameState {
        board: controller.board().codes(),
        turn: controller.turn().name().to_string(),
        turn_label: controller.turn_label().to_string(),
        phase: controller.phase().name().to_string(),
        selected: controller.selected().map(|s| s.to_algebraic()),
        possible_moves,
        is_game_over: result != GameResult::Ongoing,
        winner: result.winner().map(|c| c.name().to_string()),
        status: controller.status().to_string(),
        move_log: controller.move_log().to_vec(),
        player_name: controller.player_name().to_string(),
        score: clamp_score(controller.score()),
        can_undo: controller.can_undo(),
        pending_ticket: controller.pending_opponent_turn().map(|t| t.0),
    }
}

// === 로깅 ===

/// 콘솔 로그
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    fn console_log(s: &str);
}

/// log 크레이트 출력을 브라우저 콘솔로 보낸다
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            console_log(&format!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logging(debug: bool) {
    // 두 번째 설치는 실패하지만 레벨은 갱신한다
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
}

#[wasm_bindgen(start)]
pub fn main() {
    init_logging(false);
    console_log("Chessboard WASM initialized!");
}
