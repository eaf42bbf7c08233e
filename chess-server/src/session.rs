//! 对局管理

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use protocol::{
    AbortReason, BoardState, ChessError, GameResult, GameSnapshot, GameStatus, Move,
    MoveGenerator, Notation, PieceKind, PlayerId, RuleEngine, SessionId, SessionInfo,
    SessionState, Side, Square, WinReason,
};

use crate::clock::MoveClock;

/// 一局对弈
///
/// 状态机：AwaitingPlayers -> InProgress -> Completed / Aborted。
/// 终结状态只进入一次，之后所有操作返回 [`ChessError::SessionClosed`]。
pub struct Session {
    pub id: SessionId,
    pub white_player: Option<PlayerId>,
    pub black_player: Option<PlayerId>,
    pub state: SessionState,
    pub game_state: Option<BoardState>,
    /// 已落定的走法（坐标记谱）
    pub moves: Vec<String>,
    pub result: Option<GameResult>,
    pub abort_reason: Option<AbortReason>,
    pub clock: Option<MoveClock>,
    /// 待处理的和棋提议（提议方）
    pub draw_offer: Option<Side>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            white_player: None,
            black_player: None,
            state: SessionState::AwaitingPlayers,
            game_state: None,
            moves: Vec::new(),
            result: None,
            abort_reason: None,
            clock: None,
            draw_offer: None,
        }
    }

    /// 加入玩家，返回分配的阵营
    pub fn add_player(&mut self, player_id: PlayerId, preferred: Option<Side>) -> Option<Side> {
        if self.state != SessionState::AwaitingPlayers {
            return None;
        }

        let side = match (self.white_player, self.black_player) {
            (None, None) => preferred.unwrap_or(Side::White),
            (None, Some(_)) => Side::White,
            (Some(_), None) => Side::Black,
            (Some(_), Some(_)) => return None,
        };

        match side {
            Side::White => self.white_player = Some(player_id),
            Side::Black => self.black_player = Some(player_id),
        }
        Some(side)
    }

    pub fn is_full(&self) -> bool {
        self.white_player.is_some() && self.black_player.is_some()
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.white_player == Some(player_id) || self.black_player == Some(player_id)
    }

    pub fn get_player_side(&self, player_id: PlayerId) -> Option<Side> {
        if self.white_player == Some(player_id) {
            Some(Side::White)
        } else if self.black_player == Some(player_id) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn get_player_id(&self, side: Side) -> Option<PlayerId> {
        match side {
            Side::White => self.white_player,
            Side::Black => self.black_player,
        }
    }

    pub fn get_opponent_id(&self, player_id: PlayerId) -> Option<PlayerId> {
        let side = self.get_player_side(player_id)?;
        self.get_player_id(side.opponent())
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        if self.white_player == Some(player_id) {
            self.white_player = None;
        }
        if self.black_player == Some(player_id) {
            self.black_player = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.white_player.is_none() && self.black_player.is_none()
    }

    /// 双方到齐，开始对局
    pub fn start_game(&mut self) {
        if self.state == SessionState::AwaitingPlayers && self.is_full() {
            self.state = SessionState::InProgress;
            self.game_state = Some(BoardState::initial());
            self.clock = Some(MoveClock::new());
        }
    }

    /// 提交走法
    ///
    /// 检查顺序：对局状态、回合归属、走法合法性。失败时局面不变。
    /// 成功时返回落定的走法、新局面和判定结果，终局走法同时落定对局结果。
    pub fn submit_move(
        &mut self,
        side: Side,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Result<(Move, BoardState, GameStatus), ChessError> {
        if self.state != SessionState::InProgress {
            return Err(ChessError::SessionClosed);
        }

        let game_state = self.game_state.as_ref().ok_or(ChessError::SessionClosed)?;
        if game_state.side_to_move != side {
            return Err(ChessError::NotYourTurn);
        }

        // 在合法走法集合中匹配意图，MoveKind 由生成器决定
        let mv: Move = MoveGenerator::generate_legal(game_state)
            .into_iter()
            .find(|m| m.from == from && m.to == to && m.promotion == promotion)
            .ok_or(ChessError::IllegalMove { from, to })?;

        let new_state = RuleEngine::apply_move(game_state, &mv)?;
        let status = RuleEngine::classify(&new_state);

        self.moves.push(Notation::format(&mv));
        self.game_state = Some(new_state.clone());
        if let Some(clock) = &mut self.clock {
            clock.record_move();
        }
        // 走法落定使此前的和棋提议失效
        self.draw_offer = None;

        match status {
            GameStatus::Checkmate => {
                // 被将死的是新局面的走子方，获胜方是刚走子的一方
                self.finish(GameResult::win(side, WinReason::Checkmate));
            }
            GameStatus::Stalemate => {
                self.finish(GameResult::Draw(protocol::DrawReason::Stalemate));
            }
            GameStatus::Draw(reason) => {
                self.finish(GameResult::Draw(reason));
            }
            _ => {}
        }

        Ok((mv, new_state, status))
    }

    /// 认输
    pub fn resign(&mut self, side: Side) -> Result<GameResult, ChessError> {
        if self.state != SessionState::InProgress {
            return Err(ChessError::SessionClosed);
        }
        let result = GameResult::win(side.opponent(), WinReason::Resign);
        self.finish(result);
        Ok(result)
    }

    /// 提议和棋
    pub fn offer_draw(&mut self, side: Side) -> Result<(), ChessError> {
        if self.state != SessionState::InProgress {
            return Err(ChessError::SessionClosed);
        }
        self.draw_offer = Some(side);
        Ok(())
    }

    /// 响应和棋提议，接受时返回结果
    pub fn respond_draw(
        &mut self,
        side: Side,
        accept: bool,
    ) -> Result<Option<GameResult>, ChessError> {
        if self.state != SessionState::InProgress {
            return Err(ChessError::SessionClosed);
        }
        // 只能响应对方的提议
        match self.draw_offer {
            Some(by) if by == side.opponent() => {}
            _ => return Ok(None),
        }
        self.draw_offer = None;

        if accept {
            let result = GameResult::Draw(protocol::DrawReason::Agreement);
            self.finish(result);
            Ok(Some(result))
        } else {
            Ok(None)
        }
    }

    /// 正常结束对局，只生效一次
    pub fn finish(&mut self, result: GameResult) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Completed;
        self.result = Some(result);
        self.clock = None;
    }

    /// 异常中止对局，幂等
    pub fn abort(&mut self, reason: AbortReason) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Aborted;
        self.abort_reason = Some(reason);
        self.clock = None;
    }

    /// 对局列表条目
    pub fn info(&self, white_name: Option<String>, black_name: Option<String>) -> SessionInfo {
        SessionInfo {
            id: self.id,
            white_player: white_name,
            black_player: black_name,
            state: self.state,
        }
    }

    /// 生成当前对局的快照
    pub fn snapshot(&self, white_name: String, black_name: String) -> Option<GameSnapshot> {
        let game_state = self.game_state.as_ref()?;
        Some(GameSnapshot::new(
            self.id,
            white_name,
            black_name,
            game_state,
            self.moves.clone(),
            self.state,
            self.result,
        ))
    }
}

/// 对局管理器
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 创建新对局
    pub fn create(&mut self) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(id, Session::new(id));
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// 查找玩家所在的对局
    pub fn find_player_session(&self, player_id: PlayerId) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| s.has_player(player_id))
            .map(|s| s.id)
    }

    /// 可加入的对局（等待对手中）
    pub fn list_joinable(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| s.state == SessionState::AwaitingPlayers)
            .collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// 对局超时检查，返回因走子超时需要中止的对局
    pub fn collect_move_timeouts(&self) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| {
                s.state == SessionState::InProgress
                    && s.clock.as_ref().is_some_and(|c| c.timed_out())
            })
            .map(|s| s.id)
            .collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
