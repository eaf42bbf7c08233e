//! 服务器主逻辑

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use protocol::{
    AbortReason, ChessError, ClientMessage, Connection, ErrorCode, GameResult, Listener,
    PieceKind, PlayerId, ProtocolError, ServerMessage, SessionId, SessionInfo, SessionState,
    Square, TcpListener, WinReason, RECONNECT_TIMEOUT, RECONNECT_TIMEOUT_SECS,
};

use crate::player::{PlayerManager, PlayerStatus};
use crate::session::SessionManager;
use crate::storage::SnapshotStore;

/// 服务器状态
pub struct ServerState {
    pub players: PlayerManager,
    pub sessions: SessionManager,
    pub storage: SnapshotStore,
    /// 玩家 ID -> 消息发送通道
    pub connections: HashMap<PlayerId, mpsc::Sender<ServerMessage>>,
    /// 断线玩家的重连截止时间
    pub disconnect_deadlines: HashMap<PlayerId, Instant>,
}

impl ServerState {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            players: PlayerManager::new(),
            sessions: SessionManager::new(),
            storage: SnapshotStore::new()?,
            connections: HashMap::new(),
            disconnect_deadlines: HashMap::new(),
        })
    }

    #[cfg(test)]
    fn with_storage(storage: SnapshotStore) -> Self {
        Self {
            players: PlayerManager::new(),
            sessions: SessionManager::new(),
            storage,
            connections: HashMap::new(),
            disconnect_deadlines: HashMap::new(),
        }
    }

    /// 发送消息给玩家
    pub async fn send_to_player(&self, player_id: PlayerId, msg: ServerMessage) {
        if let Some(tx) = self.connections.get(&player_id) {
            let _ = tx.send(msg).await;
        }
    }

    /// 广播消息给对局双方
    pub async fn broadcast_to_session(&self, session_id: SessionId, msg: ServerMessage) {
        if let Some(session) = self.sessions.get(session_id) {
            if let Some(white_id) = session.white_player {
                self.send_to_player(white_id, msg.clone()).await;
            }
            if let Some(black_id) = session.black_player {
                self.send_to_player(black_id, msg).await;
            }
        }
    }

    /// 保存对局快照，失败只记日志，不影响对局流程
    fn persist_snapshot(&self, session_id: SessionId) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };
        let name = |id: Option<PlayerId>| {
            id.and_then(|id| self.players.get_nickname(id))
                .unwrap_or("未知")
                .to_string()
        };
        if let Some(snapshot) = session.snapshot(name(session.white_player), name(session.black_player)) {
            if let Err(e) = self.storage.save(&snapshot) {
                warn!(session_id, "保存快照失败: {:#}", e);
            }
        }
    }
}

/// 待发送的消息
struct PendingMessages {
    messages: Vec<(PlayerId, ServerMessage)>,
    broadcasts: Vec<(SessionId, ServerMessage)>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            broadcasts: Vec::new(),
        }
    }

    fn send(&mut self, player_id: PlayerId, msg: ServerMessage) {
        self.messages.push((player_id, msg));
    }

    fn broadcast(&mut self, session_id: SessionId, msg: ServerMessage) {
        self.broadcasts.push((session_id, msg));
    }

    async fn flush(self, state: &ServerState) {
        for (player_id, msg) in self.messages {
            state.send_to_player(player_id, msg).await;
        }
        for (session_id, msg) in self.broadcasts {
            state.broadcast_to_session(session_id, msg).await;
        }
    }
}

fn error_reply(code: ErrorCode, message: &str) -> ServerMessage {
    ServerMessage::Error {
        code,
        message: message.to_string(),
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息
    pub async fn handle(
        state: &mut ServerState,
        player_id: PlayerId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();

        let result = match msg {
            ClientMessage::Login { nickname } => Self::handle_login(state, nickname),
            ClientMessage::Reconnect {
                player_id: pid,
                session_id,
            } => Self::handle_reconnect(state, &mut pending, pid, session_id),
            ClientMessage::CreateSession { preferred_side } => {
                Self::handle_create_session(state, player_id, preferred_side)
            }
            ClientMessage::JoinSession { session_id } => {
                Self::handle_join_session(state, &mut pending, player_id, session_id)
            }
            ClientMessage::LeaveSession => {
                Self::handle_leave_session(state, &mut pending, player_id)
            }
            ClientMessage::ListSessions => Self::handle_list_sessions(state),
            ClientMessage::MoveIntent {
                from,
                to,
                promotion,
            } => Self::handle_move_intent(state, &mut pending, player_id, from, to, promotion),
            ClientMessage::Resign => Self::handle_resign(state, &mut pending, player_id),
            ClientMessage::DrawOffer => Self::handle_draw_offer(state, &mut pending, player_id),
            ClientMessage::DrawResponse { accept } => {
                Self::handle_draw_response(state, &mut pending, player_id, accept)
            }
            ClientMessage::Ping => Some(ServerMessage::Pong),
        };

        pending.flush(state).await;

        result
    }

    fn handle_login(state: &mut ServerState, nickname: String) -> Option<ServerMessage> {
        match state.players.login(nickname) {
            Ok(player_id) => {
                info!(player_id, "玩家登录");
                Some(ServerMessage::LoginSuccess { player_id })
            }
            Err(e) => {
                let code = match e {
                    ProtocolError::NicknameOccupied => ErrorCode::NicknameOccupied,
                    _ => ErrorCode::InvalidNickname,
                };
                Some(error_reply(code, &e.to_string()))
            }
        }
    }

    fn handle_reconnect(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        session_id: SessionId,
    ) -> Option<ServerMessage> {
        if !state.players.exists(player_id) {
            return Some(error_reply(ErrorCode::PlayerNotFound, "玩家不存在"));
        }

        let Some(session) = state.sessions.get(session_id) else {
            return Some(error_reply(ErrorCode::SessionNotFound, "对局不存在"));
        };
        if !session.has_player(player_id) {
            return Some(error_reply(ErrorCode::NotInSession, "不在该对局中"));
        }
        if session.state.is_terminal() {
            return Some(error_reply(ErrorCode::SessionClosed, "对局已结束"));
        }

        let your_side = session.get_player_side(player_id)?;
        // 对局尚未开始时 game_state 为 None，重连仍需重新绑定并清除断线期限
        let game_state = session.game_state.clone();
        let opponent_id = session.get_opponent_id(player_id);

        state.players.reconnect(player_id);
        state.disconnect_deadlines.remove(&player_id);

        // 断线期间不计入思考时间
        let session = state.sessions.get_mut(session_id)?;
        if let Some(clock) = &mut session.clock {
            clock.reset_turn_start();
        }

        if let Some(opponent_id) = opponent_id {
            pending.send(opponent_id, ServerMessage::OpponentReconnected);
        }

        info!(player_id, session_id, "玩家重连");
        Some(ServerMessage::ReconnectSuccess {
            session_id,
            game_state,
            your_side,
        })
    }

    fn handle_create_session(
        state: &mut ServerState,
        player_id: PlayerId,
        preferred_side: Option<protocol::Side>,
    ) -> Option<ServerMessage> {
        if let Some(player) = state.players.get(player_id) {
            if matches!(player.status, PlayerStatus::InSession(_)) {
                return Some(error_reply(ErrorCode::AlreadyInSession, "已在对局中"));
            }
        }

        let session_id = state.sessions.create();
        let session = state.sessions.get_mut(session_id)?;
        let your_side = session.add_player(player_id, preferred_side)?;
        state
            .players
            .set_status(player_id, PlayerStatus::InSession(session_id));

        info!(player_id, session_id, "创建对局");
        Some(ServerMessage::SessionCreated {
            session_id,
            your_side,
        })
    }

    fn handle_join_session(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        session_id: SessionId,
    ) -> Option<ServerMessage> {
        if let Some(player) = state.players.get(player_id) {
            if matches!(player.status, PlayerStatus::InSession(_)) {
                return Some(error_reply(ErrorCode::AlreadyInSession, "已在对局中"));
            }
        }

        let Some(session) = state.sessions.get(session_id) else {
            return Some(error_reply(ErrorCode::SessionNotFound, "对局不存在"));
        };
        if session.state != SessionState::AwaitingPlayers {
            return Some(error_reply(ErrorCode::SessionClosed, "对局不可加入"));
        }
        if session.is_full() {
            return Some(error_reply(ErrorCode::SessionFull, "对局人数已满"));
        }

        let creator_id = session.white_player.or(session.black_player);
        let joiner_nickname = state
            .players
            .get_nickname(player_id)
            .unwrap_or("玩家")
            .to_string();

        let session = state.sessions.get_mut(session_id)?;
        let your_side = session.add_player(player_id, None)?;
        state
            .players
            .set_status(player_id, PlayerStatus::InSession(session_id));

        if let Some(creator_id) = creator_id {
            pending.send(
                creator_id,
                ServerMessage::OpponentJoined {
                    nickname: joiner_nickname,
                },
            );
        }

        // 双方到齐，开局
        if session.is_full() {
            session.start_game();

            let initial_state = session.game_state.clone()?;
            let white_id = session.white_player?;
            let black_id = session.black_player?;
            let white_player = state
                .players
                .get_nickname(white_id)
                .unwrap_or("玩家")
                .to_string();
            let black_player = state
                .players
                .get_nickname(black_id)
                .unwrap_or("玩家")
                .to_string();

            info!(session_id, "对局开始");
            for (id, side) in [(white_id, protocol::Side::White), (black_id, protocol::Side::Black)] {
                pending.send(
                    id,
                    ServerMessage::GameStarted {
                        initial_state: initial_state.clone(),
                        your_side: side,
                        white_player: white_player.clone(),
                        black_player: black_player.clone(),
                    },
                );
            }
        }

        Some(ServerMessage::SessionJoined {
            session_id,
            your_side,
        })
    }

    fn handle_leave_session(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let session_id = state.sessions.find_player_session(player_id)?;
        let session = state.sessions.get(session_id)?;

        let side = session.get_player_side(player_id)?;
        let opponent_id = session.get_opponent_id(player_id);

        // 对局进行中离开等同认输
        if session.state == SessionState::InProgress {
            let result = GameResult::win(side.opponent(), WinReason::Resign);
            let session = state.sessions.get_mut(session_id)?;
            session.finish(result);
            state.persist_snapshot(session_id);

            if let Some(opponent_id) = opponent_id {
                pending.send(opponent_id, ServerMessage::GameOver { result });
            }
        }

        let session = state.sessions.get_mut(session_id)?;
        session.remove_player(player_id);
        state.players.set_status(player_id, PlayerStatus::Online);

        if state.sessions.get(session_id)?.is_empty() {
            state.sessions.remove(session_id);
        }

        None
    }

    fn handle_list_sessions(state: &ServerState) -> Option<ServerMessage> {
        let sessions: Vec<SessionInfo> = state
            .sessions
            .list_joinable()
            .iter()
            .map(|s| {
                let name = |id: Option<PlayerId>| {
                    id.and_then(|id| state.players.get_nickname(id).map(|n| n.to_string()))
                };
                s.info(name(s.white_player), name(s.black_player))
            })
            .collect();

        Some(ServerMessage::SessionList { sessions })
    }

    fn handle_move_intent(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<ServerMessage> {
        // 坐标来自网络反序列化，先做边界校验
        for sq in [from, to] {
            if !sq.is_valid() {
                let e = ChessError::InvalidSquare {
                    file: sq.file as i8,
                    rank: sq.rank as i8,
                };
                return Some(error_reply(ErrorCode::MalformedMove, &e.to_string()));
            }
        }

        let Some(session_id) = state.sessions.find_player_session(player_id) else {
            return Some(error_reply(ErrorCode::NotInSession, "不在对局中"));
        };
        let session = state.sessions.get(session_id)?;

        match session.state {
            SessionState::AwaitingPlayers => {
                return Some(error_reply(ErrorCode::GameNotStarted, "对局尚未开始"));
            }
            SessionState::Completed | SessionState::Aborted => {
                return Some(error_reply(ErrorCode::GameAlreadyOver, "对局已结束"));
            }
            SessionState::InProgress => {}
        }

        let side = session.get_player_side(player_id)?;
        let session = state.sessions.get_mut(session_id)?;

        let (mv, new_state, status) = match session.submit_move(side, from, to, promotion) {
            Ok(outcome) => outcome,
            // 拒绝只通知提交方，对手不受打扰
            Err(ChessError::NotYourTurn) => {
                return Some(error_reply(ErrorCode::NotYourTurn, "还没轮到你"));
            }
            Err(e @ ChessError::IllegalMove { .. }) => {
                return Some(ServerMessage::IllegalMove {
                    reason: e.to_string(),
                });
            }
            Err(ChessError::SessionClosed) => {
                return Some(error_reply(ErrorCode::GameAlreadyOver, "对局已结束"));
            }
            Err(e) => {
                // 局面损坏属于致命错误，中止对局
                error!(session_id, "规则引擎错误: {}", e);
                if e.is_fatal() {
                    session.abort(AbortReason::Internal);
                    state.persist_snapshot(session_id);
                    pending.broadcast(
                        session_id,
                        ServerMessage::SessionAborted {
                            reason: AbortReason::Internal,
                        },
                    );
                }
                return Some(error_reply(ErrorCode::InternalError, &e.to_string()));
            }
        };

        let notation = session.moves.last()?.clone();
        let result = session.result;

        pending.broadcast(
            session_id,
            ServerMessage::BoardUpdate {
                mv,
                notation,
                new_state,
                status,
            },
        );

        state.persist_snapshot(session_id);

        if let Some(result) = result {
            info!(session_id, ?result, "对局结束");
            pending.broadcast(session_id, ServerMessage::GameOver { result });
        }

        None
    }

    fn handle_resign(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let Some(session_id) = state.sessions.find_player_session(player_id) else {
            return Some(error_reply(ErrorCode::NotInSession, "不在对局中"));
        };
        let session = state.sessions.get(session_id)?;
        let side = session.get_player_side(player_id)?;

        let session = state.sessions.get_mut(session_id)?;
        match session.resign(side) {
            Ok(result) => {
                info!(session_id, ?result, "玩家认输");
                state.persist_snapshot(session_id);
                pending.broadcast(session_id, ServerMessage::GameOver { result });
                None
            }
            Err(_) => Some(error_reply(ErrorCode::GameNotStarted, "对局未在进行中")),
        }
    }

    fn handle_draw_offer(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let Some(session_id) = state.sessions.find_player_session(player_id) else {
            return Some(error_reply(ErrorCode::NotInSession, "不在对局中"));
        };
        let session = state.sessions.get(session_id)?;
        let side = session.get_player_side(player_id)?;
        let opponent_id = session.get_opponent_id(player_id);

        let session = state.sessions.get_mut(session_id)?;
        match session.offer_draw(side) {
            Ok(()) => {
                if let Some(opponent_id) = opponent_id {
                    pending.send(opponent_id, ServerMessage::DrawOffered { by: side });
                }
                None
            }
            Err(_) => Some(error_reply(ErrorCode::GameNotStarted, "对局未在进行中")),
        }
    }

    fn handle_draw_response(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        player_id: PlayerId,
        accept: bool,
    ) -> Option<ServerMessage> {
        let Some(session_id) = state.sessions.find_player_session(player_id) else {
            return Some(error_reply(ErrorCode::NotInSession, "不在对局中"));
        };
        let session = state.sessions.get(session_id)?;
        let side = session.get_player_side(player_id)?;
        let offerer_id = session
            .draw_offer
            .and_then(|by| session.get_player_id(by));

        let session = state.sessions.get_mut(session_id)?;
        match session.respond_draw(side, accept) {
            Ok(Some(result)) => {
                info!(session_id, "协议和棋");
                state.persist_snapshot(session_id);
                pending.broadcast(session_id, ServerMessage::GameOver { result });
                None
            }
            Ok(None) => {
                if !accept {
                    if let Some(offerer_id) = offerer_id {
                        pending.send(offerer_id, ServerMessage::DrawDeclined);
                    }
                }
                None
            }
            Err(_) => Some(error_reply(ErrorCode::GameNotStarted, "对局未在进行中")),
        }
    }

    /// 处理玩家断线
    pub async fn handle_disconnect(state: &mut ServerState, player_id: PlayerId) {
        let mut pending = PendingMessages::new();

        if let Some(session_id) = state.players.disconnect(player_id) {
            state
                .disconnect_deadlines
                .insert(player_id, Instant::now() + RECONNECT_TIMEOUT);

            info!(player_id, session_id, "玩家断线，等待重连");
            if let Some(session) = state.sessions.get(session_id) {
                if let Some(opponent_id) = session.get_opponent_id(player_id) {
                    pending.send(
                        opponent_id,
                        ServerMessage::OpponentDisconnected {
                            timeout_secs: RECONNECT_TIMEOUT_SECS,
                        },
                    );
                }
            }
        } else {
            // 不在对局中的玩家直接移除
            state.players.remove(player_id);
        }

        state.connections.remove(&player_id);
        pending.flush(state).await;
    }

    /// 周期性超时检查：断线未重连和走子超时的对局都中止
    pub async fn check_timeouts(state: &mut ServerState) {
        let mut pending = PendingMessages::new();
        let now = Instant::now();

        let expired: Vec<PlayerId> = state
            .disconnect_deadlines
            .iter()
            .filter(|(_, &deadline)| now >= deadline)
            .map(|(&id, _)| id)
            .collect();

        for player_id in expired {
            state.disconnect_deadlines.remove(&player_id);

            if let Some(session_id) = state.sessions.find_player_session(player_id) {
                Self::abort_session(state, &mut pending, session_id, AbortReason::Disconnect);
            }
            state.players.remove(player_id);
        }

        for session_id in state.sessions.collect_move_timeouts() {
            Self::abort_session(state, &mut pending, session_id, AbortReason::Timeout);
        }

        pending.flush(state).await;
    }

    /// 中止对局并通知双方，已终结的对局不受影响
    fn abort_session(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        session_id: SessionId,
        reason: AbortReason,
    ) {
        let Some(session) = state.sessions.get_mut(session_id) else {
            return;
        };
        if session.state.is_terminal() {
            return;
        }

        session.abort(reason);
        info!(session_id, ?reason, "对局中止");
        state.persist_snapshot(session_id);
        pending.broadcast(session_id, ServerMessage::SessionAborted { reason });
    }
}

/// 启动服务器
pub async fn run(addr: &str) -> anyhow::Result<()> {
    let mut listener = TcpListener::bind(addr).await?;
    info!(
        "服务器监听于 {}",
        listener.local_addr().unwrap_or_else(|| addr.to_string())
    );

    let state = Arc::new(Mutex::new(ServerState::new()?));

    // 超时检查任务
    let timeout_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let mut state = timeout_state.lock().await;
            MessageHandler::check_timeouts(&mut state).await;
        }
    });

    loop {
        match listener.accept().await {
            Ok(conn) => {
                tokio::spawn(handle_connection(Arc::clone(&state), conn));
            }
            Err(e) => {
                warn!("接受连接失败: {}", e);
            }
        }
    }
}

/// 单个连接的收发循环
async fn handle_connection(state: Arc<Mutex<ServerState>>, conn: protocol::TcpConnection) {
    let peer = conn.peer_addr().unwrap_or_else(|| "未知".to_string());
    info!(%peer, "新连接");

    let (mut reader, mut writer) = conn.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // 独立的写任务，避免业务处理阻塞发送
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if writer.send(&msg).await.is_err() {
                break;
            }
        }
    });

    let mut player_id: Option<PlayerId> = None;

    loop {
        let msg: ClientMessage = match reader.recv().await {
            Ok(msg) => msg,
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                warn!(%peer, "读取消息失败: {}", e);
                break;
            }
        };

        let mut guard = state.lock().await;
        let reply = match msg {
            ClientMessage::Login { nickname } => {
                let reply =
                    MessageHandler::handle(&mut guard, 0, ClientMessage::Login { nickname }).await;
                if let Some(ServerMessage::LoginSuccess { player_id: id }) = &reply {
                    player_id = Some(*id);
                    guard.connections.insert(*id, tx.clone());
                }
                reply
            }
            ClientMessage::Reconnect {
                player_id: pid,
                session_id,
            } => {
                let reply = MessageHandler::handle(
                    &mut guard,
                    pid,
                    ClientMessage::Reconnect {
                        player_id: pid,
                        session_id,
                    },
                )
                .await;
                if matches!(reply, Some(ServerMessage::ReconnectSuccess { .. })) {
                    player_id = Some(pid);
                    guard.connections.insert(pid, tx.clone());
                }
                reply
            }
            other => match player_id {
                Some(id) => MessageHandler::handle(&mut guard, id, other).await,
                None => Some(error_reply(ErrorCode::PlayerNotFound, "请先登录")),
            },
        };
        drop(guard);

        if let Some(reply) = reply {
            if tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    if let Some(id) = player_id {
        let mut guard = state.lock().await;
        MessageHandler::handle_disconnect(&mut guard, id).await;
    }

    drop(tx);
    let _ = write_task.await;
    info!(%peer, "连接关闭");
}
