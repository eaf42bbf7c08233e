//! 客户端-服务器消息定义

use serde::{Deserialize, Serialize};

use crate::board::BoardState;
use crate::moves::Move;
use crate::piece::{PieceKind, Side, Square};
use crate::rules::{DrawReason, GameStatus};

/// 玩家 ID
pub type PlayerId = u64;

/// 对局 ID
pub type SessionId = u64;

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 等待对手加入
    AwaitingPlayers,
    /// 对局进行中
    InProgress,
    /// 正常结束（有结果）
    Completed,
    /// 异常中止（无结果）
    Aborted,
}

impl SessionState {
    /// 是否为终结状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// 胜利原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinReason {
    /// 将死对方
    Checkmate,
    /// 对方认输
    Resign,
}

/// 中止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// 玩家断线且未在时限内重连
    Disconnect,
    /// 走子超时
    Timeout,
    /// 服务器内部错误（局面损坏等致命故障）
    Internal,
}

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// 白方获胜
    WhiteWins(WinReason),
    /// 黑方获胜
    BlackWins(WinReason),
    /// 和棋
    Draw(DrawReason),
}

impl GameResult {
    /// 指定阵营获胜的结果
    pub fn win(side: Side, reason: WinReason) -> Self {
        match side {
            Side::White => GameResult::WhiteWins(reason),
            Side::Black => GameResult::BlackWins(reason),
        }
    }

    /// 获胜方（和棋为 None）
    pub fn winner(&self) -> Option<Side> {
        match self {
            GameResult::WhiteWins(_) => Some(Side::White),
            GameResult::BlackWins(_) => Some(Side::Black),
            GameResult::Draw(_) => None,
        }
    }
}

/// 对局列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub white_player: Option<String>,
    pub black_player: Option<String>,
    pub state: SessionState,
}

/// 客户端发往服务器的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// 登录
    Login { nickname: String },
    /// 断线重连
    Reconnect {
        player_id: PlayerId,
        session_id: SessionId,
    },
    /// 创建对局
    CreateSession { preferred_side: Option<Side> },
    /// 加入对局
    JoinSession { session_id: SessionId },
    /// 离开对局
    LeaveSession,
    /// 查询对局列表
    ListSessions,
    /// 提交走法
    MoveIntent {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
    /// 认输
    Resign,
    /// 提议和棋
    DrawOffer,
    /// 响应和棋提议
    DrawResponse { accept: bool },
    /// 心跳
    Ping,
}

/// 服务器发往客户端的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// 登录成功
    LoginSuccess { player_id: PlayerId },
    /// 重连成功，携带当前局面（对局尚未开始时为 None）
    ReconnectSuccess {
        session_id: SessionId,
        game_state: Option<BoardState>,
        your_side: Side,
    },
    /// 对局创建成功
    SessionCreated {
        session_id: SessionId,
        your_side: Side,
    },
    /// 加入对局成功
    SessionJoined {
        session_id: SessionId,
        your_side: Side,
    },
    /// 对局列表
    SessionList { sessions: Vec<SessionInfo> },
    /// 对手加入
    OpponentJoined { nickname: String },
    /// 对局开始
    GameStarted {
        initial_state: BoardState,
        your_side: Side,
        white_player: String,
        black_player: String,
    },
    /// 走法已执行，广播给双方
    BoardUpdate {
        mv: Move,
        notation: String,
        new_state: BoardState,
        status: GameStatus,
    },
    /// 走法被拒绝，只发给提交方
    IllegalMove { reason: String },
    /// 对方提议和棋
    DrawOffered { by: Side },
    /// 和棋提议被拒绝
    DrawDeclined,
    /// 对局结束，携带结果
    GameOver { result: GameResult },
    /// 对局异常中止
    SessionAborted { reason: AbortReason },
    /// 对手断线，等待重连
    OpponentDisconnected { timeout_secs: u64 },
    /// 对手已重连
    OpponentReconnected,
    /// 心跳响应
    Pong,
    /// 错误
    Error { code: ErrorCode, message: String },
}

/// 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // 对局错误 (1xx)
    SessionNotFound = 100,
    SessionFull = 101,
    SessionClosed = 102,
    NotInSession = 103,
    AlreadyInSession = 104,

    // 走法错误 (2xx)
    NotYourTurn = 200,
    IllegalMove = 201,
    GameNotStarted = 202,
    GameAlreadyOver = 203,
    MalformedMove = 204,

    // 玩家错误 (3xx)
    InvalidNickname = 300,
    PlayerNotFound = 301,
    NicknameOccupied = 302,

    // 服务器错误 (5xx)
    InternalError = 500,
    Timeout = 501,
}
