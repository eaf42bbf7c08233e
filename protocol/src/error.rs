//! 错误类型定义

use thiserror::Error;

use crate::piece::Square;

/// 棋规错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的格子坐标
    #[error("Invalid square: ({file}, {rank})")]
    InvalidSquare { file: i8, rank: i8 },

    /// 非法走法（不在当前局面的合法走法集合内）
    #[error("Illegal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },

    /// 格子上没有棋子
    #[error("No piece at {square}")]
    NoPiece { square: Square },

    /// 不是你的回合
    #[error("Not your turn")]
    NotYourTurn,

    /// 对局已终结，不再接受走法
    #[error("Session is closed")]
    SessionClosed,

    /// 无法解析的走法输入
    #[error("Malformed move: {input}")]
    MalformedMove { input: String },

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },

    /// 引擎内部不变量被破坏（规则引擎缺陷，不可恢复）
    #[error("Engine invariant violated: {reason}")]
    InvariantViolation { reason: String },
}

impl ChessError {
    /// 是否为致命错误（必须终止对局，而不是报告给用户）
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChessError::InvariantViolation { .. })
    }
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 昵称为空
    #[error("Nickname is empty")]
    NicknameEmpty,

    /// 昵称过长
    #[error("Nickname too long: {len} chars (max: {max})")]
    NicknameTooLong { len: usize, max: usize },

    /// 昵称已被占用
    #[error("Nickname is already occupied")]
    NicknameOccupied,

    /// 棋规错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
