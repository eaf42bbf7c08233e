//! 国际象棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘、局面等核心数据结构
//! - 走法生成和规则引擎
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 帧编解码 (FrameReader, FrameWriter)
//! - 对局快照格式 (JSON, FEN)

mod board;
mod constants;
mod error;
mod fen;
mod message;
mod moves;
mod notation;
mod piece;
mod record;
mod rules;
mod transport;

pub use board::{Board, BoardState, CastlingRights};
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use message::{
    AbortReason, ClientMessage, ErrorCode, GameResult, PlayerId, ServerMessage, SessionId,
    SessionInfo, SessionState, WinReason,
};
pub use moves::{Move, MoveGenerator, MoveKind};
pub use notation::Notation;
pub use piece::{Piece, PieceKind, Side, Square};
pub use record::GameSnapshot;
pub use rules::{DrawReason, GameStatus, RuleEngine};
pub use transport::{
    Connection, Connector, FrameReader, FrameWriter, Listener, TcpConnection, TcpConnector,
    TcpListener,
};
