//! 国际象棋对弈服务端
//!
//! 包含:
//! - 对局系统
//! - 玩家管理
//! - 走子计时
//! - 快照存储

pub mod clock;
pub mod player;
pub mod server;
pub mod session;
pub mod storage;

pub use clock::MoveClock;
pub use player::{Player, PlayerManager, PlayerStatus};
pub use server::{MessageHandler, ServerState};
pub use session::{Session, SessionManager};
pub use storage::{SnapshotStore, SnapshotInfo};
