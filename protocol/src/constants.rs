//! 协议常量定义

use std::time::Duration;

/// 协议版本号
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（8x8）
pub const BOARD_SIZE: usize = 8;

/// 昵称最大长度
pub const MAX_NICKNAME_LEN: usize = 20;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 服务端最大连接数
pub const MAX_CONNECTIONS: usize = 100;

/// 客户端心跳间隔（秒）
pub const HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 断线重连超时（秒）
pub const RECONNECT_TIMEOUT_SECS: u64 = 60;

/// 走棋超时（秒）- 自上次收到走法起超过此时间未走棋则终止对局
pub const MOVE_TIMEOUT_SECS: u64 = 300;

/// 心跳间隔 Duration
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 断线重连超时 Duration
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(RECONNECT_TIMEOUT_SECS);

/// 走棋超时 Duration
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(MOVE_TIMEOUT_SECS);
