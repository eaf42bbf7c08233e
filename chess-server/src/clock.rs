//! 走子计时
//!
//! 记录当前回合的开始时间，走子长时间无动作的对局由服务器中止。

use std::time::{Duration, Instant};

use protocol::MOVE_TIMEOUT;

/// 走子计时器
#[derive(Debug)]
pub struct MoveClock {
    /// 当前回合开始时间
    turn_start: Instant,
    /// 走子超时阈值
    timeout: Duration,
}

impl MoveClock {
    /// 创建新计时器，从当前时刻计时
    pub fn new() -> Self {
        Self::with_timeout(MOVE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            turn_start: Instant::now(),
            timeout,
        }
    }

    /// 走法落定，开始为下一回合计时
    pub fn record_move(&mut self) {
        self.turn_start = Instant::now();
    }

    /// 重置回合起点（断线重连后调用，断线期间不计入思考时间）
    pub fn reset_turn_start(&mut self) {
        self.turn_start = Instant::now();
    }

    /// 当前回合已经过的时间
    pub fn idle(&self) -> Duration {
        self.turn_start.elapsed()
    }

    /// 当前回合是否超时
    pub fn timed_out(&self) -> bool {
        self.idle() >= self.timeout
    }
}

impl Default for MoveClock {
    fn default() -> Self {
        Self::new()
    }
}
