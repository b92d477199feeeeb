//! 周期任务调度
//!
//! 每个周期的唤醒时刻 = 上一次唤醒时刻 + 周期, 而不是 "现在 + 周期".
//! 只要任务体耗时小于周期, 唤醒序列就是 t0+P, t0+2P, t0+3P, ...
//! 任务体耗时的波动不会累积成漂移.

use embassy_time::{Duration, Instant, Timer};

/// 绝对时间锚定的周期唤醒
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicSchedule {
    /// 上一次 (计划的) 唤醒时刻
    last_wake: Instant,
    /// 固定周期
    period: Duration,
}

impl PeriodicSchedule {
    /// 以给定时刻为锚点
    pub const fn starting_at(start: Instant, period: Duration) -> Self {
        Self {
            last_wake: start,
            period,
        }
    }

    /// 以当前时刻为锚点
    pub fn start_now(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 上一次计划唤醒的时刻
    pub fn last_wake(&self) -> Instant {
        self.last_wake
    }

    /// 计算下一个唤醒时刻并推进锚点
    #[inline]
    pub fn advance(&mut self) -> Instant {
        self.last_wake += self.period;
        self.last_wake
    }

    /// 挂起直到下一个唤醒时刻
    ///
    /// 若该时刻已过 (任务体超时), 立即返回, 锚点照常推进.
    pub async fn next(&mut self) {
        let at = self.advance();
        Timer::at(at).await;
    }
}
