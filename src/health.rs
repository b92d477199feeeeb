//! 健康状态锁存
//!
//! 聚合结果一旦为不健康, 在进程剩余生命周期内永远报告失败:
//! 状态只有 `Healthy → Failed` 一条单向转移.

use crate::hal::HealthCheck;
use crate::util::log::*;

/// 对外报告的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum HealthStatus {
    Pass,
    Fail,
}

impl HealthStatus {
    /// 显示用的固定文本
    pub const fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Pass => "PASS",
            HealthStatus::Fail => "FAIL",
        }
    }
}

/// 单向失败锁存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum HealthLatch {
    #[default]
    Healthy,
    Failed,
}

impl HealthLatch {
    pub const fn new() -> Self {
        HealthLatch::Healthy
    }

    /// 记录一次聚合结果
    ///
    /// 返回本次是否发生了 `Healthy → Failed` 转移.
    /// 已失败时忽略后续任何结果.
    pub fn observe(&mut self, all_running: bool) -> bool {
        match (*self, all_running) {
            (HealthLatch::Healthy, false) => {
                *self = HealthLatch::Failed;
                true
            }
            _ => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, HealthLatch::Failed)
    }

    pub fn status(&self) -> HealthStatus {
        match self {
            HealthLatch::Healthy => HealthStatus::Pass,
            HealthLatch::Failed => HealthStatus::Fail,
        }
    }
}

/// 查询全部负载, 全部存活才返回 true
///
/// 不短路: 每个负载的查询都会执行, 各自的心跳基线因此同步推进.
pub fn all_running(checks: &[&dyn HealthCheck]) -> bool {
    checks.iter().fold(true, |ok, check| {
        let alive = check.still_running();
        if !alive {
            log_debug!("Health check '{}' reported stalled", check.name());
        }
        ok & alive
    })
}
