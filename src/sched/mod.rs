//! 调度模型
//!
//! 调度器本身 (就绪队列、上下文切换、时钟中断) 由 Embassy 执行器提供,
//! 本模块只描述核心层需要的调度语义:
//! - `Priority`: 静态任务优先级
//! - `TaskSpec`: 任务描述 (名称、栈预算、优先级)
//! - `MaxWait`: 阻塞操作的最长等待
//! - `periodic`: 绝对时间锚定的周期唤醒
//! - `isr`: 中断返回时的抢占决策与运行优先级记录

pub mod isr;
pub mod periodic;

pub use isr::{IsrOutcome, Preemption, PriorityTracker};
pub use periodic::PeriodicSchedule;

use embassy_time::Duration;

/// 静态任务优先级, 数值越大越优先
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub struct Priority(u8);

impl Priority {
    /// 空闲优先级
    pub const IDLE: Priority = Priority(0);

    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// 比当前高 `levels` 级
    pub const fn above(self, levels: u8) -> Self {
        Self(self.0 + levels)
    }

    pub const fn level(self) -> u8 {
        self.0
    }
}

/// 任务描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// 任务名称 (日志用)
    pub name: &'static str,
    /// 栈预算 (字节)
    pub stack_bytes: usize,
    /// 静态优先级
    pub priority: Priority,
}

impl TaskSpec {
    pub const fn new(name: &'static str, stack_bytes: usize, priority: Priority) -> Self {
        Self {
            name,
            stack_bytes,
            priority,
        }
    }
}

/// 阻塞操作的最长等待时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxWait {
    /// 不等待, 无法立即完成则失败
    Immediate,
    /// 最多等待给定时长
    For(Duration),
    /// 无限等待
    Forever,
}

impl MaxWait {
    /// 以毫秒指定的有界等待, 0 等价于 `Immediate`
    pub const fn millis(ms: u64) -> Self {
        if ms == 0 {
            MaxWait::Immediate
        } else {
            MaxWait::For(Duration::from_millis(ms))
        }
    }
}
