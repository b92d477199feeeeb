//! 中断返回时的抢占决策
//!
//! 中断处理函数不直接触碰调度器: 它们只返回一个 [`IsrOutcome`],
//! 说明本次操作唤醒了哪个优先级的任务. 调度层在中断返回前
//! 通过 [`IsrOutcome::finish`] 决定是否需要切换任务.
//! [`PriorityTracker`] 记录正在被轮询的任务优先级, 供中断读取.

use core::future::{poll_fn, Future};
use core::pin::pin;

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use super::Priority;

/// 调度层接口
///
/// 固件侧由执行器实现; 测试中用记录型实现替代.
pub trait Preemption {
    /// 当前被中断的任务优先级
    fn running(&self) -> Priority;

    /// 请求在中断返回时重新调度
    fn request_switch(&self);
}

/// 中断安全操作的结果: 被唤醒任务中的最高优先级
#[must_use = "pass the outcome to `finish` so a woken higher-priority task can preempt"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsrOutcome {
    woken: Option<Priority>,
}

impl IsrOutcome {
    /// 没有任务被唤醒
    pub const NONE: IsrOutcome = IsrOutcome { woken: None };

    pub const fn woke(priority: Priority) -> Self {
        Self {
            woken: Some(priority),
        }
    }

    pub(crate) const fn from_woken(woken: Option<Priority>) -> Self {
        Self { woken }
    }

    /// 被唤醒任务中的最高优先级
    pub fn woken(&self) -> Option<Priority> {
        self.woken
    }

    /// 合并同一中断内多次操作的结果
    pub fn merge(self, other: IsrOutcome) -> Self {
        Self {
            woken: self.woken.max(other.woken),
        }
    }

    /// 被唤醒的任务是否比当前任务优先级更高
    pub fn should_yield(&self, running: Priority) -> bool {
        matches!(self.woken, Some(woken) if woken > running)
    }

    /// 中断返回前调用: 需要时请求任务切换
    ///
    /// 返回是否请求了切换.
    pub fn finish<P: Preemption + ?Sized>(self, scheduler: &P) -> bool {
        let switch = self.should_yield(scheduler.running());
        if switch {
            scheduler.request_switch();
        }
        switch
    }
}

/// 当前运行任务的优先级记录
///
/// 每个任务经 [`PriorityTracker::tracked`] 包装: 轮询期间记录本任务
/// 优先级, 返回时恢复之前的值. 中断执行器按优先级嵌套抢占,
/// 所以恢复顺序与进入顺序相反, 记录始终是最内层正在运行的任务.
/// 没有任务在轮询时为 `Priority::IDLE`.
pub struct PriorityTracker {
    current: AtomicU8,
    switches: AtomicU32,
}

impl PriorityTracker {
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(0),
            switches: AtomicU32::new(0),
        }
    }

    /// 以给定优先级运行任务
    pub async fn tracked<F: Future>(&self, priority: Priority, task: F) -> F::Output {
        let mut task = pin!(task);
        poll_fn(|cx| {
            let previous = self.current.swap(priority.level(), Ordering::AcqRel);
            let polled = task.as_mut().poll(cx);
            self.current.store(previous, Ordering::Release);
            polled
        })
        .await
    }

    /// 累计切换请求次数
    pub fn switch_requests(&self) -> u32 {
        self.switches.load(Ordering::Relaxed)
    }
}

impl Default for PriorityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Preemption for PriorityTracker {
    fn running(&self) -> Priority {
        Priority::new(self.current.load(Ordering::Acquire))
    }

    fn request_switch(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
    }
}
