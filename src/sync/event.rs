//! 二值事件信号
//!
//! 计数上限为 1 的信号量, 用于把边沿触发的硬件事件从中断交给任务:
//! - 未被消费前重复释放是空操作, 至多记住一次
//! - 中断侧释放从不阻塞, 并报告唤醒了哪个优先级的任务
//! - 任务侧获取可阻塞, 可指定最长等待

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::with_timeout;

use super::waitset::{WaitSet, WaitToken};
use crate::error::SignalError;
use crate::sched::{IsrOutcome, MaxWait, Priority};

struct EventState {
    given: bool,
    waiters: WaitSet,
}

/// 二值事件信号, 初始为未释放
///
/// # Example
/// ```ignore
/// static BUTTON: BinaryEventSignal = BinaryEventSignal::new();
///
/// // 中断
/// let outcome = BUTTON.give_from_isr();
/// outcome.finish(&scheduler);
///
/// // 任务
/// BUTTON.waiter(Priority::new(3)).take(MaxWait::Forever).await?;
/// ```
pub struct BinaryEventSignal {
    state: Mutex<CriticalSectionRawMutex, RefCell<EventState>>,
}

impl BinaryEventSignal {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(EventState {
                given: false,
                waiters: WaitSet::new(),
            })),
        }
    }

    /// 是否处于已释放 (待消费) 状态
    pub fn is_given(&self) -> bool {
        self.state.lock(|cell| cell.borrow().given)
    }

    /// 阻塞在本信号上的任务数
    pub fn waiting(&self) -> usize {
        self.state.lock(|cell| cell.borrow().waiters.len())
    }

    /// 任务侧释放, 已释放时返回 false
    pub fn give(&self) -> bool {
        self.release().is_some()
    }

    /// 中断侧释放: 不阻塞, 报告被唤醒的最高优先级
    ///
    /// 已处于释放状态时为空操作, 不唤醒任何任务.
    pub fn give_from_isr(&self) -> IsrOutcome {
        IsrOutcome::from_woken(self.release().flatten())
    }

    /// 非阻塞获取
    pub fn try_take(&self) -> bool {
        self.state.lock(|cell| core::mem::replace(&mut cell.borrow_mut().given, false))
    }

    /// 以给定任务优先级获取等待端
    pub fn waiter(&self, priority: Priority) -> EventWaiter<'_> {
        EventWaiter { signal: self, priority }
    }

    /// 新释放时返回 `Some(被唤醒的最高优先级)`, 已释放时返回 `None`
    fn release(&self) -> Option<Option<Priority>> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            if state.given {
                return None;
            }
            state.given = true;
            Some(state.waiters.wake())
        })
    }

    async fn wait_given(&self, priority: Priority) {
        let mut parked = Parked {
            signal: self,
            token: None,
        };
        poll_fn(|cx| {
            self.state.lock(|cell| {
                let mut state = cell.borrow_mut();
                if state.given {
                    state.given = false;
                    if let Some(token) = parked.token.take() {
                        state.waiters.leave(token);
                    }
                    Poll::Ready(())
                } else {
                    parked.token = state.waiters.park(parked.token, priority, cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }
}

impl Default for BinaryEventSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待期间的登记, 丢弃时注销
///
/// 已被唤醒却没取走信号就被丢弃时, 把唤醒转交给下一个等待者.
struct Parked<'a> {
    signal: &'a BinaryEventSignal,
    token: Option<WaitToken>,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        let Some(token) = self.token else {
            return;
        };
        self.signal.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            if !state.waiters.leave(token) && state.given {
                state.waiters.wake();
            }
        });
    }
}

/// 事件等待端, 携带所属任务的优先级
#[derive(Clone, Copy)]
pub struct EventWaiter<'a> {
    signal: &'a BinaryEventSignal,
    priority: Priority,
}

impl EventWaiter<'_> {
    /// 获取信号, 未释放时最多等待 `wait`
    pub async fn take(&self, wait: MaxWait) -> Result<(), SignalError> {
        match wait {
            MaxWait::Immediate => {
                if self.signal.try_take() {
                    Ok(())
                } else {
                    Err(SignalError::NotGiven)
                }
            }
            MaxWait::Forever => {
                self.signal.wait_given(self.priority).await;
                Ok(())
            }
            MaxWait::For(limit) => with_timeout(limit, self.signal.wait_given(self.priority))
                .await
                .map_err(|_| SignalError::Timeout),
        }
    }
}
