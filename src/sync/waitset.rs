//! 阻塞任务登记表
//!
//! 记录在某个同步原语上阻塞的任务 (waker + 优先级), 按到达顺序排列.
//! 每次释放只唤醒一个任务: 优先级最高者, 同优先级先到先得.
//! 被唤醒的任务随即移出登记表, 再次阻塞时重新登记.
//! 只能在原语内部的临界区中访问.

use core::task::Waker;

use embassy_sync::waitqueue::WakerRegistration;
use heapless::Vec;

use crate::config::MAX_WAITERS;
use crate::sched::Priority;

/// 登记凭据, 用于刷新 waker 和注销
pub(crate) type WaitToken = u32;

struct Entry {
    token: WaitToken,
    priority: Priority,
    waker: WakerRegistration,
}

pub(crate) struct WaitSet {
    entries: Vec<Entry, MAX_WAITERS>,
    next_token: WaitToken,
}

impl WaitSet {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 0,
        }
    }

    /// 登记阻塞任务, 已登记时只刷新 waker
    ///
    /// 表满时返回 `None` 并立即唤醒调用方, 让它下次轮询时重试.
    pub(crate) fn park(&mut self, token: Option<WaitToken>, priority: Priority, waker: &Waker) -> Option<WaitToken> {
        if let Some(token) = token {
            if let Some(entry) = self.entries.iter_mut().find(|entry| entry.token == token) {
                entry.waker.register(waker);
                return Some(token);
            }
        }

        let token = self.next_token;
        let mut registration = WakerRegistration::new();
        registration.register(waker);
        let entry = Entry {
            token,
            priority,
            waker: registration,
        };
        match self.entries.push(entry) {
            Ok(()) => {
                self.next_token = token.wrapping_add(1);
                Some(token)
            }
            Err(_) => {
                waker.wake_by_ref();
                None
            }
        }
    }

    /// 注销; 已被唤醒 (不在表中) 时返回 false
    pub(crate) fn leave(&mut self, token: WaitToken) -> bool {
        match self.entries.iter().position(|entry| entry.token == token) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// 唤醒优先级最高 (同级最早) 的一个任务, 返回其优先级
    pub(crate) fn wake(&mut self) -> Option<Priority> {
        let mut chosen: Option<usize> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if chosen.map_or(true, |best| entry.priority > self.entries[best].priority) {
                chosen = Some(index);
            }
        }

        let mut entry = self.entries.remove(chosen?);
        entry.waker.wake();
        Some(entry.priority)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Wake;

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl Wake for Count {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<Count>, Waker) {
        let count = Arc::new(Count::default());
        (count.clone(), Waker::from(count))
    }

    #[test]
    fn test_wakes_highest_then_oldest() {
        let mut set = WaitSet::new();
        let (first_low, w1) = counting();
        let (high, w2) = counting();
        let (second_low, w3) = counting();

        set.park(None, Priority::new(1), &w1);
        set.park(None, Priority::new(3), &w2);
        set.park(None, Priority::new(1), &w3);

        assert_eq!(set.wake(), Some(Priority::new(3)));
        assert_eq!(high.0.load(Ordering::SeqCst), 1);
        assert_eq!(first_low.0.load(Ordering::SeqCst), 0);

        assert_eq!(set.wake(), Some(Priority::new(1)));
        assert_eq!(first_low.0.load(Ordering::SeqCst), 1);
        assert_eq!(second_low.0.load(Ordering::SeqCst), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_leave_after_wake_reports_absence() {
        let mut set = WaitSet::new();
        let (_count, waker) = counting();

        let token = set.park(None, Priority::IDLE, &waker).unwrap();
        assert_eq!(set.park(Some(token), Priority::IDLE, &waker), Some(token));
        assert_eq!(set.len(), 1);

        set.wake();
        assert!(!set.leave(token));
        assert_eq!(set.wake(), None);
    }

    #[test]
    fn test_full_table_wakes_caller_to_retry() {
        let mut set = WaitSet::new();
        let (_count, waker) = counting();
        for _ in 0..MAX_WAITERS {
            assert!(set.park(None, Priority::IDLE, &waker).is_some());
        }

        let (overflow, extra) = counting();
        assert_eq!(set.park(None, Priority::IDLE, &extra), None);
        assert_eq!(overflow.0.load(Ordering::SeqCst), 1);
    }
}
