//! 同步原语封装
//!
//! 基于 embassy-sync / portable-atomic 的轻量工具. 通道统一使用
//! CriticalSectionRawMutex, 原子类型在 Xtensa 上由 portable-atomic 的
//! 临界区回退实现 64 位操作.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

// ===== 类型别名 =====

/// 临界区通道 - MPMC 消息队列
///
/// 后台自检负载用它验证阻塞队列; 管线本身使用 [`super::Mailbox`],
/// 后者额外报告被唤醒任务的优先级.
///
/// # Example
/// ```ignore
/// static CHANNEL: CriticalChannel<u16, 4> = CriticalChannel::new();
///
/// CHANNEL.send(7).await;
/// let value = CHANNEL.receive().await;
/// ```
pub type CriticalChannel<T, const N: usize> = Channel<CriticalSectionRawMutex, T, N>;

// ===== 原子操作封装 =====

/// 原子标志 - 置位后保持, 不可清除
///
/// 用作自检负载的错误标志
pub struct AtomicFlag {
    flag: AtomicBool,
}

impl AtomicFlag {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    #[inline(always)]
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// 是否已置位
    #[inline(always)]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// 原子计数器 - 用于统计和存活心跳
pub struct AtomicCounter {
    count: AtomicU64,
}

impl AtomicCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// 增加并返回新值
    #[inline(always)]
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// 写入新值并返回旧值
    #[inline(always)]
    pub fn swap(&self, value: u64) -> u64 {
        self.count.swap(value, Ordering::Relaxed)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_stays_set() {
        let flag = AtomicFlag::new();
        assert!(!flag.is_set());

        flag.set();
        flag.set();
        assert!(flag.is_set());
    }

    #[test]
    fn test_counter_swap_returns_previous() {
        let counter = AtomicCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.swap(10), 2);
        assert_eq!(counter.get(), 10);
    }
}
