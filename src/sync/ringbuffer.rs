//! 无锁 SPSC 环形缓冲区
//!
//! 单生产者单消费者, 只用原子下标同步, 两端都不会阻塞.
//! 轮询队列自检负载用它在两个任务之间传递序列号.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use portable_atomic::{AtomicUsize, Ordering};

/// SPSC 环形缓冲区
///
/// # Type Parameters
/// * `T` - 元素类型
/// * `N` - 容量 (必须是 2 的幂以优化取模运算)
///
/// # Example
/// ```ignore
/// static QUEUE: RingBuffer<u16, 8> = RingBuffer::new();
///
/// // 生产者
/// if !QUEUE.try_push(seq) { /* 已满, 稍后重试 */ }
///
/// // 消费者
/// while let Some(seq) = QUEUE.try_pop() { check(seq); }
/// ```
pub struct RingBuffer<T, const N: usize> {
    buffer: UnsafeCell<[MaybeUninit<T>; N]>,
    /// 写入位置 (生产者更新)
    head: AtomicUsize,
    /// 读取位置 (消费者更新)
    tail: AtomicUsize,
}

// Safety: 生产者只写 head 指向的槽位, 消费者只读 tail 指向的槽位,
// 两者通过 Release/Acquire 下标交接
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    /// 创建新的空环形缓冲区
    ///
    /// # Panics
    /// 编译时检查 N 必须是 2 的幂
    pub const fn new() -> Self {
        assert!(N > 0 && (N & (N - 1)) == 0, "N must be a power of 2");

        Self {
            buffer: UnsafeCell::new([const { MaybeUninit::uninit() }; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 当前元素数量
    #[inline(always)]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// 掩码 (用于快速取模)
    #[inline(always)]
    const fn mask(&self) -> usize {
        N - 1
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// 尝试写入单个元素, 已满返回 false
    ///
    /// 只能由单个生产者调用.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= N {
            return false;
        }

        let idx = head & self.mask();
        unsafe {
            let slot = (*self.buffer.get()).as_mut_ptr().add(idx);
            (*slot).write(value);
        }

        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// 尝试读取单个元素, 为空返回 None
    ///
    /// 只能由单个消费者调用.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);

        if head == tail {
            return None;
        }

        let idx = tail & self.mask();
        let value = unsafe {
            let slot = (*self.buffer.get()).as_ptr().add(idx);
            (*slot).assume_init_read()
        };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let buf: RingBuffer<u32, 4> = RingBuffer::new();

        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);

        for i in 1..=4 {
            assert!(buf.try_push(i));
        }
        assert!(buf.is_full());
        assert!(!buf.try_push(5));

        assert_eq!(buf.try_pop(), Some(1));
        assert_eq!(buf.try_pop(), Some(2));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_wraps_around() {
        let buf: RingBuffer<u16, 2> = RingBuffer::new();

        for i in 0..10u16 {
            assert!(buf.try_push(i));
            assert_eq!(buf.try_pop(), Some(i));
        }
        assert_eq!(buf.try_pop(), None);
    }
}
