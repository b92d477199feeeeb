//! 同步原语模块
//!
//! - `Mailbox`: 有界 FIFO 邮箱, 多生产者单消费者
//! - `BinaryEventSignal`: 中断到任务的二值事件信号
//! - `CriticalChannel` / `AtomicFlag` / `AtomicCounter`: embassy-sync 与原子操作封装
//! - `RingBuffer`: 无锁 SPSC 环形缓冲区

pub mod event;
pub mod mailbox;
pub mod primitives;
pub mod ringbuffer;

mod waitset;

pub use event::{BinaryEventSignal, EventWaiter};
pub use mailbox::{Mailbox, Receiver, Sender};
pub use primitives::{AtomicCounter, AtomicFlag, CriticalChannel};
pub use ringbuffer::RingBuffer;
