//! 进程级上下文
//!
//! 邮箱、按键事件信号、串口发送游标在调度器启动前创建一次,
//! 之后以只读引用的形式交给每个任务和中断处理函数, 不再修改.

use crate::config::MAILBOX_CAPACITY;
use crate::isr::TxCursor;
use crate::message::Message;
use crate::sched::Priority;
use crate::sync::{BinaryEventSignal, Mailbox, Receiver, Sender};

/// 显示消息邮箱
pub type PrintMailbox = Mailbox<Message, MAILBOX_CAPACITY>;

/// 显示消息发送端
pub type PrintSender<'a> = Sender<'a, Message, MAILBOX_CAPACITY>;

/// 显示消息接收端
pub type PrintReceiver<'a> = Receiver<'a, Message, MAILBOX_CAPACITY>;

/// 共享资源的存储
///
/// # Example
/// ```ignore
/// static RESOURCES: PipelineResources = PipelineResources::new();
/// let ctx = RESOURCES.context();
/// ```
pub struct PipelineResources {
    mailbox: PrintMailbox,
    button: BinaryEventSignal,
    tx: TxCursor,
}

impl PipelineResources {
    pub const fn new() -> Self {
        Self {
            mailbox: Mailbox::new(),
            button: BinaryEventSignal::new(),
            tx: TxCursor::new(),
        }
    }

    /// 借出只读上下文
    pub fn context(&self) -> PipelineContext<'_> {
        PipelineContext {
            mailbox: &self.mailbox,
            button: &self.button,
            tx: &self.tx,
        }
    }
}

impl Default for PipelineResources {
    fn default() -> Self {
        Self::new()
    }
}

/// 任务与中断共享的只读上下文
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    /// 生产者 → 显示消费者
    pub mailbox: &'a PrintMailbox,
    /// 按键中断 → 按键处理任务
    pub button: &'a BinaryEventSignal,
    /// 串口发送游标
    pub tx: &'a TxCursor,
}

impl<'a> PipelineContext<'a> {
    pub fn sender(&self, priority: Priority) -> PrintSender<'a> {
        self.mailbox.sender(priority)
    }

    pub fn receiver(&self, priority: Priority) -> PrintReceiver<'a> {
        self.mailbox.receiver(priority)
    }
}
