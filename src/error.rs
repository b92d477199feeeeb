//! 错误类型
//!
//! 所有错误都是可复制的小枚举, 不分配内存.
//! 中断上下文没有错误上报通道, 越界等问题在构造上避免, 不在此处建模.

/// 邮箱操作失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum MailboxError {
    /// 邮箱已满 (非阻塞发送)
    Full,
    /// 邮箱为空 (非阻塞接收)
    Empty,
    /// 最长等待时间已到
    Timeout,
}

/// 发送失败时把消息交还给调用方
///
/// 消息只有在成功入队后才转移所有权.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected<M> {
    /// 失败原因
    pub error: MailboxError,
    /// 未能发送的消息
    pub message: M,
}

impl<M> Rejected<M> {
    pub(crate) const fn new(error: MailboxError, message: M) -> Self {
        Self { error, message }
    }

    /// 取回消息
    pub fn into_inner(self) -> M {
        self.message
    }
}

/// 二值事件信号获取失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum SignalError {
    /// 信号未释放 (非阻塞获取)
    NotGiven,
    /// 最长等待时间已到
    Timeout,
}
