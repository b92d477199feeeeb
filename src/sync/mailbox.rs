//! 有界邮箱
//!
//! 固定容量、固定消息类型的 FIFO 队列:
//! - 多个生产者按全局到达顺序入队, 单个消费者按相同顺序出队
//! - 满时发送阻塞, 空时接收阻塞, 均可指定最长等待
//! - `*_from_isr` 变体从不阻塞, 并报告唤醒了哪个优先级的任务
//!
//! 实现方式与 embassy-sync 的 `Channel` 相同: 阻塞互斥锁保护的
//! `heapless::Deque`, 外加发送方/接收方两张等待登记表.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::with_timeout;
use heapless::Deque;

use super::waitset::{WaitSet, WaitToken};
use crate::error::{MailboxError, Rejected};
use crate::sched::{IsrOutcome, MaxWait, Priority};

struct State<M, const N: usize> {
    queue: Deque<M, N>,
    senders: WaitSet,
    receivers: WaitSet,
}

impl<M, const N: usize> State<M, N> {
    fn waiters(&mut self, side: Side) -> &mut WaitSet {
        match side {
            Side::Send => &mut self.senders,
            Side::Receive => &mut self.receivers,
        }
    }

    /// 该侧的等待条件是否已满足
    fn ready(&self, side: Side) -> bool {
        match side {
            Side::Send => !self.queue.is_full(),
            Side::Receive => !self.queue.is_empty(),
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Send,
    Receive,
}

/// 有界邮箱
///
/// # Type Parameters
/// * `M` - 消息类型 (大小在创建时固定)
/// * `N` - 容量
///
/// # Example
/// ```ignore
/// static MAILBOX: Mailbox<Message, 3> = Mailbox::new();
///
/// // 生产者 (满时阻塞)
/// MAILBOX.sender(Priority::new(1)).post(msg).await;
///
/// // 消费者 (空时阻塞)
/// let msg = MAILBOX.receiver(Priority::new(2)).recv().await;
/// ```
pub struct Mailbox<M, const N: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<State<M, N>>>,
}

impl<M, const N: usize> Mailbox<M, N> {
    /// 创建空邮箱
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                queue: Deque::new(),
                senders: WaitSet::new(),
                receivers: WaitSet::new(),
            })),
        }
    }

    /// 容量
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 当前消息数量
    pub fn len(&self) -> usize {
        self.state.lock(|cell| cell.borrow().queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// 因邮箱已满而阻塞的发送任务数
    pub fn waiting_senders(&self) -> usize {
        self.state.lock(|cell| cell.borrow().senders.len())
    }

    /// 因邮箱为空而阻塞的接收任务数
    pub fn waiting_receivers(&self) -> usize {
        self.state.lock(|cell| cell.borrow().receivers.len())
    }

    /// 以给定任务优先级获取发送端
    pub fn sender(&self, priority: Priority) -> Sender<'_, M, N> {
        Sender {
            mailbox: self,
            priority,
        }
    }

    /// 以给定任务优先级获取接收端
    pub fn receiver(&self, priority: Priority) -> Receiver<'_, M, N> {
        Receiver {
            mailbox: self,
            priority,
        }
    }

    /// 非阻塞发送
    pub fn try_send(&self, message: M) -> Result<(), Rejected<M>> {
        self.send_from_isr(message).map(|_outcome| ())
    }

    /// 非阻塞接收
    pub fn try_receive(&self) -> Result<M, MailboxError> {
        self.receive_from_isr().map(|(message, _outcome)| message)
    }

    /// 中断安全发送: 从不阻塞, 满时立即失败
    ///
    /// 成功时返回被唤醒的接收任务中的最高优先级,
    /// 调用方在中断返回前把它交给调度层.
    pub fn send_from_isr(&self, message: M) -> Result<IsrOutcome, Rejected<M>> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match state.queue.push_back(message) {
                Ok(()) => Ok(IsrOutcome::from_woken(state.receivers.wake())),
                Err(message) => Err(Rejected::new(MailboxError::Full, message)),
            }
        })
    }

    /// 中断安全接收: 从不阻塞, 空时立即失败
    pub fn receive_from_isr(&self) -> Result<(M, IsrOutcome), MailboxError> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match state.queue.pop_front() {
                Some(message) => {
                    let outcome = IsrOutcome::from_woken(state.senders.wake());
                    Ok((message, outcome))
                }
                None => Err(MailboxError::Empty),
            }
        })
    }

    async fn send_as(&self, priority: Priority, message: M, wait: MaxWait) -> Result<(), Rejected<M>> {
        match wait {
            MaxWait::Immediate => self.try_send(message),
            MaxWait::Forever => {
                let mut slot = Some(message);
                self.push_waiting(priority, &mut slot).await;
                Ok(())
            }
            MaxWait::For(limit) => {
                let mut slot = Some(message);
                let result = with_timeout(limit, self.push_waiting(priority, &mut slot)).await;
                // 超时则消息仍在 slot 中, 交还调用方
                match (result, slot.take()) {
                    (Err(_), Some(message)) => Err(Rejected::new(MailboxError::Timeout, message)),
                    _ => Ok(()),
                }
            }
        }
    }

    async fn receive_as(&self, priority: Priority, wait: MaxWait) -> Result<M, MailboxError> {
        match wait {
            MaxWait::Immediate => self.try_receive(),
            MaxWait::Forever => Ok(self.pop_waiting(priority).await),
            MaxWait::For(limit) => with_timeout(limit, self.pop_waiting(priority))
                .await
                .map_err(|_| MailboxError::Timeout),
        }
    }

    async fn push_waiting(&self, priority: Priority, slot: &mut Option<M>) {
        let mut waiting = Waiting::new(self, Side::Send, priority);
        poll_fn(|cx| self.poll_push(slot, &mut waiting, cx)).await
    }

    async fn pop_waiting(&self, priority: Priority) -> M {
        let mut waiting = Waiting::new(self, Side::Receive, priority);
        poll_fn(|cx| self.poll_pop(&mut waiting, cx)).await
    }

    fn poll_push(&self, slot: &mut Option<M>, waiting: &mut Waiting<'_, M, N>, cx: &mut Context<'_>) -> Poll<()> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let Some(message) = slot.take() else {
                return Poll::Ready(());
            };
            match state.queue.push_back(message) {
                Ok(()) => {
                    waiting.settle(&mut state);
                    state.receivers.wake();
                    Poll::Ready(())
                }
                Err(message) => {
                    *slot = Some(message);
                    waiting.park(&mut state, cx);
                    Poll::Pending
                }
            }
        })
    }

    fn poll_pop(&self, waiting: &mut Waiting<'_, M, N>, cx: &mut Context<'_>) -> Poll<M> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match state.queue.pop_front() {
                Some(message) => {
                    waiting.settle(&mut state);
                    state.senders.wake();
                    Poll::Ready(message)
                }
                None => {
                    waiting.park(&mut state, cx);
                    Poll::Pending
                }
            }
        })
    }
}

impl<M, const N: usize> Default for Mailbox<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次阻塞等待在登记表中的存在期
///
/// future 被丢弃 (例如超时) 时自动注销. 若丢弃前已被唤醒却没来得及
/// 收发, 把这次唤醒转交给下一个等待者.
struct Waiting<'a, M, const N: usize> {
    mailbox: &'a Mailbox<M, N>,
    side: Side,
    priority: Priority,
    token: Option<WaitToken>,
}

impl<'a, M, const N: usize> Waiting<'a, M, N> {
    fn new(mailbox: &'a Mailbox<M, N>, side: Side, priority: Priority) -> Self {
        Self {
            mailbox,
            side,
            priority,
            token: None,
        }
    }

    fn park(&mut self, state: &mut State<M, N>, cx: &mut Context<'_>) {
        self.token = state.waiters(self.side).park(self.token, self.priority, cx.waker());
    }

    fn settle(&mut self, state: &mut State<M, N>) {
        if let Some(token) = self.token.take() {
            state.waiters(self.side).leave(token);
        }
    }
}

impl<M, const N: usize> Drop for Waiting<'_, M, N> {
    fn drop(&mut self) {
        let Some(token) = self.token else {
            return;
        };
        self.mailbox.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let ready = state.ready(self.side);
            let waiters = state.waiters(self.side);
            if !waiters.leave(token) && ready {
                waiters.wake();
            }
        });
    }
}

/// 邮箱发送端, 携带所属任务的优先级
pub struct Sender<'a, M, const N: usize> {
    mailbox: &'a Mailbox<M, N>,
    priority: Priority,
}

impl<M, const N: usize> Clone for Sender<'_, M, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, const N: usize> Copy for Sender<'_, M, N> {}

impl<'a, M, const N: usize> Sender<'a, M, N> {
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// 发送, 邮箱满时最多等待 `wait`
    pub async fn send(&self, message: M, wait: MaxWait) -> Result<(), Rejected<M>> {
        self.mailbox.send_as(self.priority, message, wait).await
    }

    /// 无限等待发送: 背压表现为调度延迟, 从不丢弃消息
    pub async fn post(&self, message: M) {
        let mut slot = Some(message);
        self.mailbox.push_waiting(self.priority, &mut slot).await
    }

    pub fn try_send(&self, message: M) -> Result<(), Rejected<M>> {
        self.mailbox.try_send(message)
    }
}

/// 邮箱接收端, 携带所属任务的优先级
pub struct Receiver<'a, M, const N: usize> {
    mailbox: &'a Mailbox<M, N>,
    priority: Priority,
}

impl<M, const N: usize> Clone for Receiver<'_, M, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, const N: usize> Copy for Receiver<'_, M, N> {}

impl<'a, M, const N: usize> Receiver<'a, M, N> {
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// 接收, 邮箱空时最多等待 `wait`
    pub async fn receive(&self, wait: MaxWait) -> Result<M, MailboxError> {
        self.mailbox.receive_as(self.priority, wait).await
    }

    /// 无限等待接收
    pub async fn recv(&self) -> M {
        self.mailbox.pop_waiting(self.priority).await
    }

    pub fn try_receive(&self) -> Result<M, MailboxError> {
        self.mailbox.try_receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;
    use embassy_futures::join::join;
    use embassy_futures::{block_on, poll_once};

    const LOW: Priority = Priority::new(1);
    const MID: Priority = Priority::new(2);
    const HIGH: Priority = Priority::new(3);

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mailbox: Mailbox<u32, 3> = Mailbox::new();

        assert!(mailbox.is_empty());
        assert_eq!(mailbox.capacity(), 3);

        for i in 0..3 {
            assert!(mailbox.try_send(i).is_ok());
        }
        assert!(mailbox.is_full());

        let rejected = mailbox.try_send(99).unwrap_err();
        assert_eq!(rejected.error, MailboxError::Full);
        assert_eq!(rejected.into_inner(), 99);
        assert_eq!(mailbox.len(), 3);
    }

    #[test]
    fn test_send_blocks_when_full_without_overwriting() {
        let mailbox: Mailbox<u32, 3> = Mailbox::new();
        let sender = mailbox.sender(LOW);
        for i in 0..3 {
            sender.try_send(i).unwrap();
        }

        {
            let mut send = pin!(sender.send(42, MaxWait::Forever));
            assert!(poll_once(send.as_mut()).is_pending());
            assert_eq!(mailbox.waiting_senders(), 1);
        }

        // 丢弃的 future 自动注销, 队列内容不变
        assert_eq!(mailbox.waiting_senders(), 0);
        assert_eq!(mailbox.len(), 3);
        assert_eq!(mailbox.try_receive(), Ok(0));
        assert_eq!(mailbox.try_receive(), Ok(1));
        assert_eq!(mailbox.try_receive(), Ok(2));
        assert_eq!(mailbox.try_receive(), Err(MailboxError::Empty));
    }

    #[test]
    fn test_blocked_sender_resumes_after_receive() {
        let mailbox: Mailbox<u32, 3> = Mailbox::new();
        let sender = mailbox.sender(LOW);
        let receiver = mailbox.receiver(MID);
        for i in 1..=3 {
            sender.try_send(i).unwrap();
        }

        let ((), first) = block_on(join(sender.post(4), receiver.recv()));

        assert_eq!(first, 1);
        assert_eq!(mailbox.len(), 3);
        let rest: [u32; 3] = core::array::from_fn(|_| mailbox.try_receive().unwrap());
        assert_eq!(rest, [2, 3, 4]);
    }

    #[test]
    fn test_receive_order_is_global_send_order() {
        let mailbox: Mailbox<(char, u32), 3> = Mailbox::new();
        let sensor = mailbox.sender(LOW);
        let monitor = mailbox.sender(HIGH);
        let receiver = mailbox.receiver(MID);

        let sent = [('s', 0), ('s', 1), ('m', 0), ('s', 2), ('m', 1), ('m', 2), ('s', 3)];
        let mut received = Vec::new();

        block_on(async {
            for &(source, seq) in &sent {
                let sender = if source == 's' { sensor } else { monitor };
                if mailbox.is_full() {
                    received.push(receiver.recv().await);
                }
                sender.post((source, seq)).await;
            }
            while let Ok(message) = receiver.try_receive() {
                received.push(message);
            }
        });

        assert_eq!(received, sent);
    }

    #[test]
    fn test_bounded_wait_times_out_and_returns_message() {
        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        let sender = mailbox.sender(LOW);
        let receiver = mailbox.receiver(MID);

        let empty = block_on(receiver.receive(MaxWait::millis(10)));
        assert_eq!(empty, Err(MailboxError::Timeout));
        assert_eq!(mailbox.waiting_receivers(), 0);

        sender.try_send(7).unwrap();
        let full = block_on(sender.send(8, MaxWait::millis(10))).unwrap_err();
        assert_eq!(full.error, MailboxError::Timeout);
        assert_eq!(full.message, 8);
        assert_eq!(mailbox.waiting_senders(), 0);
        assert_eq!(block_on(receiver.receive(MaxWait::millis(10))), Ok(7));
    }

    #[test]
    fn test_immediate_wait_fails_fast() {
        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        let sender = mailbox.sender(LOW);
        let receiver = mailbox.receiver(MID);

        assert_eq!(block_on(receiver.receive(MaxWait::Immediate)), Err(MailboxError::Empty));
        assert!(block_on(sender.send(1, MaxWait::Immediate)).is_ok());
        let rejected = block_on(sender.send(2, MaxWait::Immediate)).unwrap_err();
        assert_eq!(rejected.error, MailboxError::Full);
    }

    #[test]
    fn test_send_from_isr_reports_woken_receiver() {
        let mailbox: Mailbox<u32, 3> = Mailbox::new();
        let receiver = mailbox.receiver(MID);

        // 无人等待时不请求切换
        assert_eq!(mailbox.send_from_isr(1).unwrap(), IsrOutcome::NONE);
        assert_eq!(mailbox.try_receive(), Ok(1));

        let mut recv = pin!(receiver.recv());
        assert!(poll_once(recv.as_mut()).is_pending());
        assert_eq!(mailbox.waiting_receivers(), 1);

        let outcome = mailbox.send_from_isr(5).unwrap();
        assert_eq!(outcome.woken(), Some(MID));
        assert!(outcome.should_yield(LOW));
        assert!(!outcome.should_yield(HIGH));

        assert_eq!(poll_once(recv.as_mut()), Poll::Ready(5));
        assert_eq!(mailbox.waiting_receivers(), 0);
    }

    #[test]
    fn test_receive_from_isr_reports_woken_sender() {
        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        let sender = mailbox.sender(HIGH);
        sender.try_send(1).unwrap();

        let mut send = pin!(sender.post(2));
        assert!(poll_once(send.as_mut()).is_pending());

        let (message, outcome) = mailbox.receive_from_isr().unwrap();
        assert_eq!(message, 1);
        assert_eq!(outcome.woken(), Some(HIGH));

        assert!(poll_once(send.as_mut()).is_ready());
        assert_eq!(mailbox.try_receive(), Ok(2));
        assert_eq!(mailbox.receive_from_isr().unwrap_err(), MailboxError::Empty);
    }

    #[derive(Default)]
    struct WakeCount(std::sync::atomic::AtomicUsize);

    impl std::task::Wake for WakeCount {
        fn wake(self: std::sync::Arc<Self>) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl WakeCount {
        fn get(&self) -> usize {
            self.0.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn counting_waker() -> (std::sync::Arc<WakeCount>, std::task::Waker) {
        let count = std::sync::Arc::new(WakeCount::default());
        (count.clone(), std::task::Waker::from(count))
    }

    #[test]
    fn test_one_receive_readies_exactly_one_sender() {
        use core::future::Future;

        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        mailbox.try_send(1).unwrap();

        let (low_wakes, low_waker) = counting_waker();
        let (high_wakes, high_waker) = counting_waker();
        let mut low_cx = Context::from_waker(&low_waker);
        let mut high_cx = Context::from_waker(&high_waker);

        let low = mailbox.sender(LOW);
        let high = mailbox.sender(HIGH);
        let mut low_send = pin!(low.post(10));
        let mut high_send = pin!(high.post(30));
        assert!(low_send.as_mut().poll(&mut low_cx).is_pending());
        assert!(high_send.as_mut().poll(&mut high_cx).is_pending());
        assert_eq!(mailbox.waiting_senders(), 2);

        assert_eq!(mailbox.try_receive(), Ok(1));
        assert_eq!(high_wakes.get() + low_wakes.get(), 1);
        assert_eq!(high_wakes.get(), 1);
        assert_eq!(mailbox.waiting_senders(), 1);

        assert!(high_send.as_mut().poll(&mut high_cx).is_ready());
        assert!(low_send.as_mut().poll(&mut low_cx).is_pending());

        let (message, outcome) = mailbox.receive_from_isr().unwrap();
        assert_eq!(message, 30);
        assert_eq!(outcome.woken(), Some(LOW));
        assert_eq!(low_wakes.get(), 1);
        assert!(low_send.as_mut().poll(&mut low_cx).is_ready());
        assert_eq!(mailbox.try_receive(), Ok(10));
    }

    #[test]
    fn test_dropped_wakeup_passes_to_next_sender() {
        use core::future::Future;

        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        mailbox.try_send(1).unwrap();

        let (later_wakes, later_waker) = counting_waker();
        let mut later_cx = Context::from_waker(&later_waker);
        let low = mailbox.sender(LOW);
        let high = mailbox.sender(HIGH);
        let mut later = pin!(low.post(2));

        {
            let mut first = pin!(high.post(3));
            assert!(poll_once(first.as_mut()).is_pending());
            assert!(later.as_mut().poll(&mut later_cx).is_pending());

            // 唤醒落到高优先级发送方, 它随后被取消
            assert_eq!(mailbox.try_receive(), Ok(1));
            assert_eq!(later_wakes.get(), 0);
        }

        assert_eq!(later_wakes.get(), 1);
        assert!(later.as_mut().poll(&mut later_cx).is_ready());
        assert_eq!(mailbox.try_receive(), Ok(2));
    }

    #[test]
    fn test_isr_send_never_blocks_when_full() {
        let mailbox: Mailbox<u32, 1> = Mailbox::new();
        assert_eq!(mailbox.send_from_isr(1).unwrap(), IsrOutcome::NONE);

        let rejected = mailbox.send_from_isr(2).unwrap_err();
        assert_eq!(rejected.error, MailboxError::Full);
        assert_eq!(rejected.message, 2);
        assert_eq!(mailbox.try_receive(), Ok(1));
    }
}
