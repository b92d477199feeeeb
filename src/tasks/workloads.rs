//! 后台自检负载
//!
//! 健康监控轮询的对象. 每个负载带一个 [`Heartbeat`]:
//! 正常运行时推进周期计数, 检测到错误时置位错误标志.
//! 四种负载分别覆盖整数运算、轮询队列、阻塞队列和二值信号往返.

use core::hint::black_box;

use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};

use crate::config::WORKLOAD_PRIORITY;
use crate::hal::HealthCheck;
use crate::sched::MaxWait;
use crate::sync::{AtomicCounter, AtomicFlag, BinaryEventSignal, CriticalChannel, RingBuffer};
use crate::util::log::*;

// ===== 心跳 =====

/// 负载存活心跳
///
/// `still_running` 为真当且仅当没有错误, 且计数自上次查询以来推进过.
pub struct Heartbeat {
    name: &'static str,
    cycles: AtomicCounter,
    seen: AtomicCounter,
    error: AtomicFlag,
}

impl Heartbeat {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cycles: AtomicCounter::new(),
            seen: AtomicCounter::new(),
            error: AtomicFlag::new(),
        }
    }

    /// 完成一个正常周期
    #[inline]
    pub fn beat(&self) {
        self.cycles.increment();
    }

    /// 记录错误 (不可清除)
    pub fn fault(&self) {
        if !self.error.is_set() {
            log_error!("{}: self-check failed", self.name);
        }
        self.error.set();
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_set()
    }
}

impl HealthCheck for Heartbeat {
    fn name(&self) -> &'static str {
        self.name
    }

    fn still_running(&self) -> bool {
        let now = self.cycles.get();
        let previous = self.seen.swap(now);
        !self.error.is_set() && now != previous
    }
}

// ===== 整数运算 =====

/// ((123 + 234567) * -3) / 7
const MATH_EXPECTED: i32 = -100_581;

/// 计算一次固定表达式, 结果正确返回 true
#[inline(never)]
pub fn integer_math_step() -> bool {
    let mut value: i32 = black_box(123_i32);
    value += black_box(234_567_i32);
    value *= black_box(-3_i32);
    value /= black_box(7_i32);
    value == MATH_EXPECTED
}

/// 整数运算负载: 反复计算并比对, 每轮让出执行器
pub async fn integer_math(heartbeat: &Heartbeat) -> ! {
    log_info!("{} workload started", heartbeat.name);

    loop {
        if integer_math_step() {
            heartbeat.beat();
        } else {
            heartbeat.fault();
        }
        yield_now().await;
    }
}

// ===== 轮询队列 =====

/// 轮询队列生产周期 (ms)
pub const POLL_PRODUCER_PERIOD_MS: u64 = 200;

/// 轮询队列消费周期 (ms), 比生产略快
pub const POLL_CONSUMER_PERIOD_MS: u64 = 180;

/// 轮询队列负载: 两端都不阻塞, 靠延时轮询交换递增序列
pub struct PolledQueue<const N: usize> {
    ring: RingBuffer<u16, N>,
    heartbeat: Heartbeat,
}

impl<const N: usize> PolledQueue<N> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            ring: RingBuffer::new(),
            heartbeat: Heartbeat::new(name),
        }
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// 写入一个序列号; 队列已满说明消费端停滞, 记为错误
    pub fn produce(&self, value: u16) -> bool {
        let pushed = self.ring.try_push(value);
        if !pushed {
            self.heartbeat.fault();
        }
        pushed
    }

    /// 取空队列并检查序列, 返回本次取到的个数
    pub fn consume(&self, expected: &mut u16) -> usize {
        let mut received = 0;
        while let Some(value) = self.ring.try_pop() {
            if value == *expected {
                self.heartbeat.beat();
            } else {
                self.heartbeat.fault();
            }
            *expected = value.wrapping_add(1);
            received += 1;
        }
        received
    }

    pub async fn producer(&self) -> ! {
        log_info!("{} producer started", self.heartbeat.name);

        let mut value: u16 = 0;
        loop {
            if self.produce(value) {
                value = value.wrapping_add(1);
            }
            Timer::after(Duration::from_millis(POLL_PRODUCER_PERIOD_MS)).await;
        }
    }

    pub async fn consumer(&self) -> ! {
        log_info!("{} consumer started", self.heartbeat.name);

        let mut expected: u16 = 0;
        loop {
            self.consume(&mut expected);
            Timer::after(Duration::from_millis(POLL_CONSUMER_PERIOD_MS)).await;
        }
    }
}

// ===== 阻塞队列 =====

/// 阻塞队列负载: 收发两端都在通道上无限等待
pub struct BlockingQueue<const N: usize> {
    channel: CriticalChannel<u16, N>,
    heartbeat: Heartbeat,
}

impl<const N: usize> BlockingQueue<N> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            channel: CriticalChannel::new(),
            heartbeat: Heartbeat::new(name),
        }
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// 发送下一个序列号
    pub async fn produce(&self, next: &mut u16) {
        self.channel.send(*next).await;
        *next = next.wrapping_add(1);
    }

    /// 接收一个序列号并检查
    pub async fn consume(&self, expected: &mut u16) -> u16 {
        let value = self.channel.receive().await;
        if value == *expected {
            self.heartbeat.beat();
        } else {
            self.heartbeat.fault();
        }
        *expected = value.wrapping_add(1);
        value
    }

    pub async fn producer(&self) -> ! {
        log_info!("{} producer started", self.heartbeat.name);

        let mut next: u16 = 0;
        loop {
            self.produce(&mut next).await;
        }
    }

    pub async fn consumer(&self) -> ! {
        log_info!("{} consumer started", self.heartbeat.name);

        let mut expected: u16 = 0;
        loop {
            self.consume(&mut expected).await;
        }
    }
}

// ===== 信号往返 =====

/// 发起方等待回应的上限 (ms)
pub const SEMAPHORE_BLOCK_MS: u64 = 100;

/// 两次往返之间的间隔 (ms)
pub const SEMAPHORE_PERIOD_MS: u64 = 50;

/// 信号往返负载: 发起方释放 `ping`, 服务方取得后释放 `pong`
///
/// 回应超时说明服务方停滞或信号丢失, 记为错误.
pub struct SemaphoreTest {
    ping: BinaryEventSignal,
    pong: BinaryEventSignal,
    heartbeat: Heartbeat,
}

impl SemaphoreTest {
    pub const fn new(name: &'static str) -> Self {
        Self {
            ping: BinaryEventSignal::new(),
            pong: BinaryEventSignal::new(),
            heartbeat: Heartbeat::new(name),
        }
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// 一次往返, 按时收到回应返回 true
    pub async fn volley(&self) -> bool {
        self.ping.give();
        let answered = self
            .pong
            .waiter(WORKLOAD_PRIORITY)
            .take(MaxWait::millis(SEMAPHORE_BLOCK_MS))
            .await;
        match answered {
            Ok(()) => {
                self.heartbeat.beat();
                true
            }
            Err(_) => {
                self.heartbeat.fault();
                false
            }
        }
    }

    /// 服务方: 每取得一次 `ping` 回应一次 `pong`
    pub async fn server(&self) -> ! {
        log_info!("{} server started", self.heartbeat.name);

        let ping = self.ping.waiter(WORKLOAD_PRIORITY);
        loop {
            if ping.take(MaxWait::Forever).await.is_ok() {
                self.pong.give();
            }
        }
    }

    pub async fn initiator(&self) -> ! {
        log_info!("{} initiator started", self.heartbeat.name);

        loop {
            self.volley().await;
            Timer::after(Duration::from_millis(SEMAPHORE_PERIOD_MS)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_heartbeat_needs_progress_between_queries() {
        let heartbeat = Heartbeat::new("hb");

        assert!(!heartbeat.still_running());
        heartbeat.beat();
        assert!(heartbeat.still_running());
        // 两次查询之间没有推进
        assert!(!heartbeat.still_running());
        heartbeat.beat();
        heartbeat.beat();
        assert!(heartbeat.still_running());
    }

    #[test]
    fn test_heartbeat_error_overrides_progress() {
        let heartbeat = Heartbeat::new("hb");
        heartbeat.fault();
        heartbeat.beat();

        assert!(heartbeat.has_error());
        assert!(!heartbeat.still_running());
    }

    #[test]
    fn test_integer_math_matches_expected() {
        assert!(integer_math_step());
    }

    #[test]
    fn test_polled_queue_in_sequence() {
        let queue: PolledQueue<4> = PolledQueue::new("poll");
        let mut expected = 0;

        for value in 0..3 {
            assert!(queue.produce(value));
        }
        assert_eq!(queue.consume(&mut expected), 3);
        assert_eq!(expected, 3);
        assert_eq!(queue.heartbeat().cycles(), 3);
        assert!(queue.heartbeat().still_running());
    }

    #[test]
    fn test_polled_queue_detects_gap_and_overflow() {
        let queue: PolledQueue<2> = PolledQueue::new("poll");
        let mut expected = 0;

        queue.produce(0);
        queue.produce(2);
        queue.consume(&mut expected);
        assert!(queue.heartbeat().has_error());

        let stalled: PolledQueue<2> = PolledQueue::new("stalled");
        assert!(stalled.produce(0));
        assert!(stalled.produce(1));
        assert!(!stalled.produce(2));
        assert!(stalled.heartbeat().has_error());
    }

    #[test]
    fn test_blocking_queue_round() {
        let queue: BlockingQueue<2> = BlockingQueue::new("block");
        let mut next = 0;
        let mut expected = 0;

        block_on(async {
            for _ in 0..5 {
                queue.produce(&mut next).await;
                queue.consume(&mut expected).await;
            }
        });

        assert_eq!(queue.heartbeat().cycles(), 5);
        assert!(!queue.heartbeat().has_error());
    }

    #[test]
    fn test_semaphore_volleys_with_server() {
        use embassy_futures::select::select;

        let test = SemaphoreTest::new("sem");

        block_on(select(test.server(), async {
            for _ in 0..3 {
                assert!(test.volley().await);
            }
        }));

        assert_eq!(test.heartbeat().cycles(), 3);
        assert!(test.heartbeat().still_running());
    }

    #[test]
    fn test_semaphore_without_server_faults() {
        let test = SemaphoreTest::new("sem");

        assert!(!block_on(test.volley()));
        assert!(test.heartbeat().has_error());
        assert!(!test.heartbeat().still_running());
    }
}
