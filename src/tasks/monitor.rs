//! 健康监控生产者
//!
//! 每 5 秒查询一组后台负载的存活状态, 聚合为一个布尔值
//! (全部存活才健康), 并发送固定的 "PASS" / "FAIL" 消息.
//! 一旦失败就永远报告失败.

use embassy_time::Duration;

use crate::config::{MIN_STACK_SIZE, MONITOR_PRIORITY};
use crate::context::PrintSender;
use crate::hal::HealthCheck;
use crate::health::{self, HealthLatch, HealthStatus};
use crate::message::Message;
use crate::sched::{PeriodicSchedule, TaskSpec};
use crate::util::log::*;

pub const SPEC: TaskSpec = TaskSpec::new("Check", MIN_STACK_SIZE, MONITOR_PRIORITY);

/// 健康监控状态
pub struct Monitor<'a> {
    checks: &'a [&'a dyn HealthCheck],
    latch: HealthLatch,
}

impl<'a> Monitor<'a> {
    pub const fn new(checks: &'a [&'a dyn HealthCheck]) -> Self {
        Self {
            checks,
            latch: HealthLatch::new(),
        }
    }

    pub fn latch(&self) -> HealthLatch {
        self.latch
    }

    /// 查询全部负载并更新锁存
    pub fn evaluate(&mut self) -> HealthStatus {
        let all_running = health::all_running(self.checks);
        if self.latch.observe(all_running) {
            log_warn!("Background workload stalled, reporting FAIL from now on");
        }
        self.latch.status()
    }
}

/// 一个监控周期: 评估 → 发送
pub async fn cycle(monitor: &mut Monitor<'_>, sender: &PrintSender<'_>) -> HealthStatus {
    let status = timed!("health poll", monitor.evaluate());
    sender.post(Message::Status(status)).await;
    status
}

/// 监控任务主循环
pub async fn run(sender: PrintSender<'_>, mut monitor: Monitor<'_>, period: Duration) -> ! {
    log_info!(
        "{} task started (priority {}, {} checks, period {}ms)",
        SPEC.name,
        sender.priority().level(),
        monitor.checks.len(),
        period.as_millis()
    );

    let mut schedule = PeriodicSchedule::start_now(period);
    loop {
        schedule.next().await;
        cycle(&mut monitor, &sender).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineResources;
    use embassy_futures::block_on;
    use portable_atomic::{AtomicBool, Ordering};

    struct Switch(AtomicBool);

    impl HealthCheck for Switch {
        fn name(&self) -> &'static str {
            "switch"
        }

        fn still_running(&self) -> bool {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn test_failure_is_sticky() {
        let math = Switch(AtomicBool::new(true));
        let queue = Switch(AtomicBool::new(true));
        let checks: [&dyn HealthCheck; 2] = [&math, &queue];
        let mut monitor = Monitor::new(&checks);

        assert_eq!(monitor.evaluate(), HealthStatus::Pass);

        queue.0.store(false, Ordering::Relaxed);
        assert_eq!(monitor.evaluate(), HealthStatus::Fail);

        // 所有子检查恢复健康后仍然报告失败
        queue.0.store(true, Ordering::Relaxed);
        for _ in 0..5 {
            assert_eq!(monitor.evaluate(), HealthStatus::Fail);
        }
        assert!(monitor.latch().is_failed());
    }

    #[test]
    fn test_cycle_sends_literal_status() {
        let resources = PipelineResources::new();
        let ctx = resources.context();
        let sender = ctx.sender(SPEC.priority);
        let ok = Switch(AtomicBool::new(true));
        let checks: [&dyn HealthCheck; 1] = [&ok];
        let mut monitor = Monitor::new(&checks);

        block_on(cycle(&mut monitor, &sender));
        ok.0.store(false, Ordering::Relaxed);
        block_on(cycle(&mut monitor, &sender));

        assert_eq!(ctx.mailbox.try_receive().unwrap().as_str(), "PASS");
        assert_eq!(ctx.mailbox.try_receive().unwrap().as_str(), "FAIL");
    }
}
