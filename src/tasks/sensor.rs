//! 温度传感器生产者
//!
//! 每 100ms (10 Hz) 合成一个读数, 格式化为定长文本行,
//! 以无限等待发送到邮箱. 邮箱满时的背压表现为调度延迟, 读数从不丢弃.

use embassy_time::Duration;

use crate::config::{MAX_TEMP, MIN_STACK_SIZE, SENSOR_PRIORITY};
use crate::context::PrintSender;
use crate::message::Message;
use crate::sched::{PeriodicSchedule, TaskSpec};
use crate::util::log::*;

pub const SPEC: TaskSpec = TaskSpec::new("Temp", MIN_STACK_SIZE, SENSOR_PRIORITY);

/// 模拟温度传感器 (LCG 伪随机)
pub struct TempSensor {
    seed: u32,
}

impl TempSensor {
    pub const fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// 读取一次, 范围 [0, MAX_TEMP)
    #[inline]
    pub fn sample(&mut self) -> u8 {
        self.seed = self.seed.wrapping_mul(1103515245).wrapping_add(12345);
        (((self.seed >> 16) & 0x7FFF) % u32::from(MAX_TEMP)) as u8
    }
}

/// 一个采样周期: 采样 → 格式化 → 发送
pub async fn cycle(sensor: &mut TempSensor, sender: &PrintSender<'_>) -> u8 {
    let celsius = sensor.sample();
    sender.post(Message::reading(celsius)).await;
    celsius
}

/// 传感器任务主循环
pub async fn run(sender: PrintSender<'_>, mut sensor: TempSensor, period: Duration) -> ! {
    log_info!(
        "{} task started (priority {}, period {}ms)",
        SPEC.name,
        sender.priority().level(),
        period.as_millis()
    );

    let mut schedule = PeriodicSchedule::start_now(period);
    loop {
        cycle(&mut sensor, &sender).await;
        schedule.next().await;
    }
}
