//! sensor-pipeline - 单核抢占式调度下的实时数据管线
//!
//! 本库提供以下核心功能:
//! - 有界邮箱 (多生产者 → 单消费者, 阻塞收发 + 最长等待)
//! - 绝对时间锚定的周期任务 (无累积漂移)
//! - 传感器 / 健康监控生产者, 显示消费者
//! - 中断到任务的两种交接: 二值事件信号, 中断驱动的串口逐字节发送
//! - 条件编译日志系统
//!
//! 硬件相关部分 (时钟、串口、GPIO、显示屏) 通过 [`hal`] 中的 trait 注入,
//! 因此整个库可以在主机上直接测试.

#![cfg_attr(not(test), no_std)]

pub mod context;
pub mod error;
pub mod hal;
pub mod health;
pub mod isr;
pub mod message;
pub mod sched;
pub mod sync;
pub mod tasks;
pub mod util;

// ===== 重导出常用类型 =====
pub use context::{PipelineContext, PipelineResources, PrintMailbox};
pub use error::{MailboxError, Rejected, SignalError};
pub use message::Message;
pub use sched::{IsrOutcome, MaxWait, PeriodicSchedule, Preemption, Priority, PriorityTracker, TaskSpec};
pub use sync::event::BinaryEventSignal;
pub use sync::mailbox::Mailbox;

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 系统配置常量
pub mod config {
    use embassy_time::Duration;

    use crate::sched::Priority;

    /// 邮箱容量 (消息条数)
    pub const MAILBOX_CAPACITY: usize = 3;

    /// 每个同步原语可同时登记的最多阻塞任务数
    pub const MAX_WAITERS: usize = 4;

    /// 健康检查周期 (ms)
    pub const MONITOR_PERIOD_MS: u64 = 5000;

    /// 温度采样周期 (ms), 10 Hz
    pub const SENSOR_PERIOD_MS: u64 = 100;

    /// 温度上限 (不含), 读数范围 [0, MAX_TEMP)
    pub const MAX_TEMP: u8 = 40;

    /// 温度字符串缓冲区长度 (含结束符)
    pub const MAX_TEMP_STRING_LENGTH: usize = 10;

    /// 显示屏列窗口, 行计数对其取模
    pub const LINE_WINDOW: u8 = 64;

    /// 显示屏行数
    pub const DISPLAY_ROWS: u8 = 2;

    /// 串口波特率 (8-N-1)
    pub const UART_BAUD_RATE: u32 = 19_200;

    /// 按键中断触发后通过串口发送的字符串
    pub const UART_BANNER: &[u8] = b"Task woken by button interrupt! --- ";

    /// 默认传感器伪随机种子
    pub const SENSOR_SEED: u32 = 12345;

    /// 最小任务栈预算 (字节)
    pub const MIN_STACK_SIZE: usize = 512;

    // ===== 任务优先级 (数值越大越优先) =====

    /// 健康监控任务
    pub const MONITOR_PRIORITY: Priority = Priority::IDLE.above(3);

    /// 显示消费者任务
    pub const DISPLAY_PRIORITY: Priority = Priority::IDLE.above(2);

    /// 温度传感器任务
    pub const SENSOR_PRIORITY: Priority = Priority::IDLE.above(1);

    /// 后台自检负载
    pub const WORKLOAD_PRIORITY: Priority = Priority::IDLE;

    /// 运行时可调的管线参数
    ///
    /// 默认值与上面的常量一致; 测试可以用更短的周期驱动任务.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PipelineConfig {
        /// 健康检查周期
        pub monitor_period: Duration,
        /// 温度采样周期
        pub sensor_period: Duration,
        /// 传感器伪随机种子
        pub sensor_seed: u32,
    }

    impl PipelineConfig {
        /// 创建默认配置
        pub const fn new() -> Self {
            Self {
                monitor_period: Duration::from_millis(MONITOR_PERIOD_MS),
                sensor_period: Duration::from_millis(SENSOR_PERIOD_MS),
                sensor_seed: SENSOR_SEED,
            }
        }

        /// 设置健康检查周期
        pub const fn with_monitor_period(mut self, period: Duration) -> Self {
            self.monitor_period = period;
            self
        }

        /// 设置采样周期
        pub const fn with_sensor_period(mut self, period: Duration) -> Self {
            self.sensor_period = period;
            self
        }

        /// 设置伪随机种子
        pub const fn with_sensor_seed(mut self, seed: u32) -> Self {
            self.sensor_seed = seed;
            self
        }
    }

    impl Default for PipelineConfig {
        fn default() -> Self {
            Self::new()
        }
    }
}
