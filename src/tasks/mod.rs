//! 任务模块
//!
//! 管线的三个核心任务与后台自检负载:
//! - `monitor`: 健康监控生产者 (最高优先级)
//! - `display`: 显示消费者
//! - `sensor`: 温度传感器生产者
//! - `workloads`: 被健康监控轮询的后台负载 (空闲优先级)
//!
//! 每个任务都是普通的 `async fn ... -> !`, 由固件包装成执行器任务;
//! 单个周期拆成 `cycle` / `render`, 便于在主机上测试.

pub mod display;
pub mod monitor;
pub mod sensor;
pub mod workloads;

use crate::sched::TaskSpec;

/// 核心任务表, 按优先级从高到低
pub const CORE_TASKS: [TaskSpec; 3] = [monitor::SPEC, display::SPEC, sensor::SPEC];
