//! 条件编译日志系统
//!
//! 根据 feature 选择日志后端:
//! - `log-defmt`: defmt (二进制日志, 经 RTT 输出)
//! - `dev` / `log-println`: esp-println 文本日志
//! - 默认 (release / 主机测试): 整个调用被编译掉, 零开销
//!
//! 级别约定:
//! - `log_error!`: 后台负载自检失败
//! - `log_warn!`: 健康状态首次转为失败
//! - `log_info!`: 任务启动、固件启动流程
//! - `log_debug!`: 计时与周期性状态
//! - `log_trace!`: 每条显示消息
//!
//! 中断处理函数中不记录日志.

// ===================================================================
// 后端分发: 每个级别宏都展开为 `__log_backend!(级别, 标签, ...)`
// ===================================================================

#[doc(hidden)]
#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! __log_backend {
    (error, $tag:literal, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (warn, $tag:literal, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (info, $tag:literal, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $tag:literal, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (trace, $tag:literal, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[doc(hidden)]
#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! __log_backend {
    ($level:ident, $tag:literal, $($arg:tt)*) => {
        esp_println::println!(concat!("[", $tag, "] {}"), format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! __log_backend {
    ($level:ident, $tag:literal, $($arg:tt)*) => {};
}

// ===================================================================
// 级别宏
// ===================================================================

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__log_backend!(error, "ERROR", $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__log_backend!(warn, "WARN", $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__log_backend!(info, "INFO", $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__log_backend!(debug, "DEBUG", $($arg)*) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__log_backend!(trace, "TRACE", $($arg)*) };
}

pub use crate::{log_debug, log_error, log_info, log_trace, log_warn};

// ===================================================================
// 计时
// ===================================================================

/// 测量表达式耗时, 以 debug 级别输出
///
/// 没有日志后端时只求值, 不读时钟.
///
/// # Example
/// ```ignore
/// let status = timed!("health poll", monitor.evaluate());
/// // [DEBUG] [TIME] health poll: 12us
/// ```
#[cfg(any(feature = "dev", feature = "log-defmt", feature = "log-println"))]
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let started = embassy_time::Instant::now();
        let value = $body;
        $crate::log_debug!("[TIME] {}: {}us", $name, started.elapsed().as_micros());
        value
    }};
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {
        $body
    };
}

pub use crate::timed;
