//! 邮箱消息
//!
//! 消息按值入队, 大小在编译期固定. 入队即转移所有权,
//! 生产者之后无法再修改已发送的内容.

use core::fmt::{self, Write};

use heapless::String;

use crate::config::MAX_TEMP_STRING_LENGTH;
use crate::health::HealthStatus;

/// 温度行文本, 最多 `MAX_TEMP_STRING_LENGTH - 1` 个可打印字符
pub type TempLine = String<{ MAX_TEMP_STRING_LENGTH - 1 }>;

/// 显示消费者接收的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 健康监控报告 ("PASS" / "FAIL")
    Status(HealthStatus),
    /// 温度读数行
    Reading(TempLine),
}

impl Message {
    /// 温度读数消息
    pub fn reading(celsius: u8) -> Self {
        Message::Reading(format_line(format_args!("Temp: {}", celsius)))
    }

    /// 显示文本
    pub fn as_str(&self) -> &str {
        match self {
            Message::Status(status) => status.as_str(),
            Message::Reading(line) => line.as_str(),
        }
    }
}

/// 按长度上限格式化, 超出部分截断 (与 snprintf 行为一致)
pub fn format_line(args: fmt::Arguments<'_>) -> TempLine {
    let mut line = TempLine::new();
    // Truncating 从不返回错误
    let _ = Truncating(&mut line).write_fmt(args);
    line
}

struct Truncating<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}
