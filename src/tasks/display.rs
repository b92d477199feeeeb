//! 显示消费者
//!
//! 唯一接触显示屏的任务: 阻塞接收邮箱消息, 每条消息清屏后在
//! 确定性推进的位置绘制. 互斥由 "只有一个消费者" 保证, 不需要设备锁.

use crate::config::{DISPLAY_PRIORITY, DISPLAY_ROWS, LINE_WINDOW, MIN_STACK_SIZE};
use crate::context::PrintReceiver;
use crate::hal::TextDisplay;
use crate::message::Message;
use crate::sched::TaskSpec;
use crate::util::log::*;

pub const SPEC: TaskSpec = TaskSpec::new("Print", MIN_STACK_SIZE, DISPLAY_PRIORITY);

/// 绘制位置: 行在两行之间交替, 列按窗口取模
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineCursor {
    line: u8,
    row: u8,
}

impl LineCursor {
    pub const fn new() -> Self {
        Self { line: 0, row: 0 }
    }

    /// 推进并返回 (列, 行)
    pub fn advance(&mut self) -> (u8, u8) {
        self.line = self.line.wrapping_add(1);
        self.row = self.row.wrapping_add(1);
        (self.line % LINE_WINDOW, self.row % DISPLAY_ROWS)
    }
}

/// 显示消费者
pub struct DisplayConsumer<D> {
    display: D,
    cursor: LineCursor,
}

impl<D: TextDisplay> DisplayConsumer<D> {
    pub const fn new(display: D) -> Self {
        Self {
            display,
            cursor: LineCursor::new(),
        }
    }

    /// 渲染一条消息, 返回绘制位置
    pub fn render(&mut self, message: &Message) -> (u8, u8) {
        let (column, row) = self.cursor.advance();
        self.display.clear();
        self.display.draw_string(message.as_str(), column, row);
        (column, row)
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

/// 显示任务主循环
pub async fn run<D: TextDisplay>(receiver: PrintReceiver<'_>, mut consumer: DisplayConsumer<D>) -> ! {
    log_info!("{} task started (priority {})", SPEC.name, receiver.priority().level());

    loop {
        let message = receiver.recv().await;
        let (_column, _row) = consumer.render(&message);
        log_trace!("display ({}, {}): {}", _column, _row, message.as_str());
    }
}
