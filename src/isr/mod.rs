//! 中断处理
//!
//! 两个短小、不阻塞的处理函数, 由固件绑定到硬件中断向量:
//! - `gpio`: 按键边沿 → 二值事件信号
//! - `uart`: 发送寄存器空 → 推送下一个字节
//!
//! 处理函数不记录日志, 也不直接访问调度器.

pub mod gpio;
pub mod uart;

pub use gpio::on_button_edge;
pub use uart::{on_uart_interrupt, start_transmission, TxCursor, TxState, TxStep};
