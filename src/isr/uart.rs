//! 中断驱动的串口发送
//!
//! 每次 "可发送" 中断推送待发字符串的下一个字节, 不忙等.
//!
//! 状态机:
//! - `Idle`: 没有待发字符串 (初始状态)
//! - `Transmitting`: 游标位于 [0, len)
//! - `Done`: 游标等于 len, 中断源已关闭
//!
//! `Done` 必须先 `reset` 回 `Idle` 才能再次 `arm`. 游标只由中断推进,
//! 只由发起发送的一方复位; 游标永远不会越过结束符.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::hal::UartTx;

/// 发送游标状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Transmitting { text: &'static [u8], next: usize },
    Done { sent: usize },
}

/// 一次中断的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum TxStep {
    /// 不是发送中断
    Ignored,
    /// 写入了一个字节
    Wrote(u8),
    /// 发送寄存器满或拒收, 游标不动, 等下一次中断
    Stalled,
    /// 没有待发内容, 已关闭中断源
    Inactive,
}

/// 待发字符串游标
pub struct TxCursor {
    state: Mutex<CriticalSectionRawMutex, Cell<TxState>>,
}

impl TxCursor {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(TxState::Idle)),
        }
    }

    pub fn state(&self) -> TxState {
        self.state.lock(Cell::get)
    }

    /// 已推送到硬件的字节数
    pub fn position(&self) -> usize {
        match self.state() {
            TxState::Idle => 0,
            TxState::Transmitting { next, .. } => next,
            TxState::Done { sent } => sent,
        }
    }

    /// 装载待发字符串, 只能在 `Idle` 状态下进行
    ///
    /// 字符串在第一个 NUL 处结束. 空字符串直接进入 `Done`.
    pub fn arm(&self, text: &'static [u8]) -> bool {
        let text = until_terminator(text);
        self.state.lock(|cell| {
            if cell.get() != TxState::Idle {
                return false;
            }
            cell.set(if text.is_empty() {
                TxState::Done { sent: 0 }
            } else {
                TxState::Transmitting { text, next: 0 }
            });
            true
        })
    }

    /// `Done → Idle`, 其他状态下不变并返回 false
    pub fn reset(&self) -> bool {
        self.state.lock(|cell| match cell.get() {
            TxState::Done { .. } => {
                cell.set(TxState::Idle);
                true
            }
            _ => false,
        })
    }

    /// 推送下一个字节
    ///
    /// 写完最后一个字节时进入 `Done` 并关闭中断源, 防止中断风暴.
    pub fn step<U: UartTx + ?Sized>(&self, uart: &mut U) -> TxStep {
        self.state.lock(|cell| match cell.get() {
            TxState::Transmitting { text, next } => {
                let Some(&byte) = text.get(next) else {
                    cell.set(TxState::Done { sent: next });
                    uart.disable_tx_interrupt();
                    return TxStep::Inactive;
                };
                if uart.is_tx_full() || !uart.write_byte(byte) {
                    return TxStep::Stalled;
                }
                let next = next + 1;
                if next == text.len() {
                    cell.set(TxState::Done { sent: next });
                    uart.disable_tx_interrupt();
                } else {
                    cell.set(TxState::Transmitting { text, next });
                }
                TxStep::Wrote(byte)
            }
            TxState::Idle | TxState::Done { .. } => {
                uart.disable_tx_interrupt();
                TxStep::Inactive
            }
        })
    }
}

impl Default for TxCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// 串口中断处理: 先确认中断, 是发送中断才推进游标
#[inline]
pub fn on_uart_interrupt<U>(uart: &mut U, cursor: &TxCursor) -> TxStep
where
    U: UartTx + ?Sized,
{
    if !uart.acknowledge() {
        return TxStep::Ignored;
    }
    cursor.step(uart)
}

/// 发起一次发送: 装载字符串, 打开中断源并推送首字节
///
/// 游标不在 `Idle` 时返回 false, 不影响正在进行的发送.
pub fn start_transmission<U>(uart: &mut U, cursor: &TxCursor, text: &'static [u8]) -> bool
where
    U: UartTx + ?Sized,
{
    if !cursor.arm(text) {
        return false;
    }
    uart.enable_tx_interrupt();
    // 发送中断只在寄存器变空时触发, 首字节需要主动推送
    let _ = cursor.step(uart);
    true
}

fn until_terminator(text: &[u8]) -> &[u8] {
    match text.iter().position(|&b| b == 0) {
        Some(end) => &text[..end],
        None => text,
    }
}
