//! 设备接缝
//!
//! 核心层只通过这些 trait 接触硬件; 寄存器编程、时钟与外设初始化
//! 由固件入口完成, 且在任何任务运行前完成.

/// 字符显示屏
///
/// 只允许显示消费者任务调用, 因此不需要额外的设备锁.
pub trait TextDisplay {
    /// 清屏
    fn clear(&mut self);

    /// 在 (列, 行) 处绘制字符串
    fn draw_string(&mut self, text: &str, column: u8, row: u8);
}

/// 串口发送端 (中断驱动, 不使用 FIFO 批量写入)
pub trait UartTx {
    /// 读取并清除挂起的中断状态, 返回其中是否包含 "可发送" 事件
    fn acknowledge(&mut self) -> bool;

    /// 发送寄存器是否已满
    fn is_tx_full(&self) -> bool;

    /// 写入发送寄存器, 硬件没有收下该字节时返回 false
    fn write_byte(&mut self, byte: u8) -> bool;

    /// 打开 "可发送" 中断源
    fn enable_tx_interrupt(&mut self);

    /// 关闭 "可发送" 中断源
    fn disable_tx_interrupt(&mut self);
}

/// 边沿触发的 GPIO 中断线
pub trait EdgeInterrupt {
    /// 清除中断条件; 清除前不会再观察到新的边沿
    fn clear_edge(&mut self);
}

/// 后台负载的存活查询
pub trait HealthCheck: Sync {
    /// 负载名称 (日志用)
    fn name(&self) -> &'static str;

    /// 自上次查询以来负载是否仍在正常运行
    fn still_running(&self) -> bool;
}
