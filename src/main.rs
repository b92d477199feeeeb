//! sensor-pipeline - ESP32-S3 固件入口
//!
//! 基于 Embassy 异步运行时, 任务优先级 N 对应 PriorityN 中断执行器:
//! - Priority3 中断执行器: 健康监控 (Check)
//! - Priority2 中断执行器: 显示消费者 (Print)
//! - Priority1 中断执行器: 温度传感器 (Temp)
//! - 线程模式执行器 (优先级 0): 后台自检负载
//!
//! 按键 GPIO 中断释放二值事件信号; 串口发送中断逐字节推送提示字符串.

#![no_std]
#![no_main]

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Timer};
use esp_hal::{
    clock::CpuClock,
    gpio::{Event, Input, InputConfig, Io, Pull},
    handler,
    interrupt::{software::SoftwareInterruptControl, Priority as IrqPriority},
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart, UartInterrupt},
    Blocking,
};
use esp_rtos::embassy::InterruptExecutor;
use static_cell::StaticCell;

use sensor_pipeline::config::{PipelineConfig, UART_BANNER, UART_BAUD_RATE};
use sensor_pipeline::context::{PrintReceiver, PrintSender};
use sensor_pipeline::hal::{EdgeInterrupt, HealthCheck, TextDisplay, UartTx};
use sensor_pipeline::isr::{on_button_edge, on_uart_interrupt, start_transmission};
use sensor_pipeline::sched::PriorityTracker;
use sensor_pipeline::tasks::display::{self, DisplayConsumer};
use sensor_pipeline::tasks::monitor::{self, Monitor};
use sensor_pipeline::tasks::sensor::{self, TempSensor};
use sensor_pipeline::tasks::workloads::{self, BlockingQueue, Heartbeat, PolledQueue, SemaphoreTest};
use sensor_pipeline::tasks::CORE_TASKS;
use sensor_pipeline::PipelineResources;

// ===== 条件编译日志 =====
#[allow(unused_imports)]
use sensor_pipeline::util::log::*;

#[cfg(feature = "log-defmt")]
use defmt_rtt as _;

// ===== Panic Handler =====
#[cfg(any(feature = "dev", feature = "log-println"))]
use esp_backtrace as _;

#[cfg(not(any(feature = "dev", feature = "log-println")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

// ===== 静态分配 =====
/// 高优先级执行器 - 健康监控
static HIGH_PRIO_EXECUTOR: StaticCell<InterruptExecutor<2>> = StaticCell::new();

/// 中优先级执行器 - 显示消费者
static MID_PRIO_EXECUTOR: StaticCell<InterruptExecutor<1>> = StaticCell::new();

/// 低优先级执行器 - 温度传感器
static LOW_PRIO_EXECUTOR: StaticCell<InterruptExecutor<3>> = StaticCell::new();

/// 邮箱、按键信号、串口发送游标
static RESOURCES: PipelineResources = PipelineResources::new();

/// 健康监控轮询的负载列表
static HEALTH_CHECKS: StaticCell<[&'static dyn HealthCheck; 4]> = StaticCell::new();

// ===== 后台自检负载 =====
static INT_MATH: Heartbeat = Heartbeat::new("IntMath");
static POLL_QUEUE: PolledQueue<8> = PolledQueue::new("PollQ");
static BLOCK_QUEUE: BlockingQueue<4> = BlockingQueue::new("BlockQ");
static SEM_TEST: SemaphoreTest = SemaphoreTest::new("SemTest");

// ===== 中断与任务共享的外设 =====
static BUTTON_LINE: Mutex<CriticalSectionRawMutex, RefCell<Option<ButtonLine>>> =
    Mutex::new(RefCell::new(None));

static SERIAL_TX: Mutex<CriticalSectionRawMutex, RefCell<Option<SerialTx>>> =
    Mutex::new(RefCell::new(None));

/// 正在运行的任务优先级, 中断返回前据此决定是否请求切换
static PREEMPTION: PriorityTracker = PriorityTracker::new();

// ===== 设备适配 =====

/// 按键输入 (下降沿)
struct ButtonLine(Input<'static>);

impl EdgeInterrupt for ButtonLine {
    fn clear_edge(&mut self) {
        self.0.clear_interrupt();
    }
}

/// UART1 发送端, 以 TxDone 作为 "可发送" 中断
struct SerialTx(Uart<'static, Blocking>);

impl UartTx for SerialTx {
    fn acknowledge(&mut self) -> bool {
        let pending = self.0.interrupts();
        self.0.clear_interrupts(pending);
        pending.contains(UartInterrupt::TxDone)
    }

    fn is_tx_full(&self) -> bool {
        // TxDone 只在 FIFO 排空后触发, 拒收由 write_byte 报告
        false
    }

    fn write_byte(&mut self, byte: u8) -> bool {
        matches!(self.0.write(&[byte]), Ok(1))
    }

    fn enable_tx_interrupt(&mut self) {
        self.0.listen(UartInterrupt::TxDone);
    }

    fn disable_tx_interrupt(&mut self) {
        self.0.unlisten(UartInterrupt::TxDone);
    }
}

/// 没有接字符屏时, 显示内容输出到日志
struct ConsoleDisplay;

impl TextDisplay for ConsoleDisplay {
    fn clear(&mut self) {}

    fn draw_string(&mut self, text: &str, column: u8, row: u8) {
        log_info!("[{}:{}] {}", row, column, text);
    }
}

// ===== 中断处理函数 =====

#[handler]
fn on_gpio() {
    let outcome = BUTTON_LINE.lock(|cell| {
        let mut line = cell.borrow_mut();
        match line.as_mut() {
            Some(button) if button.0.is_interrupt_set() => {
                Some(on_button_edge(button, RESOURCES.context().button))
            }
            _ => None,
        }
    });
    if let Some(outcome) = outcome {
        outcome.finish(&PREEMPTION);
    }
}

#[handler]
fn on_uart() {
    SERIAL_TX.lock(|cell| {
        if let Some(serial) = cell.borrow_mut().as_mut() {
            let _ = on_uart_interrupt(serial, RESOURCES.context().tx);
        }
    });
}

// ===== 任务包装 =====

#[embassy_executor::task]
async fn monitor_task(sender: PrintSender<'static>, monitor: Monitor<'static>, period: Duration) {
    PREEMPTION
        .tracked(monitor::SPEC.priority, monitor::run(sender, monitor, period))
        .await
}

#[embassy_executor::task]
async fn display_task(receiver: PrintReceiver<'static>, consumer: DisplayConsumer<ConsoleDisplay>) {
    PREEMPTION
        .tracked(display::SPEC.priority, display::run(receiver, consumer))
        .await
}

#[embassy_executor::task]
async fn sensor_task(sender: PrintSender<'static>, sensor: TempSensor, period: Duration) {
    PREEMPTION
        .tracked(sensor::SPEC.priority, sensor::run(sender, sensor, period))
        .await
}

#[embassy_executor::task]
async fn int_math_task() {
    workloads::integer_math(&INT_MATH).await
}

#[embassy_executor::task]
async fn poll_producer_task() {
    POLL_QUEUE.producer().await
}

#[embassy_executor::task]
async fn poll_consumer_task() {
    POLL_QUEUE.consumer().await
}

#[embassy_executor::task]
async fn block_producer_task() {
    BLOCK_QUEUE.producer().await
}

#[embassy_executor::task]
async fn block_consumer_task() {
    BLOCK_QUEUE.consumer().await
}

#[embassy_executor::task]
async fn sem_server_task() {
    SEM_TEST.server().await
}

#[embassy_executor::task]
async fn sem_initiator_task() {
    SEM_TEST.initiator().await
}

// ===== 主入口点 =====
#[esp_rtos::main]
async fn main(low_prio_spawner: Spawner) {
    // ========================================
    // 1. 硬件初始化
    // ========================================
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);

    log_info!("{} v{} starting on ESP32-S3", sensor_pipeline::NAME, sensor_pipeline::VERSION);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0);

    let pipeline = PipelineConfig::default();
    let ctx = RESOURCES.context();

    // ========================================
    // 2. 按键 GPIO 中断 (BOOT 键, 下降沿)
    // ========================================
    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(on_gpio);

    let button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));
    BUTTON_LINE.lock(|cell| {
        let mut line = ButtonLine(button);
        line.0.listen(Event::FallingEdge);
        cell.replace(Some(line));
    });

    // ========================================
    // 3. 串口: 19200 8-N-1, 中断驱动发送
    // ========================================
    let uart = match Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(UART_BAUD_RATE),
    ) {
        Ok(uart) => uart,
        Err(_) => {
            log_error!("UART1 configuration rejected");
            panic!("uart init");
        }
    };
    let mut uart = uart.with_tx(peripherals.GPIO17);
    uart.set_interrupt_handler(on_uart);

    // 先放入共享槽再启动发送, 首个中断才能找到外设
    let armed = SERIAL_TX.lock(|cell| {
        let mut serial = SerialTx(uart);
        let armed = start_transmission(&mut serial, ctx.tx, UART_BANNER);
        cell.replace(Some(serial));
        armed
    });
    log_debug!("UART banner armed: {}", armed);

    // ========================================
    // 4. 健康检查对象
    // ========================================
    let checks: &'static [&'static dyn HealthCheck] =
        HEALTH_CHECKS.init([
            &INT_MATH,
            POLL_QUEUE.heartbeat(),
            BLOCK_QUEUE.heartbeat(),
            SEM_TEST.heartbeat(),
        ]);

    for spec in CORE_TASKS.iter() {
        log_info!(
            "task {}: priority {}, stack {} bytes",
            spec.name,
            spec.priority.level(),
            spec.stack_bytes
        );
    }

    // ========================================
    // 5. 高优先级执行器 (Priority3): 健康监控
    // ========================================
    let high_prio_executor = HIGH_PRIO_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt2));
    let high_prio_spawner = high_prio_executor.start(IrqPriority::Priority3);

    high_prio_spawner.must_spawn(monitor_task(
        ctx.sender(monitor::SPEC.priority),
        Monitor::new(checks),
        pipeline.monitor_period,
    ));

    // ========================================
    // 6. 中优先级执行器 (Priority2): 显示消费者
    // ========================================
    let mid_prio_executor = MID_PRIO_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt1));
    let mid_prio_spawner = mid_prio_executor.start(IrqPriority::Priority2);

    mid_prio_spawner.must_spawn(display_task(
        ctx.receiver(display::SPEC.priority),
        DisplayConsumer::new(ConsoleDisplay),
    ));

    // ========================================
    // 7. 低优先级执行器 (Priority1): 温度传感器
    // ========================================
    let low_prio_executor = LOW_PRIO_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt3));
    let sensor_spawner = low_prio_executor.start(IrqPriority::Priority1);

    sensor_spawner.must_spawn(sensor_task(
        ctx.sender(sensor::SPEC.priority),
        TempSensor::new(pipeline.sensor_seed),
        pipeline.sensor_period,
    ));

    // ========================================
    // 8. 线程模式 (优先级 0): 后台负载
    // ========================================
    low_prio_spawner.must_spawn(int_math_task());
    low_prio_spawner.must_spawn(poll_producer_task());
    low_prio_spawner.must_spawn(poll_consumer_task());
    low_prio_spawner.must_spawn(block_producer_task());
    low_prio_spawner.must_spawn(block_consumer_task());
    low_prio_spawner.must_spawn(sem_server_task());
    low_prio_spawner.must_spawn(sem_initiator_task());

    log_info!("All tasks spawned");

    // ========================================
    // 9. 主循环 - 系统状态
    // ========================================
    loop {
        Timer::after(Duration::from_secs(10)).await;
        log_debug!(
            "mailbox {}/{}, switch requests {}, button given {}",
            ctx.mailbox.len(),
            ctx.mailbox.capacity(),
            PREEMPTION.switch_requests(),
            ctx.button.is_given()
        );
    }
}
