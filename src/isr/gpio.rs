//! 按键 GPIO 中断
//!
//! 处理顺序固定: 先清除硬件中断条件 (否则观察不到后续边沿),
//! 再以中断安全方式释放按键事件信号. 返回值交给调度层决定
//! 中断返回时是否切换到被唤醒的更高优先级任务.
//!
//! 谁在等待该信号不属于本层; 这里只保证交接本身正确.

use crate::hal::EdgeInterrupt;
use crate::sched::IsrOutcome;
use crate::sync::BinaryEventSignal;

/// 按键中断处理
#[inline]
pub fn on_button_edge<P>(pin: &mut P, button: &BinaryEventSignal) -> IsrOutcome
where
    P: EdgeInterrupt + ?Sized,
{
    pin.clear_edge();
    button.give_from_isr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::fake::ButtonPin;
    use crate::sched::{MaxWait, Priority};
    use core::pin::pin;
    use embassy_futures::poll_once;

    #[test]
    fn test_clears_edge_then_releases_signal() {
        let mut pin = ButtonPin::default();
        let button = BinaryEventSignal::new();

        let outcome = on_button_edge(&mut pin, &button);

        assert_eq!(pin.cleared, 1);
        assert!(button.is_given());
        assert_eq!(outcome, IsrOutcome::NONE);
    }

    #[test]
    fn test_bounce_before_consumption_stays_single_pending() {
        let mut pin = ButtonPin::default();
        let button = BinaryEventSignal::new();

        for _ in 0..3 {
            let _ = on_button_edge(&mut pin, &button);
        }

        assert_eq!(pin.cleared, 3);
        assert!(button.try_take());
        assert!(!button.try_take());
    }

    #[test]
    fn test_reports_woken_handler_task() {
        let mut pin = ButtonPin::default();
        let button = BinaryEventSignal::new();
        let handler = button.waiter(Priority::new(4));

        let mut wait = pin!(handler.take(MaxWait::Forever));
        assert!(poll_once(wait.as_mut()).is_pending());

        let outcome = on_button_edge(&mut pin, &button);
        assert!(outcome.should_yield(Priority::new(3)));
        assert!(poll_once(wait.as_mut()).is_ready());
    }
}
