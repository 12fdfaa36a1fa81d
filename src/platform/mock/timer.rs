//! Mock Timer implementation for testing

use crate::platform::{Result, traits::TimerInterface};
use core::cell::Cell;
use std::rc::Rc;

/// Mock Timer implementation
///
/// Uses simulated time: delays advance a virtual clock instead of sleeping.
/// Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct MockTimer {
    now_us: Rc<Cell<u64>>,
}

impl MockTimer {
    /// Create a new mock timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the virtual clock without a delay call
    pub fn advance_ms(&self, ms: u64) {
        self.now_us.set(self.now_us.get().wrapping_add(ms * 1000));
    }
}

impl TimerInterface for MockTimer {
    fn delay_us(&mut self, us: u32) -> Result<()> {
        self.now_us.set(self.now_us.get().wrapping_add(us as u64));
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) -> Result<()> {
        self.delay_us(ms.saturating_mul(1000))
    }

    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_timer_delay_us() {
        let mut timer = MockTimer::new();
        assert_eq!(timer.now_us(), 0);

        timer.delay_us(1000).unwrap();
        assert_eq!(timer.now_us(), 1000);

        timer.delay_us(500).unwrap();
        assert_eq!(timer.now_us(), 1500);
    }

    #[test]
    fn test_mock_timer_delay_ms() {
        let mut timer = MockTimer::new();
        timer.delay_ms(1).unwrap();
        assert_eq!(timer.now_us(), 1000);

        timer.delay_ms(5).unwrap();
        assert_eq!(timer.now_ms(), 6);
    }

    #[test]
    fn test_mock_timer_shared_clock() {
        let mut timer = MockTimer::new();
        let observer = timer.clone();
        timer.delay_ms(200).unwrap();
        observer.advance_ms(10);
        assert_eq!(observer.now_ms(), 210);
        assert_eq!(timer.now_ms(), 210);
    }
}
