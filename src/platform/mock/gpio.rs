//! Mock GPIO implementation for testing

use crate::platform::{
    Result,
    error::{GpioError, PlatformError},
    traits::{GpioInterface, GpioMode},
};
use core::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

/// Recorded pin activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    /// Driven high
    High,
    /// Driven low
    Low,
    /// Mode changed
    Mode(GpioMode),
}

#[derive(Debug)]
struct MockGpioState {
    output: bool,
    input: bool,
    mode: GpioMode,
    history: Vec<PinEvent>,
    fail_drive: bool,
}

/// Mock GPIO implementation
///
/// Tracks pin state (high/low), mode and the sequence of drive events for
/// test verification. Clones share state.
#[derive(Debug, Clone)]
pub struct MockGpio {
    state: Rc<RefCell<MockGpioState>>,
}

impl MockGpio {
    fn with_mode(mode: GpioMode) -> Self {
        Self {
            state: Rc::new(RefCell::new(MockGpioState {
                output: false,
                // Undriven inputs float high, like a pulled-up line
                input: true,
                mode,
                history: Vec::new(),
                fail_drive: false,
            })),
        }
    }

    /// Create a new mock GPIO in output mode
    pub fn new_output() -> Self {
        Self::with_mode(GpioMode::OutputPushPull)
    }

    /// Create a new mock GPIO in input mode
    pub fn new_input() -> Self {
        Self::with_mode(GpioMode::Input)
    }

    /// Set the input state (for simulating an external driver on the line)
    pub fn set_input_state(&self, high: bool) {
        self.state.borrow_mut().input = high;
    }

    /// Last driven output level
    pub fn output_level(&self) -> bool {
        self.state.borrow().output
    }

    /// Drive and mode events in the order they happened
    pub fn history(&self) -> Vec<PinEvent> {
        self.state.borrow().history.clone()
    }

    /// Clear the event history
    pub fn clear_history(&self) {
        self.state.borrow_mut().history.clear();
    }

    /// Make every subsequent drive fail
    pub fn fail_drive(&self, fail: bool) {
        self.state.borrow_mut().fail_drive = fail;
    }

    fn drive(&mut self, high: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.mode.is_output() {
            return Err(PlatformError::Gpio(GpioError::InvalidMode));
        }
        if state.fail_drive {
            return Err(PlatformError::Gpio(GpioError::DriveFailed));
        }
        state.output = high;
        state
            .history
            .push(if high { PinEvent::High } else { PinEvent::Low });
        Ok(())
    }
}

impl GpioInterface for MockGpio {
    fn set_high(&mut self) -> Result<()> {
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<()> {
        self.drive(false)
    }

    fn read(&self) -> bool {
        let state = self.state.borrow();
        if state.mode.is_output() {
            state.output
        } else {
            state.input
        }
    }

    fn set_mode(&mut self, mode: GpioMode) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.mode = mode;
        state.history.push(PinEvent::Mode(mode));
        Ok(())
    }

    fn mode(&self) -> GpioMode {
        self.state.borrow().mode
    }
}
