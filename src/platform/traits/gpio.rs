//! GPIO interface trait
//!
//! This module defines the GPIO (General Purpose Input/Output) interface used for the
//! bridge control lines (power enable, reset, OTG enable).

use crate::platform::Result;

/// GPIO pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioMode {
    /// Input mode (high impedance)
    Input,
    /// Input mode with pull-up resistor
    InputPullUp,
    /// Input mode with pull-down resistor
    InputPullDown,
    /// Output mode (push-pull)
    OutputPushPull,
    /// Output mode (open-drain)
    OutputOpenDrain,
}

impl GpioMode {
    /// Whether the pin is actively driven in this mode
    pub const fn is_output(self) -> bool {
        matches!(self, GpioMode::OutputPushPull | GpioMode::OutputOpenDrain)
    }
}

/// One bridge control line
///
/// A line is owned by exactly one bridge bus. Driving it is only valid in
/// an output mode; sensing works in every mode.
pub trait GpioInterface {
    /// Drive the line high
    ///
    /// # Errors
    ///
    /// `GpioError::InvalidMode` when the line is an input.
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line low
    ///
    /// # Errors
    ///
    /// `GpioError::InvalidMode` when the line is an input.
    fn set_low(&mut self) -> Result<()>;

    /// Current level: the driven level for outputs, the sensed one for inputs
    fn read(&self) -> bool;

    /// Switch between driving and sensing
    fn set_mode(&mut self, mode: GpioMode) -> Result<()>;

    fn mode(&self) -> GpioMode;
}
