//! I2C interface trait
//!
//! This module defines the blocking I2C bus interface the bridge transport is built on.

use crate::platform::Result;

/// Fastest clock the bridge accepts (fast mode)
pub const MAX_FREQUENCY: u32 = 400_000;

/// I2C bus settings
#[derive(Debug, Clone, Copy)]
pub struct I2cConfig {
    /// Bus frequency in Hz, at most [`MAX_FREQUENCY`]
    pub frequency: u32,
    pub timeout_us: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            frequency: 200_000,
            timeout_us: 1_000_000,
        }
    }
}

/// Blocking I2C master
///
/// Each call is one complete bus transaction with a 7-bit address. The bus
/// is owned by a single bridge bus; failures are reported, never retried.
pub trait I2cInterface {
    /// `START, addr+W, data, STOP`
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// `START, addr+R, buffer, STOP`
    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()>;

    /// Write then read with a repeated start
    ///
    /// Used to select a register offset and read it back in one transaction.
    fn write_read(&mut self, addr: u8, write_data: &[u8], read_buffer: &mut [u8]) -> Result<()>;

    /// Change the bus clock
    ///
    /// # Errors
    ///
    /// `PlatformError::InvalidConfig` for zero or anything above
    /// [`MAX_FREQUENCY`].
    fn set_frequency(&mut self, frequency: u32) -> Result<()>;
}
