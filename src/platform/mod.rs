//! Platform abstraction layer
//!
//! This module provides the bus and pin abstractions the bridge driver is written
//! against. Everything hardware specific is isolated here.

pub mod error;
pub mod traits;

// Adapters for embedded-hal 1.0 blocking drivers
#[cfg(feature = "hal")]
pub mod hal;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{GpioError, I2cError, PlatformError, Result, TimerError};
pub use traits::{GpioInterface, GpioMode, I2cConfig, I2cInterface, TimerInterface};
