//! Mock platform implementation for testing
//!
//! This module provides mock implementations of platform traits that can be used
//! for unit testing without requiring actual hardware. Every mock is a cheap
//! handle over shared state, so a test can keep a clone to inspect after moving
//! the original into the driver.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! # Example
//!
//! ```ignore
//! use anx_bridge::platform::mock::MockI2c;
//! use anx_bridge::platform::traits::I2cInterface;
//!
//! let mut i2c = MockI2c::default();
//! let observer = i2c.clone();
//! i2c.write(0x3F, &[0x10, 0xAA]).unwrap();
//! assert_eq!(observer.register(0x3F, 0x10), 0xAA);
//! ```

#![cfg(any(test, feature = "mock"))]

mod gpio;
mod i2c;
mod timer;

pub use gpio::{MockGpio, PinEvent};
pub use i2c::{I2cTransaction, MockI2c};
pub use timer::MockTimer;
