#![cfg_attr(not(test), no_std)]

//! anx_bridge - ANX7625 display bridge driver
//!
//! Drives an I2C-controlled ANX7625 MIPI-DSI to DisplayPort bridge: power and
//! reset sequencing, firmware handshake, video mode configuration, RGB565
//! frame streaming through the chip's pixel window, and a cooperative
//! presentation loop that polls link health.
//!
//! ```ignore
//! let bus = I2cBridgeBus::new(i2c, power, reset, otg, timer)?;
//! let mut handle = BridgeHandle::new(
//!     bus,
//!     HandleConfig::new(ModeId::Mode640x480At60),
//!     BufferSet::Double(&mut front, &mut back),
//! )?;
//! handle.begin()?;
//! PresentationLoop::default()
//!     .run(&mut handle, &mut EmbassyScheduler, &mut ())
//!     .await;
//! ```

#[cfg(all(feature = "mock", not(test)))]
extern crate std;

// Platform abstraction layer: transport and pin traits, mocks, HAL adapters
pub mod platform;

// Logging macros and the scheduler adapter
pub mod core;

// Bridge chip driver
pub mod devices;

// Mode table, frame buffers, handle and presentation loop
pub mod display;

pub use devices::anx7625::{BridgeConfig, BridgeController, BridgeError, BridgeResult, BridgeState};
pub use display::{BridgeHandle, BufferSet, HandleConfig, ModeId, PresentationLoop};
