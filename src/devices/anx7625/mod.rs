//! ANX7625 MIPI-DSI to DisplayPort bridge driver
//!
//! The bridge is controlled over I2C through several slave addresses and
//! three control lines (power enable, reset, USB OTG/VBUS).
//!
//! ## Layers
//!
//! - [`bus`]: register access with the slave-switch workaround, plus the lines
//! - [`sequence`]: register step lists (power, DP start, DSI video setup)
//! - [`controller`]: begin/end/poll lifecycle and the frame window sink
//!
//! ## Example
//!
//! ```ignore
//! let bus = I2cBridgeBus::new(i2c, power, reset, otg, timer)?;
//! let mut bridge = BridgeController::new(bus, BridgeConfig::default())?;
//! bridge.begin(ModeId::Mode640x480At60, (640, 480))?;
//! let status = bridge.poll()?;
//! ```

pub mod aux;
pub mod bus;
pub mod config;
pub mod controller;
pub mod edid;
pub mod error;
pub mod pll;
pub mod registers;
pub mod sequence;
pub mod status;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bus::{BridgeBus, ControlLine, I2cBridgeBus};
pub use config::{BridgeConfig, PixelWindow};
pub use controller::{BridgeController, BridgeState, FirmwareVersion};
pub use edid::{Edid, EdidError};
pub use error::{BridgeError, BridgeResult, FailureReason};
pub use pll::PllConfig;
pub use status::{LinkErrors, LinkStatus, SystemStatus};
