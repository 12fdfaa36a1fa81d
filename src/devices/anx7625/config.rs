//! Bridge configuration

use super::bus::MAX_WRITE_LEN;
use super::error::{BridgeError, BridgeResult};
use super::registers;

/// Register window the frame is streamed through
///
/// A push sets the 24-bit byte offset (little-endian, three consecutive
/// registers from `offset_reg`), streams bytes into `data_reg` and writes
/// `commit` to `ctrl_reg` after the last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelWindow {
    pub addr: u8,
    pub offset_reg: u8,
    pub data_reg: u8,
    pub ctrl_reg: u8,
    pub commit: u8,
}

impl Default for PixelWindow {
    fn default() -> Self {
        Self {
            addr: registers::RX_P2_ADDR,
            offset_reg: registers::FRAME_WINDOW_OFFSET,
            data_reg: registers::FRAME_WINDOW_DATA,
            ctrl_reg: registers::FRAME_WINDOW_CTRL,
            commit: registers::FRAME_WINDOW_COMMIT,
        }
    }
}

/// Bridge controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// Firmware handshake attempts
    pub handshake_attempts: u8,
    /// Link training attempts
    pub training_attempts: u8,
    /// Backoff before retrying training, multiplied by the attempt number
    pub training_backoff_ms: u32,
    /// Wait for hot-plug detect
    pub hpd_timeout_ms: u32,
    pub hpd_poll_interval_ms: u32,
    /// Settle time between power enable and reset release
    pub power_settle_ms: u32,
    /// Wait for VBUS to discharge after turning it off
    pub vbus_discharge_ms: u32,
    /// Wait after a successful handshake
    pub stabilization_ms: u32,
    /// Wait for a VBUS-powered device after turning VBUS on
    pub provider_settle_ms: u32,
    /// Consecutive failed polls before giving up on the bus
    pub max_consecutive_errors: u32,
    pub window: PixelWindow,
    /// Bytes per window data write
    pub chunk_size: usize,
    /// Chunks pushed per poll, `None` for the whole frame
    pub chunk_budget: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            handshake_attempts: 3,
            training_attempts: 3,
            training_backoff_ms: 50,
            hpd_timeout_ms: 5000,
            hpd_poll_interval_ms: 10,
            power_settle_ms: 10,
            vbus_discharge_ms: 1000,
            stabilization_ms: 200,
            provider_settle_ms: 1000,
            max_consecutive_errors: 3,
            window: PixelWindow::default(),
            chunk_size: 128,
            chunk_budget: None,
        }
    }
}

impl BridgeConfig {
    /// Reject configurations the controller cannot run with
    pub fn validate(&self) -> BridgeResult<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_WRITE_LEN {
            return Err(BridgeError::InvalidConfig("chunk size must be 1..=255"));
        }
        if self.chunk_budget == Some(0) {
            return Err(BridgeError::InvalidConfig("chunk budget must be non-zero"));
        }
        if self.handshake_attempts == 0 || self.training_attempts == 0 {
            return Err(BridgeError::InvalidConfig("attempt counts must be non-zero"));
        }
        if self.hpd_poll_interval_ms == 0 {
            return Err(BridgeError::InvalidConfig("HPD poll interval must be non-zero"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(BridgeError::InvalidConfig("error threshold must be non-zero"));
        }
        Ok(())
    }

    /// Number of HPD polls before timing out
    pub fn hpd_polls(&self) -> u32 {
        (self.hpd_timeout_ms / self.hpd_poll_interval_ms.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hpd_polls(), 500);
        assert_eq!(config.window.addr, registers::RX_P2_ADDR);
    }

    #[test]
    fn test_rejects_bad_chunk_size() {
        let mut config = BridgeConfig::default();
        config.chunk_size = 0;
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));
        config.chunk_size = 256;
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));
        config.chunk_size = 255;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = BridgeConfig {
            training_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
