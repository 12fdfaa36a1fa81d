//! Simulated ANX7625 on top of the mock platform
//!
//! Preloads the registers a healthy chip reports so tests can drive the
//! controller end to end, and keeps a handle on every peripheral.

use super::bus::I2cBridgeBus;
use super::registers::*;
use super::status::SystemStatus;
use crate::platform::mock::{MockGpio, MockI2c, MockTimer};
use crate::platform::Result;
use std::vec::Vec;

/// Bridge bus built from mock peripherals
pub type MockBus = I2cBridgeBus<MockI2c, MockGpio, MockGpio, MockGpio, MockTimer>;

/// Shared handles on a simulated chip
#[derive(Debug, Clone)]
pub struct MockBridge {
    pub i2c: MockI2c,
    pub power: MockGpio,
    pub reset: MockGpio,
    pub otg: MockGpio,
    pub timer: MockTimer,
}

impl MockBridge {
    /// Chip with no firmware loaded and no display attached
    pub fn blank() -> Self {
        let i2c = MockI2c::default();
        i2c.set_self_clearing(RX_P0_ADDR, AP_AUX_CTRL_STATUS, AP_AUX_CTRL_OP_EN);
        i2c.set_fifo(RX_P2_ADDR, FRAME_WINDOW_DATA);
        Self {
            i2c,
            power: MockGpio::new_output(),
            reset: MockGpio::new_output(),
            otg: MockGpio::new_input(),
            timer: MockTimer::new(),
        }
    }

    /// Chip with firmware loaded and a display plugged in
    pub fn healthy() -> Self {
        let chip = Self::blank();
        chip.i2c
            .set_register(RX_P0_ADDR, FLASH_LOAD_STA, FLASH_LOAD_STA_CHK);
        chip.i2c.set_register(RX_P0_ADDR, OCM_FW_VERSION, 0x01);
        chip.i2c.set_register(RX_P0_ADDR, OCM_FW_REVERSION, 0x05);
        chip.set_hpd(true);
        chip
    }

    /// Bus over clones of the peripherals
    pub fn bus(&self) -> Result<MockBus> {
        I2cBridgeBus::new(
            self.i2c.clone(),
            self.power.clone(),
            self.reset.clone(),
            self.otg.clone(),
            self.timer.clone(),
        )
    }

    fn update_status(&self, flag: SystemStatus, on: bool) {
        let mut status = SystemStatus::from_bits_truncate(self.i2c.register(RX_P0_ADDR, SYSTEM_STSTUS));
        status.set(flag, on);
        self.i2c
            .set_register(RX_P0_ADDR, SYSTEM_STSTUS, status.bits());
    }

    /// Plug or unplug the display
    pub fn set_hpd(&self, on: bool) {
        self.update_status(SystemStatus::HPD, on);
    }

    /// Report the bridge as VBUS power provider
    pub fn set_vbus_provider(&self, on: bool) {
        self.update_status(SystemStatus::VBUS_PROVIDER, on);
    }

    /// Serve `edid` (base block only) to the next AUX EDID read
    pub fn load_edid(&self, edid: &[u8]) {
        self.i2c.queue_read(RX_P0_ADDR, AP_AUX_BUFF_START, &[0x00]);
        for chunk in edid.chunks(MAX_DPCD_BUFFER_SIZE) {
            self.i2c.queue_read(RX_P0_ADDR, AP_AUX_BUFF_START, chunk);
        }
    }

    /// Bytes streamed into the frame window so far
    pub fn window_bytes(&self) -> Vec<u8> {
        self.i2c.fifo_data()
    }

    /// Number of frame commits written so far
    pub fn commits(&self) -> usize {
        self.i2c
            .transactions()
            .iter()
            .filter(|t| t.addr() == RX_P2_ADDR && t.offset() == Some(FRAME_WINDOW_CTRL))
            .count()
    }
}
