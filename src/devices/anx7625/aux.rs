//! DisplayPort AUX channel access through the OCM
//!
//! Used to read the sink EDID over I2C-over-AUX (DDC address 0x50).

use super::bus::BridgeBus;
use super::registers::*;
use crate::platform::PlatformError;
use core::fmt;

/// DDC EDID address on the AUX channel
const DDC_EDID_ADDR: u8 = 0x50;
/// DDC segment pointer address
const DDC_SEGMENT_ADDR: u8 = 0x30;
/// I2C-over-AUX write, MOT set
const AUX_CMD_WRITE: u8 = 0x04;
/// I2C-over-AUX read of one byte
const AUX_CMD_READ_1: u8 = 0x01;
/// I2C-over-AUX read of 16 bytes
const AUX_CMD_READ_16: u8 = 0xF1;
/// EDID offset of the extension count
const EDID_EXTENSION_OFFSET: u8 = 0x7E;
/// Attempts per 16-byte EDID read
const EDID_READ_ATTEMPTS: u32 = 3;

/// AUX transaction failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuxError {
    /// Register access failed
    Bus(PlatformError),
    /// OCM never finished the operation
    Timeout,
    /// Sink replied with an error code
    Reply(u8),
}

impl From<PlatformError> for AuxError {
    fn from(err: PlatformError) -> Self {
        AuxError::Bus(err)
    }
}

impl fmt::Display for AuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxError::Bus(e) => write!(f, "AUX bus error: {}", e),
            AuxError::Timeout => write!(f, "AUX operation timed out"),
            AuxError::Reply(code) => write!(f, "AUX reply error {:#x}", code),
        }
    }
}

/// AUX channel over a borrowed bridge bus
pub struct AuxChannel<'a, B: BridgeBus> {
    bus: &'a mut B,
}

impl<'a, B: BridgeBus> AuxChannel<'a, B> {
    pub fn new(bus: &'a mut B) -> Self {
        Self { bus }
    }

    /// Pulse the AUX reset
    pub fn reset(&mut self) -> Result<(), AuxError> {
        self.bus.update_reg(TX_P2_ADDR, RST_CTRL2, 0, AUX_RST)?;
        self.bus.update_reg(TX_P2_ADDR, RST_CTRL2, AUX_RST, 0)?;
        Ok(())
    }

    fn wait_op_finish(&mut self) -> Result<(), AuxError> {
        for _ in 0..AUX_WAIT_POLLS {
            self.bus.delay_ms(AUX_WAIT_INTERVAL_MS)?;
            let status = self.bus.read_reg(RX_P0_ADDR, AP_AUX_CTRL_STATUS)?;
            if status & AP_AUX_CTRL_OP_EN == 0 {
                let code = status & AP_AUX_CTRL_ERROR_MASK;
                if code != 0 {
                    crate::log_debug!("aux status {:#x}", status);
                    return Err(AuxError::Reply(code));
                }
                return Ok(());
            }
        }
        crate::log_error!("Timed out waiting for AUX operation");
        Err(AuxError::Timeout)
    }

    fn start(&mut self) -> Result<(), AuxError> {
        self.bus
            .update_reg(RX_P0_ADDR, AP_AUX_CTRL_STATUS, 0, AP_AUX_CTRL_OP_EN)?;
        self.wait_op_finish()
    }

    /// Write one byte (the sink's register offset)
    fn write_offset(&mut self, offset: u8) -> Result<(), AuxError> {
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_BUFF_START, offset)?;
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_COMMAND, AUX_CMD_WRITE)?;
        self.start()
    }

    fn read_cmd(&mut self, command: u8) -> Result<(), AuxError> {
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_COMMAND, command)?;
        self.start()
    }

    /// Read 16 bytes at `offset`, resetting the channel between attempts
    fn read_chunk(&mut self, offset: u8, out: &mut [u8]) -> Result<(), AuxError> {
        let mut last = AuxError::Timeout;
        for _ in 0..EDID_READ_ATTEMPTS {
            let attempt = self
                .write_offset(offset)
                .and_then(|_| self.read_cmd(AUX_CMD_READ_16));
            match attempt {
                Ok(()) => {
                    self.bus.read(RX_P0_ADDR, AP_AUX_BUFF_START, out)?;
                    return Ok(());
                }
                Err(AuxError::Bus(e)) => return Err(AuxError::Bus(e)),
                Err(e) => {
                    crate::log_error!("EDID read at {:#x} failed, reset", offset);
                    last = e;
                    self.reset()?;
                }
            }
        }
        Err(last)
    }

    fn select_segment(&mut self, segment: u8) -> Result<(), AuxError> {
        // Address-only transaction to the segment pointer, then the segment
        self.bus
            .write_reg(RX_P0_ADDR, AP_AUX_ADDR_7_0, DDC_SEGMENT_ADDR)?;
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_COMMAND, AUX_CMD_WRITE)?;
        self.bus.write_reg(
            RX_P0_ADDR,
            AP_AUX_CTRL_STATUS,
            AP_AUX_CTRL_ADDRONLY | AP_AUX_CTRL_OP_EN,
        )?;
        self.wait_op_finish()?;
        self.write_offset(segment)?;
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_ADDR_7_0, DDC_EDID_ADDR)?;
        Ok(())
    }

    /// Number of extension blocks the sink advertises, capped at 3
    fn extension_count(&mut self) -> Result<u8, AuxError> {
        self.write_offset(EDID_EXTENSION_OFFSET)?;
        self.read_cmd(AUX_CMD_READ_1)?;
        let count = self.bus.read_reg(RX_P0_ADDR, AP_AUX_BUFF_START)?;
        crate::log_info!("EDID blocks: {}", count as u32 + 1);
        Ok(if count > 3 { 1 } else { count })
    }

    /// Read up to four EDID blocks into `out`
    ///
    /// Returns the number of blocks read. Blocks 0 and 1 are read directly,
    /// blocks 2 and 3 through DDC segment 1. A chunk that keeps failing ends
    /// the read of its block early.
    pub fn read_edid(&mut self, out: &mut [u8; FOUR_BLOCK_SIZE]) -> Result<usize, AuxError> {
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_ADDR_7_0, DDC_EDID_ADDR)?;
        self.bus.write_reg(RX_P0_ADDR, AP_AUX_ADDR_15_8, 0)?;
        self.bus.update_reg(RX_P0_ADDR, AP_AUX_ADDR_19_16, 0x0F, 0)?;

        let extensions = self.extension_count()? as usize;
        let chunks_per_block = ONE_BLOCK_SIZE / MAX_DPCD_BUFFER_SIZE;
        let mut chunk = [0u8; MAX_DPCD_BUFFER_SIZE];

        for block in 0..=extensions {
            if block >= 2 {
                self.select_segment(1)?;
            }
            for i in 0..chunks_per_block {
                let pos = (block * chunks_per_block + i) * MAX_DPCD_BUFFER_SIZE;
                // Offset within the 256-byte DDC segment
                let offset = (pos % (2 * ONE_BLOCK_SIZE)) as u8;
                match self.read_chunk(offset, &mut chunk) {
                    Ok(()) => out[pos..pos + MAX_DPCD_BUFFER_SIZE].copy_from_slice(&chunk),
                    Err(AuxError::Bus(e)) => return Err(AuxError::Bus(e)),
                    Err(_) => break,
                }
            }
        }

        self.reset()?;
        Ok(extensions + 1)
    }
}
