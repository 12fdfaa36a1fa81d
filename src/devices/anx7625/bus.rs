//! Bus transport adapter
//!
//! Register access over I2C plus the three control lines (power enable,
//! reset, OTG enable). Every call is a real transaction: nothing is cached
//! and failures are surfaced unchanged, never retried.

use super::registers::reserved_offset;
use crate::platform::{
    error::{I2cError, PlatformError},
    traits::{GpioInterface, GpioMode, I2cInterface, TimerInterface},
    Result,
};

/// Maximum payload of one register write (one offset byte goes in front)
pub const MAX_WRITE_LEN: usize = 255;

/// I2C clock the bridge is run at
pub const I2C_FREQUENCY: u32 = 200_000;

/// Bridge control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlLine {
    /// Video power enable
    Power,
    /// Chip reset (active low)
    Reset,
    /// USB OTG enable, low turns VBUS on
    Otg,
}

impl ControlLine {
    /// Output mode used when the line is driven
    pub const fn output_mode(self) -> GpioMode {
        match self {
            ControlLine::Otg => GpioMode::OutputOpenDrain,
            _ => GpioMode::OutputPushPull,
        }
    }

    const fn index(self) -> usize {
        match self {
            ControlLine::Power => 0,
            ControlLine::Reset => 1,
            ControlLine::Otg => 2,
        }
    }
}

/// Register and line access used by the bridge controller
///
/// `addr` is a 7-bit slave address, `offset` the 8-bit register offset.
pub trait BridgeBus {
    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, addr: u8, offset: u8, buf: &mut [u8]) -> Result<()>;

    /// Write `bytes` starting at `offset`
    fn write(&mut self, addr: u8, offset: u8, bytes: &[u8]) -> Result<()>;

    /// Drive a control line
    fn set_line(&mut self, line: ControlLine, high: bool) -> Result<()>;

    /// Stop driving a line and leave it as a pulled-up input
    fn release_line(&mut self, line: ControlLine) -> Result<()>;

    /// Release a line and sample it
    fn sense_line(&mut self, line: ControlLine) -> Result<bool>;

    /// Level the adapter is driving, `None` while released
    fn line_level(&self, line: ControlLine) -> Option<bool>;

    /// Blocking settle delay
    fn delay_ms(&mut self, ms: u32) -> Result<()>;

    /// Read one register
    fn read_reg(&mut self, addr: u8, offset: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(addr, offset, &mut buf)?;
        Ok(buf[0])
    }

    /// Write one register
    fn write_reg(&mut self, addr: u8, offset: u8, value: u8) -> Result<()> {
        self.write(addr, offset, &[value])
    }

    /// Read-modify-write: clear `clear`, then set `set`
    fn update_reg(&mut self, addr: u8, offset: u8, clear: u8, set: u8) -> Result<u8> {
        let value = (self.read_reg(addr, offset)? & !clear) | set;
        self.write_reg(addr, offset, value)?;
        Ok(value)
    }
}

/// [`BridgeBus`] over the platform I2C, GPIO and timer traits
///
/// Before the first access to a slave following an access to another one,
/// the adapter writes `0x00` to that slave's reserved offset. The on-chip
/// firmware shares the bus and misses transactions without it.
pub struct I2cBridgeBus<I, P, R, O, T> {
    i2c: I,
    power: P,
    reset: R,
    otg: O,
    timer: T,
    last_addr: Option<u8>,
    lines: [Option<bool>; 3],
}

impl<I, P, R, O, T> I2cBridgeBus<I, P, R, O, T>
where
    I: I2cInterface,
    P: GpioInterface,
    R: GpioInterface,
    O: GpioInterface,
    T: TimerInterface,
{
    /// Take ownership of the bus and lines
    ///
    /// The I2C clock is set to [`I2C_FREQUENCY`]. Power and reset become
    /// push-pull outputs driven low; OTG becomes a pulled-up input. OTG is
    /// shared with other drivers of the VBUS switch, so it must be an
    /// open-drain line: driving it high only releases it.
    pub fn new(mut i2c: I, mut power: P, mut reset: R, mut otg: O, timer: T) -> Result<Self> {
        i2c.set_frequency(I2C_FREQUENCY)?;
        power.set_mode(GpioMode::OutputPushPull)?;
        power.set_low()?;
        reset.set_mode(GpioMode::OutputPushPull)?;
        reset.set_low()?;
        otg.set_mode(GpioMode::InputPullUp)?;

        Ok(Self {
            i2c,
            power,
            reset,
            otg,
            timer,
            last_addr: None,
            lines: [Some(false), Some(false), None],
        })
    }

    /// Give the peripherals back
    pub fn release(self) -> (I, P, R, O, T) {
        (self.i2c, self.power, self.reset, self.otg, self.timer)
    }

    /// Timer used for settle delays
    pub fn timer(&self) -> &T {
        &self.timer
    }

    fn access_workaround(&mut self, addr: u8) {
        if self.last_addr == Some(addr) {
            return;
        }
        let offset = reserved_offset(addr);
        match self.i2c.write(addr, &[offset, 0x00]) {
            Ok(()) => self.last_addr = Some(addr),
            Err(e) => {
                // Retried on the next access to this slave
                crate::log_error!("Failed to access {:#x}:{:#x}: {:?}", addr, offset, e);
            }
        }
    }

    fn pin(&mut self, line: ControlLine) -> &mut dyn GpioInterface {
        match line {
            ControlLine::Power => &mut self.power,
            ControlLine::Reset => &mut self.reset,
            ControlLine::Otg => &mut self.otg,
        }
    }
}

impl<I, P, R, O, T> BridgeBus for I2cBridgeBus<I, P, R, O, T>
where
    I: I2cInterface,
    P: GpioInterface,
    R: GpioInterface,
    O: GpioInterface,
    T: TimerInterface,
{
    fn read(&mut self, addr: u8, offset: u8, buf: &mut [u8]) -> Result<()> {
        self.access_workaround(addr);
        self.i2c.write_read(addr, &[offset], buf).map_err(|e| {
            crate::log_error!("Failed to read {:#x}:{:#x}", addr, offset);
            e
        })
    }

    fn write(&mut self, addr: u8, offset: u8, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_WRITE_LEN {
            return Err(PlatformError::I2c(I2cError::Overflow));
        }
        let mut frame: heapless::Vec<u8, { MAX_WRITE_LEN + 1 }> = heapless::Vec::new();
        frame
            .push(offset)
            .map_err(|_| PlatformError::I2c(I2cError::Overflow))?;
        frame
            .extend_from_slice(bytes)
            .map_err(|_| PlatformError::I2c(I2cError::Overflow))?;

        self.access_workaround(addr);
        self.i2c.write(addr, &frame).map_err(|e| {
            crate::log_error!("Failed to write {:#x}:{:#x}", addr, offset);
            e
        })
    }

    fn set_line(&mut self, line: ControlLine, high: bool) -> Result<()> {
        let pin = self.pin(line);
        if !pin.mode().is_output() {
            pin.set_mode(line.output_mode())?;
        }
        if high {
            pin.set_high()?;
        } else {
            pin.set_low()?;
        }
        self.lines[line.index()] = Some(high);
        Ok(())
    }

    fn release_line(&mut self, line: ControlLine) -> Result<()> {
        self.pin(line).set_mode(GpioMode::InputPullUp)?;
        self.lines[line.index()] = None;
        Ok(())
    }

    fn sense_line(&mut self, line: ControlLine) -> Result<bool> {
        if self.lines[line.index()].is_some() {
            self.release_line(line)?;
        }
        Ok(self.pin(line).read())
    }

    fn line_level(&self, line: ControlLine) -> Option<bool> {
        self.lines[line.index()]
    }

    fn delay_ms(&mut self, ms: u32) -> Result<()> {
        self.timer.delay_ms(ms)
    }
}
