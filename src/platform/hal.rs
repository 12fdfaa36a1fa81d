//! embedded-hal 1.0 adapters
//!
//! Wraps blocking `embedded-hal` drivers so any HAL that implements the 1.0
//! traits can drive the bridge.
//!
//! # Example
//!
//! ```ignore
//! let i2c = HalI2c::new(hal_i2c, I2cConfig::default());
//! let power = HalPin::new(power_pin, GpioMode::OutputPushPull);
//! let reset = HalPin::new(reset_pin, GpioMode::OutputPushPull);
//! let otg = HalPin::open_drain(otg_pin);
//! let timer = HalDelay::new(delay);
//! let bus = I2cBridgeBus::new(i2c, power, reset, otg, timer)?;
//! ```

use crate::platform::{
    error::{GpioError, I2cError, PlatformError},
    traits::{i2c::MAX_FREQUENCY, GpioInterface, GpioMode, I2cConfig, I2cInterface, TimerInterface},
    Result,
};
use core::cell::RefCell;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

/// I2C adapter over an `embedded_hal::i2c::I2c` bus
pub struct HalI2c<B> {
    bus: B,
    config: I2cConfig,
}

impl<B: I2c> HalI2c<B> {
    /// Wrap a configured bus
    ///
    /// The frequency in `config` is informational; the HAL sets the real
    /// clock when the peripheral is created.
    pub fn new(bus: B, config: I2cConfig) -> Self {
        Self { bus, config }
    }

    /// Release the wrapped bus
    pub fn release(self) -> B {
        self.bus
    }

    /// Configuration the adapter was built with
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }
}

impl<B: I2c> I2cInterface for HalI2c<B> {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.bus.write(addr, data).map_err(|e| map_i2c_error(e.kind()))
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        self.bus.read(addr, buffer).map_err(|e| map_i2c_error(e.kind()))
    }

    fn write_read(
        &mut self,
        addr: u8,
        write_data: &[u8],
        read_buffer: &mut [u8],
    ) -> Result<()> {
        self.bus
            .write_read(addr, write_data, read_buffer)
            .map_err(|e| map_i2c_error(e.kind()))
    }

    fn set_frequency(&mut self, frequency: u32) -> Result<()> {
        if frequency == 0 || frequency > MAX_FREQUENCY {
            return Err(PlatformError::InvalidConfig);
        }
        // No runtime clock change in embedded-hal; remember the request only
        self.config.frequency = frequency;
        Ok(())
    }
}

/// Map embedded-hal I2C errors to platform I2C errors
fn map_i2c_error(kind: ErrorKind) -> PlatformError {
    let err = match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        | ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        | ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown) => I2cError::Nack,
        ErrorKind::ArbitrationLoss => I2cError::ArbitrationLost,
        ErrorKind::Overrun => I2cError::Overflow,
        _ => I2cError::BusError,
    };
    PlatformError::I2c(err)
}

/// GPIO adapter over an embedded-hal pin
///
/// embedded-hal pins cannot change direction at runtime, so the mode is
/// tracked here. Only a pin wrapped as `OutputOpenDrain` can be switched
/// to an input: writing it high releases the line, after which reads see
/// whoever else drives it. A push-pull pin stays an output.
pub struct HalPin<P> {
    pin: RefCell<P>,
    mode: GpioMode,
    open_drain: bool,
}

impl<P: OutputPin + InputPin> HalPin<P> {
    /// Wrap a pin configured by the HAL in `mode`
    pub fn new(pin: P, mode: GpioMode) -> Self {
        Self {
            pin: RefCell::new(pin),
            mode,
            open_drain: mode == GpioMode::OutputOpenDrain,
        }
    }

    /// Wrap a pin the HAL configured as open-drain, e.g. the OTG line
    pub fn open_drain(pin: P) -> Self {
        Self::new(pin, GpioMode::OutputOpenDrain)
    }

    /// Release the wrapped pin
    pub fn release(self) -> P {
        self.pin.into_inner()
    }

    fn drive(&mut self, high: bool) -> Result<()> {
        let pin = self.pin.get_mut();
        let result = if high { pin.set_high() } else { pin.set_low() };
        result.map_err(|_| PlatformError::Gpio(GpioError::DriveFailed))
    }
}

impl<P: OutputPin + InputPin> GpioInterface for HalPin<P> {
    fn set_high(&mut self) -> Result<()> {
        if !self.mode.is_output() {
            return Err(PlatformError::Gpio(GpioError::InvalidMode));
        }
        self.drive(true)
    }

    fn set_low(&mut self) -> Result<()> {
        if !self.mode.is_output() {
            return Err(PlatformError::Gpio(GpioError::InvalidMode));
        }
        self.drive(false)
    }

    fn read(&self) -> bool {
        // A pin that fails to sample reads as low
        self.pin.borrow_mut().is_high().unwrap_or(false)
    }

    fn set_mode(&mut self, mode: GpioMode) -> Result<()> {
        let wants_drain = !mode.is_output() || mode == GpioMode::OutputOpenDrain;
        if wants_drain && !self.open_drain {
            return Err(PlatformError::Gpio(GpioError::InvalidMode));
        }
        if !mode.is_output() {
            self.drive(true)?;
        }
        self.mode = mode;
        Ok(())
    }

    fn mode(&self) -> GpioMode {
        self.mode
    }
}

/// Timer adapter over an `embedded_hal::delay::DelayNs` provider
///
/// Keeps a virtual clock of the time spent in delays, which is all the
/// driver needs for its timeouts.
pub struct HalDelay<D> {
    delay: D,
    elapsed_us: u64,
}

impl<D: DelayNs> HalDelay<D> {
    /// Wrap a delay provider
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            elapsed_us: 0,
        }
    }
}

impl<D: DelayNs> TimerInterface for HalDelay<D> {
    fn delay_us(&mut self, us: u32) -> Result<()> {
        self.delay.delay_us(us);
        self.elapsed_us = self.elapsed_us.wrapping_add(us as u64);
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) -> Result<()> {
        self.delay.delay_ms(ms);
        self.elapsed_us = self.elapsed_us.wrapping_add(ms as u64 * 1000);
        Ok(())
    }

    fn now_us(&self) -> u64 {
        self.elapsed_us
    }
}
