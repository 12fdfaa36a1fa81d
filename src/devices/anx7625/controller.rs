//! ANX7625 bridge controller
//!
//! Owns the bridge bus and drives the lifecycle:
//!
//! ```text
//! Uninitialized --begin--> PoweredUp --> Configured(mode) --> Streaming
//!       ^                      |               |                  |
//!       |                      +------fail-----+----> Error(..) <-+ (HPD lost, bus fault)
//!       |                                               |
//!       +----------- begin (from Stopped / Error) ------+
//! any --end--> Stopped
//! ```
//!
//! `begin()` blocks until streaming or failure, using the bus delay for
//! every wait. `poll()` is one bounded status read, meant to be called once
//! per presentation loop iteration.

use super::aux::{AuxChannel, AuxError};
use super::bus::{BridgeBus, ControlLine};
use super::config::BridgeConfig;
use super::edid::{self, Edid};
use super::error::{BridgeError, BridgeResult, FailureReason};
use super::pll::{calculate_m_n, PllConfig};
use super::registers::*;
use super::sequence;
use super::status::{LinkStatus, SystemStatus};
use crate::display::framebuffer::PixelSink;
use crate::display::modes::{lookup, DisplayTiming, ModeId, VideoMode};
use crate::platform::PlatformError;

/// Bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeState {
    /// Never started
    Uninitialized,
    /// Power and reset asserted, firmware handshake pending
    PoweredUp,
    /// Video registers programmed for the mode, link not yet trained
    Configured(ModeId),
    /// Link trained, frames may be pushed
    Streaming,
    /// Shut down by `end()`
    Stopped,
    /// Bring-up or streaming failed
    Error(FailureReason),
}

impl BridgeState {
    /// `begin()` is accepted from this state
    pub fn can_begin(&self) -> bool {
        matches!(
            self,
            BridgeState::Uninitialized | BridgeState::Stopped | BridgeState::Error(_)
        )
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, BridgeState::Streaming)
    }
}

/// OCM firmware identification read during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub version: u8,
    pub revision: u8,
}

/// Reason recorded when a bring-up error puts the bridge in `Error`
fn failure_reason(err: &BridgeError) -> FailureReason {
    match err {
        BridgeError::Failed(reason) => *reason,
        _ => FailureReason::Bus,
    }
}

/// ANX7625 controller
pub struct BridgeController<B: BridgeBus> {
    bus: B,
    config: BridgeConfig,
    state: BridgeState,
    mode: Option<ModeId>,
    timing: Option<DisplayTiming>,
    pll: Option<PllConfig>,
    firmware: Option<FirmwareVersion>,
    edid: Option<Edid>,
    last_status: Option<LinkStatus>,
    consecutive_errors: u32,
}

impl<B: BridgeBus> BridgeController<B> {
    /// Create a controller, rejecting an invalid configuration
    pub fn new(bus: B, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        Ok(Self {
            bus,
            config,
            state: BridgeState::Uninitialized,
            mode: None,
            timing: None,
            pll: None,
            firmware: None,
            edid: None,
            last_status: None,
            consecutive_errors: 0,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Mode requested by the last `begin()`
    pub fn mode(&self) -> Option<ModeId> {
        self.mode
    }

    /// Timing programmed by the last successful configuration
    pub fn timing(&self) -> Option<&DisplayTiming> {
        self.timing.as_ref()
    }

    pub fn pll(&self) -> Option<&PllConfig> {
        self.pll.as_ref()
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// EDID read by the last `Auto` bring-up
    pub fn edid(&self) -> Option<&Edid> {
        self.edid.as_ref()
    }

    /// Status from the last successful poll or training check
    pub fn last_status(&self) -> Option<LinkStatus> {
        self.last_status
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Give the bus back
    pub fn release(self) -> B {
        self.bus
    }

    /// Bring the bridge up in `mode` for a `width x height` frame
    ///
    /// Blocks until the link is trained or a step fails. On failure every
    /// asserted control line is deasserted and the bridge is left in
    /// `Error(reason)`; a later `begin()` starts over from power-up.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the bridge is `Uninitialized`, `Stopped` or `Error`
    /// - `UnsupportedMode` for a fixed mode without a table entry (no I/O)
    /// - `Bus` when a register sequence fails
    /// - `Failed(reason)` for every other bring-up failure
    pub fn begin(&mut self, mode: ModeId, frame: (u16, u16)) -> BridgeResult<()> {
        if !self.state.can_begin() {
            return Err(BridgeError::InvalidState {
                op: "begin",
                state: self.state,
            });
        }
        let fixed = match mode {
            ModeId::Auto => None,
            id => Some(*lookup(id)?),
        };

        crate::log_info!("Bridge begin: {}", mode.name());
        self.mode = Some(mode);
        self.timing = None;
        self.pll = None;
        self.edid = None;
        self.last_status = None;
        self.consecutive_errors = 0;

        match self.bring_up(mode, fixed, frame) {
            Ok(()) => {
                self.state = BridgeState::Streaming;
                crate::log_info!("Bridge streaming {}", mode.name());
                Ok(())
            }
            Err(err) => {
                let reason = failure_reason(&err);
                crate::log_error!("Bridge bring-up failed: {:?}", err);
                let failures = sequence::power_down(&self.bus).run_best_effort(&mut self.bus);
                if failures > 0 {
                    crate::log_warn!("{} power-down steps failed", failures);
                }
                self.state = BridgeState::Error(reason);
                Err(err)
            }
        }
    }

    fn bring_up(
        &mut self,
        mode: ModeId,
        fixed: Option<VideoMode>,
        frame: (u16, u16),
    ) -> BridgeResult<()> {
        // Restart after an error starts from a full reset
        sequence::power_down(&self.bus).run(&mut self.bus)?;
        self.release_vbus()?;

        sequence::power_up(self.config.power_settle_ms).run(&mut self.bus)?;
        self.state = BridgeState::PoweredUp;

        self.firmware = Some(self.handshake()?);
        self.bus.delay_ms(self.config.stabilization_ms)?;

        let status = self.read_system_status()?;
        if status.contains(SystemStatus::VBUS_PROVIDER) {
            crate::log_info!("Bridge is VBUS provider, enabling VBUS");
            self.bus.set_line(ControlLine::Otg, false)?;
            self.bus.delay_ms(self.config.provider_settle_ms)?;
        }

        self.wait_hpd()?;
        sequence::start_dp().run(&mut self.bus)?;
        let secure = self.bus.read_reg(RX_P1_ADDR, SECURE_OCM_VERSION)?;
        crate::log_debug!("Secure OCM version {:#x}", secure);

        let timing = match fixed {
            Some(m) => m.timing,
            None => self.read_sink_timing(frame)?,
        };
        let pll = calculate_m_n(timing.pixel_clock_hz())
            .ok_or(BridgeError::Failed(FailureReason::PllOutOfRange))?;
        crate::log_info!(
            "PLL: M={} N={} post divider {}",
            pll.m,
            pll.n,
            pll.post_divider
        );

        sequence::dsi_config(&timing, &pll).run(&mut self.bus)?;
        self.timing = Some(timing);
        self.pll = Some(pll);
        self.state = BridgeState::Configured(mode);

        self.train_link()
    }

    /// Turn VBUS off through OTG and let it discharge
    fn release_vbus(&mut self) -> BridgeResult<()> {
        if self.bus.sense_line(ControlLine::Otg)? {
            crate::log_info!("OTG high, turning VBUS off");
            self.bus.set_line(ControlLine::Otg, true)?;
        } else {
            crate::log_warn!("OTG held low externally, cannot turn VBUS off");
        }
        self.bus.delay_ms(self.config.vbus_discharge_ms)?;
        Ok(())
    }

    /// Poll for loaded firmware, retrying the whole handshake
    fn handshake(&mut self) -> BridgeResult<FirmwareVersion> {
        for attempt in 1..=self.config.handshake_attempts {
            if let Some(firmware) = self.power_on_init()? {
                return Ok(firmware);
            }
            crate::log_warn!("Firmware handshake attempt {} failed", attempt);
        }
        Err(BridgeError::Failed(FailureReason::FirmwareNotReady))
    }

    fn power_on_init(&mut self) -> BridgeResult<Option<FirmwareVersion>> {
        self.bus
            .write_reg(RX_P0_ADDR, XTAL_FRQ_SEL, XTAL_FRQ_27M)?;

        for _ in 0..OCM_LOADING_TIME {
            let loaded = self.bus.read_reg(RX_P0_ADDR, FLASH_LOAD_STA)?;
            if loaded & FLASH_LOAD_STA_CHK == 0 {
                self.bus.delay_ms(1)?;
                continue;
            }
            let version = self.bus.read_reg(RX_P0_ADDR, OCM_FW_VERSION)?;
            let revision = self.bus.read_reg(RX_P0_ADDR, OCM_FW_REVERSION)?;
            if version == 0 && revision == 0 {
                continue;
            }
            crate::log_info!("Firmware version {:#x}, revision {:#x}", version, revision);
            return Ok(Some(FirmwareVersion { version, revision }));
        }
        Ok(None)
    }

    fn read_system_status(&mut self) -> BridgeResult<SystemStatus> {
        let raw = self.bus.read_reg(RX_P0_ADDR, SYSTEM_STSTUS)?;
        Ok(SystemStatus::from_bits_truncate(raw))
    }

    fn wait_hpd(&mut self) -> BridgeResult<()> {
        for _ in 0..self.config.hpd_polls() {
            self.bus.delay_ms(self.config.hpd_poll_interval_ms)?;
            if self.read_system_status()?.contains(SystemStatus::HPD) {
                crate::log_info!("HPD detected");
                return Ok(());
            }
        }
        crate::log_error!("No HPD within {} ms", self.config.hpd_timeout_ms);
        Err(BridgeError::Failed(FailureReason::HpdTimeout))
    }

    /// Read the sink EDID and check its preferred timing against the frame
    fn read_sink_timing(&mut self, frame: (u16, u16)) -> BridgeResult<DisplayTiming> {
        let mut raw = [0u8; FOUR_BLOCK_SIZE];
        let blocks = AuxChannel::new(&mut self.bus)
            .read_edid(&mut raw)
            .map_err(|e| match e {
                AuxError::Bus(err) => BridgeError::Bus(err),
                other => {
                    crate::log_error!("EDID read failed: {:?}", other);
                    BridgeError::Failed(FailureReason::EdidInvalid)
                }
            })?;

        let sink = edid::decode(&raw[..blocks * ONE_BLOCK_SIZE]).map_err(|e| {
            crate::log_error!("EDID rejected: {:?}", e);
            BridgeError::Failed(FailureReason::EdidInvalid)
        })?;
        let preferred = sink.preferred;
        crate::log_info!(
            "Sink {} product {:#x}: {}x{}, {} kHz",
            sink.manufacturer_str(),
            sink.product_code,
            preferred.hactive,
            preferred.vactive,
            preferred.pixel_clock_khz
        );
        self.edid = Some(sink);

        if (preferred.hactive, preferred.vactive) != frame {
            crate::log_error!(
                "Sink timing {}x{} does not match {}x{} frame",
                preferred.hactive,
                preferred.vactive,
                frame.0,
                frame.1
            );
            return Err(BridgeError::Failed(FailureReason::EdidMismatch));
        }
        Ok(preferred)
    }

    fn read_link_status(&mut self, trained: bool) -> BridgeResult<LinkStatus> {
        let system = self.bus.read_reg(RX_P0_ADDR, SYSTEM_STSTUS)?;
        let av_status = self.bus.read_reg(RX_P0_ADDR, AP_AV_STATUS)?;
        Ok(LinkStatus::from_registers(system, av_status, trained))
    }

    /// Check the video path, re-enabling the receiver with growing backoff
    fn train_link(&mut self) -> BridgeResult<()> {
        let attempts = self.config.training_attempts;
        for attempt in 1..=attempts {
            let status = self.read_link_status(false)?;
            if status.hpd() && status.errors.is_empty() {
                crate::log_info!("Link trained after {} attempt(s)", attempt);
                self.last_status = Some(LinkStatus {
                    trained: true,
                    ..status
                });
                return Ok(());
            }
            crate::log_warn!(
                "Link training attempt {} failed: {:?}",
                attempt,
                status.errors
            );
            if attempt < attempts {
                self.bus
                    .delay_ms(self.config.training_backoff_ms * attempt as u32)?;
                sequence::enable_mipi_rx().run(&mut self.bus)?;
            }
        }
        Err(BridgeError::Failed(FailureReason::LinkTraining))
    }

    /// Shut the bridge down
    ///
    /// Deasserts every asserted control line in reverse power-up order and
    /// moves to `Stopped`. A no-op when `Uninitialized` or already `Stopped`.
    /// On a failed step the state is kept so `end()` can be retried; lines
    /// already deasserted are skipped on the retry.
    pub fn end(&mut self) -> BridgeResult<()> {
        if matches!(
            self.state,
            BridgeState::Uninitialized | BridgeState::Stopped
        ) {
            return Ok(());
        }
        sequence::power_down(&self.bus).run(&mut self.bus)?;
        self.state = BridgeState::Stopped;
        self.consecutive_errors = 0;
        crate::log_info!("Bridge stopped");
        Ok(())
    }

    /// Sample the link once
    ///
    /// Only valid while `Streaming`. A dropped HPD moves the bridge to
    /// `Error(LinkLost)` and still returns the status that showed it. Bus
    /// errors here and in frame pushes are counted; once
    /// `max_consecutive_errors` are reached in a row the bridge moves to
    /// `Error(BusFault)`. The count is cleared by [`poll_complete`].
    ///
    /// [`poll_complete`]: Self::poll_complete
    pub fn poll(&mut self) -> BridgeResult<LinkStatus> {
        self.ensure_streaming("poll")?;
        match self.read_link_status(true) {
            Ok(status) => {
                self.last_status = Some(status);
                if !status.hpd() {
                    crate::log_warn!("HPD lost while streaming");
                    self.state = BridgeState::Error(FailureReason::LinkLost);
                }
                Ok(status)
            }
            Err(BridgeError::Bus(e)) => Err(self.bus_error(e)),
            Err(e) => Err(e),
        }
    }

    /// Mark the current poll cycle, status read and any push, as clean
    pub fn poll_complete(&mut self) {
        self.consecutive_errors = 0;
    }

    fn ensure_streaming(&self, op: &'static str) -> BridgeResult<()> {
        if self.state.is_streaming() {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    /// Count a bus error while streaming
    fn bus_error(&mut self, err: PlatformError) -> BridgeError {
        self.consecutive_errors += 1;
        crate::log_warn!(
            "Bus error while streaming ({} in a row): {:?}",
            self.consecutive_errors,
            err
        );
        if self.consecutive_errors >= self.config.max_consecutive_errors {
            crate::log_error!("Too many bus errors, giving up on the link");
            self.state = BridgeState::Error(FailureReason::BusFault);
        }
        BridgeError::Bus(err)
    }
}

impl<B: BridgeBus> PixelSink for BridgeController<B> {
    fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    fn begin_frame(&mut self, offset: usize) -> BridgeResult<()> {
        self.ensure_streaming("push")?;
        let window = self.config.window;
        let offset = (offset as u32).to_le_bytes();
        self.bus
            .write(window.addr, window.offset_reg, &offset[..3])
            .map_err(|e| self.bus_error(e))
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> BridgeResult<()> {
        let window = self.config.window;
        self.bus
            .write(window.addr, window.data_reg, bytes)
            .map_err(|e| self.bus_error(e))
    }

    fn commit_frame(&mut self) -> BridgeResult<()> {
        let window = self.config.window;
        self.bus
            .write_reg(window.addr, window.ctrl_reg, window.commit)
            .map_err(|e| self.bus_error(e))
    }
}
