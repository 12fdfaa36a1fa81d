//! Bridge handle
//!
//! The caller-facing object: one bridge controller plus the frame buffers it
//! streams. Created once, started with `begin()`, driven by `poll()` and torn
//! down with `end()`. Nothing is released implicitly on drop.

use crate::devices::anx7625::bus::BridgeBus;
use crate::devices::anx7625::config::BridgeConfig;
use crate::devices::anx7625::controller::{BridgeController, BridgeState};
use crate::devices::anx7625::error::{BridgeError, BridgeResult};
use crate::devices::anx7625::status::LinkStatus;
use crate::display::framebuffer::{BufferMode, FrameBufferManager, FrameSlot};
use crate::display::modes::{lookup, ModeId};

/// Buffers lent to the handle
pub enum BufferSet<'a> {
    Single(&'a mut [u8]),
    /// Front (shown first) and back
    Double(&'a mut [u8], &'a mut [u8]),
}

/// Handle construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleConfig {
    pub mode: ModeId,
    /// Frame size; required for `Auto`, must match the table for fixed modes
    pub size: Option<(u16, u16)>,
    /// RGB565 splash color written to every buffer by a `begin()` that runs
    /// before anything was presented, `None` to keep the buffer contents
    pub background: Option<u16>,
    pub bridge: BridgeConfig,
}

impl HandleConfig {
    pub fn new(mode: ModeId) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            mode: ModeId::Mode640x480At60,
            size: None,
            background: Some(0x0000),
            bridge: BridgeConfig::default(),
        }
    }
}

/// What one `poll()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollReport {
    pub status: LinkStatus,
    /// Frame bytes pushed by this poll
    pub pushed: usize,
    /// This poll committed a frame
    pub frame_complete: bool,
}

/// Frame size for `mode`, honoring an override
fn resolve_size(mode: ModeId, size: Option<(u16, u16)>) -> BridgeResult<(u16, u16)> {
    match (mode, size) {
        (ModeId::Auto, Some(size)) => Ok(size),
        (ModeId::Auto, None) => Err(BridgeError::InvalidConfig(
            "auto mode needs an explicit frame size",
        )),
        (id, size) => {
            let entry = lookup(id)?;
            let native = (entry.width, entry.height);
            match size {
                Some(size) if size != native => Err(BridgeError::InvalidConfig(
                    "frame size differs from the mode",
                )),
                _ => Ok(native),
            }
        }
    }
}

/// Owned bridge instance with its frame buffers
pub struct BridgeHandle<'a, B: BridgeBus> {
    controller: BridgeController<B>,
    frames: FrameBufferManager<'a>,
    mode: ModeId,
    background: Option<u16>,
}

impl<'a, B: BridgeBus> BridgeHandle<'a, B> {
    /// Validate the mode and bind the buffers
    ///
    /// # Errors
    ///
    /// `UnsupportedMode`, `BufferSizeMismatch` or `InvalidConfig`. No bus
    /// I/O happens here.
    pub fn new(bus: B, config: HandleConfig, buffers: BufferSet<'a>) -> BridgeResult<Self> {
        let (width, height) = resolve_size(config.mode, config.size)?;
        let frames = match buffers {
            BufferSet::Single(buffer) => FrameBufferManager::single(buffer, width, height)?,
            BufferSet::Double(front, back) => {
                FrameBufferManager::double(front, back, width, height)?
            }
        };
        let controller = BridgeController::new(bus, config.bridge)?;

        Ok(Self {
            controller,
            frames,
            mode: config.mode,
            background: config.background,
        })
    }

    /// Bring the bridge up and queue the first frame
    ///
    /// Until the caller has presented something the splash color is shown.
    /// A restart after a lost link re-sends the last presented frame.
    pub fn begin(&mut self) -> BridgeResult<()> {
        self.controller
            .begin(self.mode, (self.frames.width(), self.frames.height()))?;
        if self.frames.presents() == 0 {
            if let Some(color) = self.background {
                self.frames.fill_all(color);
            }
        }
        self.frames.mark_pending();
        Ok(())
    }

    /// Shut the bridge down and drop any pending push
    pub fn end(&mut self) -> BridgeResult<()> {
        self.controller.end()?;
        self.frames.cancel();
        Ok(())
    }

    /// Sample the link and, while it is healthy, push the pending frame
    ///
    /// A lost link is reported through the returned status with the bridge
    /// left in `Error(LinkLost)`, not as an error. The bus error count is
    /// only cleared once both the status read and the push went through.
    pub fn poll(&mut self) -> BridgeResult<PollReport> {
        let status = self.controller.poll()?;
        let mut report = PollReport {
            status,
            pushed: 0,
            frame_complete: false,
        };
        if self.controller.state().is_streaming() && status.is_healthy() {
            let budget = self.controller.config().chunk_budget;
            let outcome = self.frames.push(&mut self.controller, budget)?;
            report.pushed = outcome.bytes;
            report.frame_complete = outcome.complete;
        }
        self.controller.poll_complete();
        Ok(report)
    }

    /// Show the back buffer
    pub fn present(&mut self) {
        self.frames.present();
    }

    /// Show a bound slot holding a `width x height` frame, without copying
    ///
    /// Draw into [`back_slot`](Self::back_slot) through
    /// [`slot_mut`](Self::slot_mut), then hand it here.
    pub fn image(&mut self, slot: FrameSlot, width: u16, height: u16) -> BridgeResult<()> {
        self.frames.present_slot(slot, width, height)
    }

    /// Copy a complete frame into the back buffer and show it
    pub fn load_image(&mut self, src: &[u8], width: u16, height: u16) -> BridgeResult<()> {
        self.frames.load(src, width, height)?;
        self.frames.present();
        Ok(())
    }

    /// Slot to draw the next frame into
    pub fn back_slot(&self) -> FrameSlot {
        self.frames.back_slot()
    }

    pub fn slot_mut(&mut self, slot: FrameSlot) -> BridgeResult<&mut [u8]> {
        self.frames.slot_mut(slot)
    }

    /// Fill the back buffer with an RGB565 color
    pub fn fill(&mut self, color: u16) {
        self.frames.fill(color);
    }

    pub fn back_buffer_mut(&mut self) -> &mut [u8] {
        self.frames.back_buffer_mut()
    }

    pub fn state(&self) -> BridgeState {
        self.controller.state()
    }

    /// Status from the last poll
    pub fn link_status(&self) -> Option<LinkStatus> {
        self.controller.last_status()
    }

    pub fn mode(&self) -> ModeId {
        self.mode
    }

    pub fn width(&self) -> u16 {
        self.frames.width()
    }

    pub fn height(&self) -> u16 {
        self.frames.height()
    }

    pub fn buffer_mode(&self) -> BufferMode {
        self.frames.mode()
    }

    pub fn frames(&self) -> &FrameBufferManager<'a> {
        &self.frames
    }

    pub fn controller(&self) -> &BridgeController<B> {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::anx7625::error::FailureReason;
    use crate::devices::anx7625::mock::{MockBridge, MockBus};
    use crate::devices::anx7625::registers::{FLASH_LOAD_STA, FRAME_WINDOW_DATA, RX_P0_ADDR, RX_P2_ADDR};
    use crate::display::framebuffer::SlotRole;

    const W: u16 = 640;
    const H: u16 = 480;
    const LEN: usize = W as usize * H as usize * 2;

    fn handle<'a>(
        chip: &MockBridge,
        config: HandleConfig,
        buffers: BufferSet<'a>,
    ) -> BridgeHandle<'a, MockBus> {
        BridgeHandle::new(chip.bus().unwrap(), config, buffers).unwrap()
    }

    #[test]
    fn test_new_validates_buffers() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut short = vec![0u8; LEN - 2];

        let result = BridgeHandle::new(
            chip.bus().unwrap(),
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Double(&mut a, &mut short),
        );
        assert!(matches!(
            result,
            Err(BridgeError::BufferSizeMismatch {
                expected: LEN,
                actual
            }) if actual == LEN - 2
        ));
        assert_eq!(chip.i2c.transaction_count(), 0);
    }

    #[test]
    fn test_new_rejects_unsupported_mode() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; 1920 * 1080 * 2];
        let result = BridgeHandle::new(
            chip.bus().unwrap(),
            HandleConfig::new(ModeId::Mode1920x1080At60),
            BufferSet::Single(&mut a),
        );
        assert!(matches!(
            result,
            Err(BridgeError::UnsupportedMode(ModeId::Mode1920x1080At60))
        ));
    }

    #[test]
    fn test_size_override_rules() {
        assert_eq!(resolve_size(ModeId::Auto, Some((720, 480))), Ok((720, 480)));
        assert!(matches!(
            resolve_size(ModeId::Auto, None),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert_eq!(
            resolve_size(ModeId::Mode800x600At59, Some((800, 600))),
            Ok((800, 600))
        );
        assert!(matches!(
            resolve_size(ModeId::Mode800x600At59, Some((640, 480))),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_begin_pushes_splash() {
        let chip = MockBridge::healthy();
        let mut a = vec![0xFFu8; LEN];
        let mut b = vec![0xFFu8; LEN];
        let config = HandleConfig {
            background: Some(0x001F),
            ..HandleConfig::new(ModeId::Mode640x480At60)
        };
        let mut handle = handle(&chip, config, BufferSet::Double(&mut a, &mut b));

        handle.begin().unwrap();
        assert_eq!(handle.state(), BridgeState::Streaming);

        let report = handle.poll().unwrap();
        assert!(report.status.is_healthy());
        assert_eq!(report.pushed, LEN);
        assert!(report.frame_complete);

        let window = chip.window_bytes();
        assert_eq!(window.len(), LEN);
        assert!(window.chunks(2).all(|px| px == [0x1F, 0x00]));
        assert_eq!(chip.commits(), 1);

        // Nothing new to show
        let report = handle.poll().unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(chip.commits(), 1);
    }

    #[test]
    fn test_image_presents_drawn_slot() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut b = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Double(&mut a, &mut b),
        );
        handle.begin().unwrap();
        handle.poll().unwrap();
        chip.i2c.clear_fifo();

        let slot = handle.back_slot();
        handle.slot_mut(slot).unwrap().fill(0x5A);
        handle.image(slot, W, H).unwrap();
        assert_eq!(handle.frames().active_index(), slot.index());
        assert_eq!(handle.frames().role(slot), SlotRole::Primary);

        handle.poll().unwrap();
        assert_eq!(chip.window_bytes(), vec![0x5Au8; LEN]);

        let next = handle.back_slot();
        assert_ne!(next, slot);
        assert!(matches!(
            handle.image(next, 320, 240),
            Err(BridgeError::BufferSizeMismatch { .. })
        ));
        assert_eq!(handle.frames().active_index(), slot.index());
    }

    #[test]
    fn test_load_image_copies_and_presents() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut b = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Double(&mut a, &mut b),
        );
        handle.begin().unwrap();
        handle.poll().unwrap();
        chip.i2c.clear_fifo();

        let frame = vec![0xA5u8; LEN];
        handle.load_image(&frame, W, H).unwrap();
        assert_eq!(handle.frames().active_index(), 1);
        handle.poll().unwrap();
        assert_eq!(chip.window_bytes(), frame);

        assert!(matches!(
            handle.load_image(&frame, 320, 240),
            Err(BridgeError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_chunk_budget_spreads_push() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut config = HandleConfig::new(ModeId::Mode640x480At60);
        config.bridge.chunk_budget = Some(2400);
        let mut handle = handle(&chip, config, BufferSet::Single(&mut a));
        handle.begin().unwrap();

        let mut polls = 0;
        loop {
            polls += 1;
            if handle.poll().unwrap().frame_complete {
                break;
            }
        }
        // 614400 bytes in 128-byte chunks, 2400 chunks per poll
        assert_eq!(polls, 2);
        assert_eq!(chip.window_bytes().len(), LEN);
    }

    #[test]
    fn test_link_loss_is_reported_not_raised() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(&mut a),
        );
        handle.begin().unwrap();
        chip.set_hpd(false);

        let report = handle.poll().unwrap();
        assert!(!report.status.hpd());
        assert_eq!(report.pushed, 0);
        assert_eq!(handle.state(), BridgeState::Error(FailureReason::LinkLost));
        assert_eq!(handle.link_status(), Some(report.status));
    }

    #[test]
    fn test_end_after_failed_begin() {
        let chip = MockBridge::healthy();
        chip.i2c.fail_register(RX_P0_ADDR, FLASH_LOAD_STA);
        let mut a = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(&mut a),
        );

        assert!(handle.begin().is_err());
        assert!(matches!(handle.state(), BridgeState::Error(_)));
        handle.end().unwrap();
        assert_eq!(handle.state(), BridgeState::Stopped);
        assert!(!chip.power.output_level());
        assert!(matches!(
            handle.poll(),
            Err(BridgeError::InvalidState { op: "poll", .. })
        ));
    }

    #[test]
    fn test_push_failures_escalate_to_bus_fault() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(&mut a),
        );
        handle.begin().unwrap();
        chip.i2c.fail_register(RX_P2_ADDR, FRAME_WINDOW_DATA);

        // Status reads succeed, every push fails
        assert!(matches!(handle.poll(), Err(BridgeError::Bus(_))));
        assert!(matches!(handle.poll(), Err(BridgeError::Bus(_))));
        assert_eq!(handle.state(), BridgeState::Streaming);
        assert_eq!(handle.controller().consecutive_errors(), 2);

        assert!(matches!(handle.poll(), Err(BridgeError::Bus(_))));
        assert_eq!(handle.state(), BridgeState::Error(FailureReason::BusFault));
    }

    #[test]
    fn test_full_poll_clears_error_count() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Single(&mut a),
        );
        handle.begin().unwrap();
        chip.i2c.fail_register(RX_P2_ADDR, FRAME_WINDOW_DATA);
        assert!(handle.poll().is_err());
        assert_eq!(handle.controller().consecutive_errors(), 1);

        chip.i2c.clear_failures();
        assert!(handle.poll().unwrap().frame_complete);
        assert_eq!(handle.controller().consecutive_errors(), 0);
    }

    #[test]
    fn test_restart_keeps_presented_frame() {
        let chip = MockBridge::healthy();
        let mut a = vec![0u8; LEN];
        let mut b = vec![0u8; LEN];
        let mut handle = handle(
            &chip,
            HandleConfig::new(ModeId::Mode640x480At60),
            BufferSet::Double(&mut a, &mut b),
        );
        handle.begin().unwrap();
        handle.fill(0xF800);
        handle.present();
        handle.poll().unwrap();

        chip.set_hpd(false);
        handle.poll().unwrap();
        assert_eq!(handle.state(), BridgeState::Error(FailureReason::LinkLost));

        chip.set_hpd(true);
        handle.begin().unwrap();
        chip.i2c.clear_fifo();
        assert!(handle.poll().unwrap().frame_complete);

        let window = chip.window_bytes();
        assert_eq!(window.len(), LEN);
        assert!(window.chunks(2).all(|px| px == [0x00, 0xF8]));
    }
}
