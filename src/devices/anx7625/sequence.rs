//! Register step lists
//!
//! Every state transition of the bridge is expressed as an ordered list of
//! steps, built up front and then executed. The lists can be inspected in
//! tests without touching a bus.

use super::bus::{BridgeBus, ControlLine};
use super::error::{BridgeError, BridgeResult};
use super::pll::PllConfig;
use super::registers::*;
use crate::display::modes::DisplayTiming;
use heapless::Vec;

/// Longest step list the driver builds
pub const MAX_STEPS: usize = 64;

/// One bus action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Write a register
    Write { addr: u8, offset: u8, value: u8 },
    /// Read-modify-write: clear bits, then set bits
    Update {
        addr: u8,
        offset: u8,
        clear: u8,
        set: u8,
    },
    /// Settle delay
    Delay { ms: u32 },
    /// Drive a control line
    Line { line: ControlLine, high: bool },
    /// Stop driving a control line
    Release { line: ControlLine },
}

impl Step {
    fn apply<B: BridgeBus>(&self, bus: &mut B) -> crate::platform::Result<()> {
        match *self {
            Step::Write {
                addr,
                offset,
                value,
            } => bus.write_reg(addr, offset, value),
            Step::Update {
                addr,
                offset,
                clear,
                set,
            } => bus.update_reg(addr, offset, clear, set).map(|_| ()),
            Step::Delay { ms } => bus.delay_ms(ms),
            Step::Line { line, high } => bus.set_line(line, high),
            Step::Release { line } => bus.release_line(line),
        }
    }
}

/// Ordered step list
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    steps: Vec<Step, MAX_STEPS>,
    overflow: bool,
}

impl Sequence {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, step: Step) -> &mut Self {
        if self.steps.push(step).is_err() {
            self.overflow = true;
        }
        self
    }

    pub fn write(&mut self, addr: u8, offset: u8, value: u8) -> &mut Self {
        self.push(Step::Write {
            addr,
            offset,
            value,
        })
    }

    pub fn update(&mut self, addr: u8, offset: u8, clear: u8, set: u8) -> &mut Self {
        self.push(Step::Update {
            addr,
            offset,
            clear,
            set,
        })
    }

    pub fn delay(&mut self, ms: u32) -> &mut Self {
        self.push(Step::Delay { ms })
    }

    pub fn line(&mut self, line: ControlLine, high: bool) -> &mut Self {
        self.push(Step::Line { line, high })
    }

    pub fn release(&mut self, line: ControlLine) -> &mut Self {
        self.push(Step::Release { line })
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Execute in order, stopping at the first failure
    ///
    /// A list that overflowed while being built is rejected before any I/O.
    pub fn run<B: BridgeBus>(&self, bus: &mut B) -> BridgeResult<()> {
        if self.overflow {
            return Err(BridgeError::InvalidConfig("step list overflow"));
        }
        for step in self.steps.iter() {
            step.apply(bus)?;
        }
        Ok(())
    }

    /// Execute every step, logging failures instead of stopping
    ///
    /// Returns the number of failed steps.
    pub fn run_best_effort<B: BridgeBus>(&self, bus: &mut B) -> usize {
        let mut failures = 0;
        for step in self.steps.iter() {
            if let Err(e) = step.apply(bus) {
                crate::log_warn!("Step {:?} failed: {:?}", step, e);
                failures += 1;
            }
        }
        failures
    }
}

/// Power-up: enable power, then release reset
pub fn power_up(settle_ms: u32) -> Sequence {
    let mut seq = Sequence::new();
    seq.line(ControlLine::Power, true)
        .delay(settle_ms)
        .line(ControlLine::Reset, true)
        .delay(settle_ms);
    seq
}

/// Power-down: reverse of power-up, for the lines currently driven
///
/// Lines already low are left alone; OTG goes back to being an input.
pub fn power_down<B: BridgeBus>(bus: &B) -> Sequence {
    let mut seq = Sequence::new();
    if bus.line_level(ControlLine::Reset) == Some(true) {
        seq.line(ControlLine::Reset, false);
    }
    if bus.line_level(ControlLine::Power) == Some(true) {
        seq.line(ControlLine::Power, false);
    }
    if bus.line_level(ControlLine::Otg).is_some() {
        seq.release(ControlLine::Otg);
    }
    seq
}

/// DisplayPort start after hot-plug: HDCP off, try-auth, DRM interrupt
pub fn start_dp() -> Sequence {
    let mut seq = Sequence::new();
    seq.update(RX_P1_ADDR, HDCP_CTRL, !HDCP_DISABLE_MASK, 0)
        .update(RX_P1_ADDR, DP_AUTH_CTRL, 0, DP_TRY_AUTH)
        .update(RX_P1_ADDR, DRM_INT_CTRL, 0, DRM_INT_EN);
    seq
}

/// Receiver enable and unmute
pub fn enable_mipi_rx() -> Sequence {
    let mut seq = Sequence::new();
    seq.update(RX_P0_ADDR, AP_AV_STATUS, 0, AP_MIPI_RX_EN)
        .update(RX_P0_ADDR, AP_AV_STATUS, AP_MIPI_MUTE, 0);
    seq
}

/// Full MIPI-DSI video configuration for `timing`
pub fn dsi_config(timing: &DisplayTiming, pll: &PllConfig) -> Sequence {
    let t = timing;
    let htotal = t.htotal();
    let pixel_clock_mhz = (t.pixel_clock_khz / 1000) as u16;
    let phy_control = (1 << MIPI_CLK_RT_MANUAL_PD_EN) | (1 << MIPI_CLK_HS_MANUAL_PD_EN);
    let mn_ready = MIPI_M_NUM_READY | MIPI_N_NUM_READY;
    let fref = REF_CLK_27000KHZ << MIPI_FREF_D_IND;

    let mut seq = Sequence::new();
    seq
        // DSC off
        .update(RX_P0_ADDR, R_DSC_CTRL_0, DSC_EN, 0)
        // Lane 3 P/N swap
        .update(RX_P1_ADDR, MIPI_SWAP, 0, 1 << MIPI_SWAP_CH3)
        // DSI clock
        .write(RX_P1_ADDR, MIPI_PHY_CONTROL_3, phy_control)
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_18, 0, SELECT_DSI << MIPI_DPI_SELECT)
        .write(RX_P0_ADDR, PIXEL_CLOCK_L, lo(pixel_clock_mhz))
        .write(RX_P0_ADDR, PIXEL_CLOCK_H, hi(pixel_clock_mhz))
        // Lane count
        .update(RX_P1_ADDR, MIPI_LANE_CTRL_0, 0x03, 0x01)
        // Horizontal timing
        .write(RX_P2_ADDR, HORIZONTAL_TOTAL_PIXELS_L, lo(htotal))
        .write(RX_P2_ADDR, HORIZONTAL_TOTAL_PIXELS_H, hi(htotal))
        .write(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_L, lo(t.hactive))
        .write(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_H, hi(t.hactive))
        .write(RX_P2_ADDR, HORIZONTAL_FRONT_PORCH_L, lo(t.hfront_porch))
        .write(RX_P2_ADDR, HORIZONTAL_FRONT_PORCH_H, hi(t.hfront_porch))
        .write(RX_P2_ADDR, HORIZONTAL_SYNC_WIDTH_L, lo(t.hsync_len))
        .write(RX_P2_ADDR, HORIZONTAL_SYNC_WIDTH_H, hi(t.hsync_len))
        .write(RX_P2_ADDR, HORIZONTAL_BACK_PORCH_L, lo(t.hback_porch))
        .write(RX_P2_ADDR, HORIZONTAL_BACK_PORCH_H, hi(t.hback_porch))
        // Vertical timing
        .write(RX_P2_ADDR, ACTIVE_LINES_L, lo(t.vactive))
        .write(RX_P2_ADDR, ACTIVE_LINES_H, hi(t.vactive))
        .write(RX_P2_ADDR, VERTICAL_FRONT_PORCH, lo(t.vfront_porch))
        .write(RX_P2_ADDR, VERTICAL_SYNC_WIDTH, lo(t.vsync_len))
        .write(RX_P2_ADDR, VERTICAL_BACK_PORCH, lo(t.vback_porch))
        // PLL M/N
        .write(RX_P1_ADDR, MIPI_PLL_M_NUM_23_16, (pll.m >> 16) as u8)
        .write(RX_P1_ADDR, MIPI_PLL_M_NUM_15_8, (pll.m >> 8) as u8)
        .write(RX_P1_ADDR, MIPI_PLL_M_NUM_7_0, pll.m as u8)
        .write(RX_P1_ADDR, MIPI_PLL_N_NUM_23_16, (pll.n >> 16) as u8)
        .write(RX_P1_ADDR, MIPI_PLL_N_NUM_15_8, (pll.n >> 8) as u8)
        .write(RX_P1_ADDR, MIPI_PLL_N_NUM_7_0, pll.n as u8)
        .write(RX_P1_ADDR, MIPI_DIGITAL_ADJ_1, 0x37)
        // ODFC PLL: 27 MHz reference, post divider, VCO tune patch, reset pulse
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_16, fref, fref)
        .update(
            RX_P1_ADDR,
            MIPI_DIGITAL_PLL_8,
            0xF0,
            pll.post_divider.saturating_sub(1) << 4,
        )
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_7, MIPI_PLL_VCO_TUNE_REG_VAL, 0)
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_7, MIPI_PLL_RESET_N, 0)
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_7, 0, MIPI_PLL_RESET_N)
        // Toggle M/N ready
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_6, mn_ready, 0)
        .delay(1)
        .update(RX_P1_ADDR, MIPI_DIGITAL_PLL_6, 0, mn_ready)
        .write(RX_P1_ADDR, MIPI_VIDEO_STABLE_CNT, 0x02)
        // MIPI RX power on
        .write(RX_P1_ADDR, MIPI_LANE_CTRL_10, 0x00)
        .write(RX_P1_ADDR, MIPI_LANE_CTRL_10, 0x80);

    for step in enable_mipi_rx().steps() {
        seq.push(*step);
    }
    seq
}

fn lo(value: u16) -> u8 {
    (value & 0xFF) as u8
}

fn hi(value: u16) -> u8 {
    (value >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::anx7625::bus::I2cBridgeBus;
    use crate::devices::anx7625::pll::calculate_m_n;
    use crate::display::modes::{lookup, ModeId};
    use crate::platform::mock::{MockGpio, MockI2c, MockTimer, PinEvent};
    use crate::platform::traits::TimerInterface;

    fn bus() -> (
        I2cBridgeBus<MockI2c, MockGpio, MockGpio, MockGpio, MockTimer>,
        MockI2c,
        MockGpio,
        MockTimer,
    ) {
        let i2c = MockI2c::default();
        let power = MockGpio::new_output();
        let timer = MockTimer::new();
        let bus = I2cBridgeBus::new(
            i2c.clone(),
            power.clone(),
            MockGpio::new_output(),
            MockGpio::new_output(),
            timer.clone(),
        )
        .unwrap();
        (bus, i2c, power, timer)
    }

    #[test]
    fn test_power_up_order() {
        let seq = power_up(10);
        assert_eq!(
            seq.steps(),
            &[
                Step::Line {
                    line: ControlLine::Power,
                    high: true
                },
                Step::Delay { ms: 10 },
                Step::Line {
                    line: ControlLine::Reset,
                    high: true
                },
                Step::Delay { ms: 10 },
            ]
        );
    }

    #[test]
    fn test_power_down_skips_idle_lines() {
        let (mut bus, _, power, _) = bus();
        assert!(power_down(&bus).steps().is_empty());

        power_up(10).run(&mut bus).unwrap();
        bus.set_line(ControlLine::Otg, true).unwrap();
        let seq = power_down(&bus);
        assert_eq!(
            seq.steps(),
            &[
                Step::Line {
                    line: ControlLine::Reset,
                    high: false
                },
                Step::Line {
                    line: ControlLine::Power,
                    high: false
                },
                Step::Release {
                    line: ControlLine::Otg
                },
            ]
        );

        seq.run(&mut bus).unwrap();
        assert_eq!(power.history().last(), Some(&PinEvent::Low));
        assert!(power_down(&bus).steps().is_empty());
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let (mut bus, i2c, _, _) = bus();
        i2c.fail_register(RX_P1_ADDR, MIPI_SWAP);

        let mut seq = Sequence::new();
        seq.write(RX_P0_ADDR, 0x10, 0x01)
            .update(RX_P1_ADDR, MIPI_SWAP, 0, 0x80)
            .write(RX_P0_ADDR, 0x11, 0x02);

        assert!(matches!(seq.run(&mut bus), Err(BridgeError::Bus(_))));
        assert_eq!(i2c.register(RX_P0_ADDR, 0x10), 0x01);
        assert_eq!(i2c.register(RX_P0_ADDR, 0x11), 0x00);
    }

    #[test]
    fn test_best_effort_continues() {
        let (mut bus, i2c, _, _) = bus();
        i2c.fail_register(RX_P0_ADDR, 0x10);

        let mut seq = Sequence::new();
        seq.write(RX_P0_ADDR, 0x10, 0x01).write(RX_P0_ADDR, 0x11, 0x02);
        assert_eq!(seq.run_best_effort(&mut bus), 1);
        assert_eq!(i2c.register(RX_P0_ADDR, 0x11), 0x02);
    }

    #[test]
    fn test_overflow_rejected_without_io() {
        let (mut bus, i2c, _, _) = bus();
        let mut seq = Sequence::new();
        for _ in 0..=MAX_STEPS {
            seq.write(RX_P0_ADDR, 0x10, 0x00);
        }
        assert_eq!(
            seq.run(&mut bus),
            Err(BridgeError::InvalidConfig("step list overflow"))
        );
        assert_eq!(i2c.transaction_count(), 0);
    }

    #[test]
    fn test_dsi_config_programs_timing_and_pll() {
        let (mut bus, i2c, _, timer) = bus();
        let mode = lookup(ModeId::Mode720x480At60).unwrap();
        let pll = calculate_m_n(mode.timing.pixel_clock_hz()).unwrap();

        dsi_config(&mode.timing, &pll).run(&mut bus).unwrap();

        // htotal = 720 + 16 + 60 + 62 = 858
        assert_eq!(i2c.register(RX_P2_ADDR, HORIZONTAL_TOTAL_PIXELS_L), 0x5A);
        assert_eq!(i2c.register(RX_P2_ADDR, HORIZONTAL_TOTAL_PIXELS_H), 0x03);
        assert_eq!(i2c.register(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_L), 0xD0);
        assert_eq!(i2c.register(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_H), 0x02);
        assert_eq!(i2c.register(RX_P2_ADDR, ACTIVE_LINES_L), 0xE0);
        assert_eq!(i2c.register(RX_P2_ADDR, ACTIVE_LINES_H), 0x01);
        assert_eq!(i2c.register(RX_P2_ADDR, VERTICAL_SYNC_WIDTH), 6);
        assert_eq!(i2c.register(RX_P0_ADDR, PIXEL_CLOCK_L), 27);

        // m = 9_109_504 = 0x8B0000, n = 737_280 = 0x0B4000
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_PLL_M_NUM_23_16), 0x8B);
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_PLL_M_NUM_15_8), 0x00);
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_PLL_N_NUM_23_16), 0x0B);
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_PLL_N_NUM_15_8), 0x40);
        // post divider 12 is programmed as 11
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_8), 0xB0);
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_7), MIPI_PLL_RESET_N);
        assert_eq!(
            i2c.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_6),
            MIPI_M_NUM_READY | MIPI_N_NUM_READY
        );
        assert_eq!(i2c.register(RX_P1_ADDR, MIPI_LANE_CTRL_10), 0x80);
        assert_eq!(i2c.register(RX_P0_ADDR, AP_AV_STATUS), AP_MIPI_RX_EN);
        assert_eq!(timer.now_ms(), 1);
    }
}
