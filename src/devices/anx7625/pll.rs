//! ODFC PLL M/N computation
//!
//! The bridge derives the pixel clock from the 27 MHz crystal as
//! `pixel_clock = XTAL / post_divider * M / N`, with 24-bit M and N.

/// Crystal frequency
pub const XTAL_FRQ: u32 = 27_000_000;

/// Preferred PLL output range
pub const PLL_OUT_FREQ_MIN: u32 = 520_000_000;
pub const PLL_OUT_FREQ_MAX: u32 = 730_000_000;

/// Absolute PLL output range
pub const PLL_OUT_FREQ_ABS_MIN: u32 = 300_000_000;
pub const PLL_OUT_FREQ_ABS_MAX: u32 = 800_000_000;

pub const POST_DIVIDER_MIN: u32 = 1;
pub const POST_DIVIDER_MAX: u32 = 16;

pub const MAX_UNSIGNED_24BIT: u64 = 16_777_215;

/// PLL programming values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub m: u32,
    pub n: u32,
    pub post_divider: u8,
}

/// Compute M, N and post divider for `pixel_clock` in Hz
///
/// Returns `None` when no divider keeps the PLL inside its absolute range.
pub fn calculate_m_n(pixel_clock: u32) -> Option<PllConfig> {
    if pixel_clock > PLL_OUT_FREQ_ABS_MAX / POST_DIVIDER_MIN {
        crate::log_error!(
            "pixel clock {} above {}",
            pixel_clock,
            PLL_OUT_FREQ_ABS_MAX / POST_DIVIDER_MIN
        );
        return None;
    }
    if pixel_clock < PLL_OUT_FREQ_ABS_MIN / POST_DIVIDER_MAX {
        crate::log_error!(
            "pixel clock {} below {}",
            pixel_clock,
            PLL_OUT_FREQ_ABS_MIN / POST_DIVIDER_MAX
        );
        return None;
    }

    let mut post_divider = smallest_divider(pixel_clock, PLL_OUT_FREQ_MIN);
    if post_divider > POST_DIVIDER_MAX {
        post_divider = smallest_divider(pixel_clock, PLL_OUT_FREQ_ABS_MIN);
        if post_divider > POST_DIVIDER_MAX {
            crate::log_error!("no post divider for pixel clock {}", pixel_clock);
            return None;
        }
    }

    // 27 MHz is not divisible by 7, 11, 13 or 14
    post_divider = match post_divider {
        7 => 8,
        11 => 12,
        13 | 14 => 15,
        d => d,
    };

    if pixel_clock as u64 * post_divider as u64 > PLL_OUT_FREQ_ABS_MAX as u64 {
        crate::log_info!(
            "PLL output {} above maximum {}",
            pixel_clock as u64 * post_divider as u64,
            PLL_OUT_FREQ_ABS_MAX
        );
        return None;
    }

    let (m, n) = reduce_fraction(pixel_clock as u64, (XTAL_FRQ / post_divider) as u64);
    Some(PllConfig {
        m: m as u32,
        n: n as u32,
        post_divider: post_divider as u8,
    })
}

/// First divider with `pixel_clock >= floor / divider`
fn smallest_divider(pixel_clock: u32, floor: u32) -> u32 {
    let mut divider = 1;
    while pixel_clock < floor / divider {
        divider += 1;
    }
    divider
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Reduce `a/b` to fit 24 bits, then scale up for output accuracy
fn reduce_fraction(a: u64, b: u64) -> (u64, u64) {
    let g = gcd(a, b).max(1);
    let (old_a, old_b) = (a / g, b / g);
    let (mut a, mut b) = (old_a, old_b);

    let mut denom = 1;
    while a > MAX_UNSIGNED_24BIT || b > MAX_UNSIGNED_24BIT {
        denom += 1;
        a = old_a / denom;
        b = old_b / denom;
    }

    while (a << 1) < MAX_UNSIGNED_24BIT && (b << 1) < MAX_UNSIGNED_24BIT {
        a <<= 1;
        b <<= 1;
    }
    (a, b)
}
