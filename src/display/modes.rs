//! Video mode table
//!
//! Static, read-only mapping from [`ModeId`] to timing. Adding a mode means
//! adding a table entry.

use crate::devices::anx7625::error::{BridgeError, BridgeResult};
use core::fmt;
use core::str::FromStr;

/// Bytes per RGB565 pixel
pub const BYTES_PER_PIXEL: usize = 2;

/// Pack 8-bit channels into an RGB565 value
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Mode identifier
///
/// The raw identifiers 0..=6 are stable. `Auto` takes the timing from the
/// sink's EDID at `begin()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeId {
    Mode640x480At60,
    Mode720x480At60,
    Mode800x600At59,
    Mode1024x768At60,
    Mode1280x768At60,
    Mode1280x720At60,
    Mode1920x1080At60,
    Auto,
}

impl ModeId {
    /// Every identifier with a raw value
    pub const ALL: [ModeId; 7] = [
        ModeId::Mode640x480At60,
        ModeId::Mode720x480At60,
        ModeId::Mode800x600At59,
        ModeId::Mode1024x768At60,
        ModeId::Mode1280x768At60,
        ModeId::Mode1280x720At60,
        ModeId::Mode1920x1080At60,
    ];

    /// Identifier for a raw value
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Raw value, `None` for `Auto`
    pub fn raw(self) -> Option<u8> {
        Self::ALL.iter().position(|&id| id == self).map(|i| i as u8)
    }

    /// Canonical name, e.g. `640x480@60`
    pub const fn name(self) -> &'static str {
        match self {
            ModeId::Mode640x480At60 => "640x480@60",
            ModeId::Mode720x480At60 => "720x480@60",
            ModeId::Mode800x600At59 => "800x600@59",
            ModeId::Mode1024x768At60 => "1024x768@60",
            ModeId::Mode1280x768At60 => "1280x768@60",
            ModeId::Mode1280x720At60 => "1280x720@60",
            ModeId::Mode1920x1080At60 => "1920x1080@60",
            ModeId::Auto => "auto",
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown mode name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseModeError;

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown video mode")
    }
}

impl FromStr for ModeId {
    type Err = ParseModeError;

    /// Accepts `640x480@60`, `640x480@60Hz` and `auto`, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ModeId::Auto);
        }
        let name = match s.len().checked_sub(2) {
            Some(cut) if s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case("hz") => {
                &s[..cut]
            }
            _ => s,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or(ParseModeError)
    }
}

/// Raw video timing
///
/// Porches and sync widths are in pixels (horizontal) or lines (vertical).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayTiming {
    pub pixel_clock_khz: u32,
    pub hactive: u16,
    pub hfront_porch: u16,
    pub hsync_len: u16,
    pub hback_porch: u16,
    pub vactive: u16,
    pub vfront_porch: u16,
    pub vsync_len: u16,
    pub vback_porch: u16,
}

impl DisplayTiming {
    pub const fn htotal(&self) -> u16 {
        self.hactive + self.hfront_porch + self.hback_porch + self.hsync_len
    }

    pub const fn vtotal(&self) -> u16 {
        self.vactive + self.vfront_porch + self.vback_porch + self.vsync_len
    }

    pub const fn pixel_clock_hz(&self) -> u32 {
        self.pixel_clock_khz * 1000
    }

    /// Refresh rate implied by the clock and totals, rounded down
    pub fn refresh_hz(&self) -> u32 {
        let frame = self.htotal() as u32 * self.vtotal() as u32;
        if frame == 0 {
            return 0;
        }
        self.pixel_clock_hz() / frame
    }

    /// Size in bytes of one RGB565 frame
    pub const fn frame_bytes(&self) -> usize {
        self.hactive as usize * self.vactive as usize * BYTES_PER_PIXEL
    }
}

/// Supported video mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VideoMode {
    pub id: ModeId,
    pub width: u16,
    pub height: u16,
    /// Nominal refresh rate
    pub refresh_hz: u8,
    pub timing: DisplayTiming,
}

const fn mode(
    id: ModeId,
    refresh_hz: u8,
    pixel_clock_khz: u32,
    h: [u16; 4],
    v: [u16; 4],
) -> VideoMode {
    VideoMode {
        id,
        width: h[0],
        height: v[0],
        refresh_hz,
        timing: DisplayTiming {
            pixel_clock_khz,
            hactive: h[0],
            hback_porch: h[1],
            hfront_porch: h[2],
            hsync_len: h[3],
            vactive: v[0],
            vback_porch: v[1],
            vfront_porch: v[2],
            vsync_len: v[3],
        },
    }
}

/// Mode table: `[active, back porch, front porch, sync]` per axis
pub static MODES: [VideoMode; 6] = [
    mode(ModeId::Mode640x480At60, 60, 29_400, [640, 160, 16, 96], [480, 45, 10, 2]),
    mode(ModeId::Mode720x480At60, 60, 27_800, [720, 60, 16, 62], [480, 45, 9, 6]),
    mode(ModeId::Mode800x600At59, 59, 37_800, [800, 104, 24, 80], [600, 17, 3, 4]),
    mode(ModeId::Mode1024x768At60, 60, 57_800, [1024, 80, 24, 68], [768, 29, 3, 6]),
    mode(ModeId::Mode1280x768At60, 60, 68_300, [1280, 120, 32, 20], [768, 10, 45, 12]),
    mode(ModeId::Mode1280x720At60, 60, 74_300, [1280, 370, 110, 40], [720, 30, 5, 20]),
];

/// Look up the timing for `id`
///
/// # Errors
///
/// `UnsupportedMode` for identifiers without an entry, including `Auto`,
/// whose timing only exists once the EDID has been read.
pub fn lookup(id: ModeId) -> BridgeResult<&'static VideoMode> {
    MODES
        .iter()
        .find(|m| m.id == id)
        .ok_or(BridgeError::UnsupportedMode(id))
}
