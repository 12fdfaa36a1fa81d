//! EDID base block decoding
//!
//! Only what the bridge needs: identity, extension count and the preferred
//! detailed timing.

use super::registers::ONE_BLOCK_SIZE;
use crate::display::modes::DisplayTiming;
use core::fmt;

const HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const DESCRIPTOR_START: usize = 54;
const DESCRIPTOR_LEN: usize = 18;
const DESCRIPTOR_COUNT: usize = 4;

/// EDID decoding failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdidError {
    /// Fewer than 128 bytes
    Truncated,
    /// Fixed header pattern missing
    BadHeader,
    /// Block bytes do not sum to zero
    BadChecksum,
    /// No detailed timing descriptor in the base block
    NoTiming,
}

impl fmt::Display for EdidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdidError::Truncated => write!(f, "EDID truncated"),
            EdidError::BadHeader => write!(f, "EDID header invalid"),
            EdidError::BadChecksum => write!(f, "EDID checksum mismatch"),
            EdidError::NoTiming => write!(f, "EDID has no detailed timing"),
        }
    }
}

/// Decoded EDID base block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edid {
    /// Three-letter PNP manufacturer id
    pub manufacturer: [u8; 3],
    pub product_code: u16,
    pub version: u8,
    pub revision: u8,
    /// Number of extension blocks following the base block
    pub extensions: u8,
    /// First detailed timing descriptor
    pub preferred: DisplayTiming,
}

impl Edid {
    /// Manufacturer id as text
    pub fn manufacturer_str(&self) -> &str {
        core::str::from_utf8(&self.manufacturer).unwrap_or("???")
    }
}

/// Decode the base block at the start of `bytes`
pub fn decode(bytes: &[u8]) -> Result<Edid, EdidError> {
    let block = bytes.get(..ONE_BLOCK_SIZE).ok_or(EdidError::Truncated)?;
    if block[..8] != HEADER {
        return Err(EdidError::BadHeader);
    }
    let sum = block.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != 0 {
        return Err(EdidError::BadChecksum);
    }

    let preferred = block[DESCRIPTOR_START..DESCRIPTOR_START + DESCRIPTOR_LEN * DESCRIPTOR_COUNT]
        .chunks_exact(DESCRIPTOR_LEN)
        .find_map(parse_detailed_timing)
        .ok_or(EdidError::NoTiming)?;

    Ok(Edid {
        manufacturer: manufacturer_id(u16::from_be_bytes([block[8], block[9]])),
        product_code: u16::from_le_bytes([block[10], block[11]]),
        version: block[18],
        revision: block[19],
        extensions: block[126],
        preferred,
    })
}

fn manufacturer_id(raw: u16) -> [u8; 3] {
    let letter = |shift: u16| {
        let code = ((raw >> shift) & 0x1F) as u8;
        if (1..=26).contains(&code) {
            b'A' + code - 1
        } else {
            b'?'
        }
    };
    [letter(10), letter(5), letter(0)]
}

/// Parse one 18-byte descriptor, `None` for display descriptors
fn parse_detailed_timing(d: &[u8]) -> Option<DisplayTiming> {
    let clock_10khz = u16::from_le_bytes([d[0], d[1]]);
    if clock_10khz == 0 {
        return None;
    }

    let hactive = d[2] as u16 | ((d[4] as u16 & 0xF0) << 4);
    let hblank = d[3] as u16 | ((d[4] as u16 & 0x0F) << 8);
    let vactive = d[5] as u16 | ((d[7] as u16 & 0xF0) << 4);
    let vblank = d[6] as u16 | ((d[7] as u16 & 0x0F) << 8);
    let hsync_offset = d[8] as u16 | ((d[11] as u16 & 0xC0) << 2);
    let hsync_len = d[9] as u16 | ((d[11] as u16 & 0x30) << 4);
    let vsync_offset = (d[10] as u16 >> 4) | ((d[11] as u16 & 0x0C) << 2);
    let vsync_len = (d[10] as u16 & 0x0F) | ((d[11] as u16 & 0x03) << 4);
    let hborder = d[15] as u16;
    let vborder = d[16] as u16;

    Some(DisplayTiming {
        pixel_clock_khz: clock_10khz as u32 * 10,
        hactive,
        hfront_porch: hsync_offset.saturating_sub(hborder),
        hsync_len,
        hback_porch: hblank
            .saturating_sub(hsync_offset)
            .saturating_sub(hborder)
            .saturating_sub(hsync_len),
        vactive,
        vfront_porch: vsync_offset.saturating_sub(vborder),
        vsync_len,
        vback_porch: vblank
            .saturating_sub(vsync_offset)
            .saturating_sub(vsync_len)
            .saturating_sub(vborder),
    })
}
