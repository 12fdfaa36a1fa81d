//! Link status decoding

use bitflags::bitflags;

bitflags! {
    /// Decoded `SYSTEM_STSTUS` register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SystemStatus: u8 {
        /// VCONN supplied to the cable
        const VCONN_ON = 1 << 2;
        /// Bridge sources VBUS on the USB-C port
        const VBUS_PROVIDER = 1 << 3;
        /// Data role is downstream-facing
        const DATA_ROLE_DFP = 1 << 5;
        /// DisplayPort hot-plug detect
        const HPD = 1 << 7;
    }
}

bitflags! {
    /// Video path error flags derived from `AP_AV_STATUS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LinkErrors: u8 {
        /// MIPI receiver muted
        const MIPI_MUTED = 1 << 0;
        /// MIPI receiver not enabled
        const MIPI_RX_DISABLED = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SystemStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SystemStatus({=u8:#x})", self.bits())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkErrors {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "LinkErrors({=u8:#x})", self.bits())
    }
}

/// Snapshot of the link taken by one poll
///
/// Built fresh on every poll and never carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus {
    /// Raw system status flags
    pub system: SystemStatus,
    /// Video path error flags
    pub errors: LinkErrors,
    /// Result of the last link training
    pub trained: bool,
}

impl LinkStatus {
    /// Build a status from the raw `SYSTEM_STSTUS` and `AP_AV_STATUS` bytes
    pub fn from_registers(system: u8, av_status: u8, trained: bool) -> Self {
        use super::registers::{AP_MIPI_MUTE, AP_MIPI_RX_EN};

        let mut errors = LinkErrors::empty();
        if av_status & AP_MIPI_MUTE != 0 {
            errors |= LinkErrors::MIPI_MUTED;
        }
        if av_status & AP_MIPI_RX_EN == 0 {
            errors |= LinkErrors::MIPI_RX_DISABLED;
        }
        Self {
            system: SystemStatus::from_bits_truncate(system),
            errors,
            trained,
        }
    }

    /// Downstream display connected
    pub fn hpd(&self) -> bool {
        self.system.contains(SystemStatus::HPD)
    }

    /// Connected, trained and free of video path errors
    pub fn is_healthy(&self) -> bool {
        self.hpd() && self.trained && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_healthy_status() {
        let status = LinkStatus::from_registers(0x80 | 0x08, 0x20, true);
        assert!(status.hpd());
        assert!(status.system.contains(SystemStatus::VBUS_PROVIDER));
        assert!(status.is_healthy());
    }

    #[test]
    fn test_muted_receiver_is_unhealthy() {
        let status = LinkStatus::from_registers(0x80, 0x30, true);
        assert_eq!(status.errors, LinkErrors::MIPI_MUTED);
        assert!(!status.is_healthy());
    }

    #[test]
    fn test_disabled_receiver_and_no_hpd() {
        let status = LinkStatus::from_registers(0x00, 0x00, false);
        assert!(!status.hpd());
        assert!(status.errors.contains(LinkErrors::MIPI_RX_DISABLED));
        assert!(!status.is_healthy());
    }

    #[test]
    fn test_unknown_bits_are_dropped() {
        let status = LinkStatus::from_registers(0xFF, 0x20, true);
        assert_eq!(status.system.bits(), 0xAC);
    }
}
