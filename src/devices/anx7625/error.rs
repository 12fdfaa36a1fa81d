//! Bridge driver errors

use super::controller::BridgeState;
use crate::display::modes::ModeId;
use crate::platform::PlatformError;
use core::fmt;

/// Why the bridge entered its terminal `Error` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureReason {
    /// A bus transaction failed during a register sequence
    Bus,
    /// OCM firmware never reported a loaded image
    FirmwareNotReady,
    /// No hot-plug event before the timeout
    HpdTimeout,
    /// Video path did not come up after all training attempts
    LinkTraining,
    /// Sink EDID missing, malformed or failing its checksum
    EdidInvalid,
    /// Sink preferred timing does not match the bound buffers
    EdidMismatch,
    /// No PLL configuration reaches the pixel clock
    PllOutOfRange,
    /// Hot-plug detect dropped while streaming
    LinkLost,
    /// Consecutive poll cycles failed on the bus while streaming
    BusFault,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Bus => "bus transaction failed",
            FailureReason::FirmwareNotReady => "firmware not ready",
            FailureReason::HpdTimeout => "hot-plug detect timeout",
            FailureReason::LinkTraining => "link training failed",
            FailureReason::EdidInvalid => "invalid EDID",
            FailureReason::EdidMismatch => "EDID timing does not match buffers",
            FailureReason::PllOutOfRange => "pixel clock out of PLL range",
            FailureReason::LinkLost => "link lost",
            FailureReason::BusFault => "repeated bus errors",
        };
        f.write_str(text)
    }
}

/// Driver-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    /// Transport failure, never retried by the transport itself
    Bus(PlatformError),
    /// Mode identifier has no timing entry
    UnsupportedMode(ModeId),
    /// Buffer length differs from `width * height * 2`
    BufferSizeMismatch { expected: usize, actual: usize },
    /// Operation not allowed in the current lifecycle state
    InvalidState {
        op: &'static str,
        state: BridgeState,
    },
    /// Bring-up failed; the bridge is in `Error(reason)`
    Failed(FailureReason),
    /// Configuration rejected at construction
    InvalidConfig(&'static str),
}

impl From<PlatformError> for BridgeError {
    fn from(err: PlatformError) -> Self {
        BridgeError::Bus(err)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Bus(e) => write!(f, "bus error: {}", e),
            BridgeError::UnsupportedMode(id) => write!(f, "unsupported mode: {}", id),
            BridgeError::BufferSizeMismatch { expected, actual } => write!(
                f,
                "buffer size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            BridgeError::InvalidState { op, state } => {
                write!(f, "{} not allowed in state {:?}", op, state)
            }
            BridgeError::Failed(reason) => write!(f, "bridge failed: {}", reason),
            BridgeError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = core::result::Result<T, BridgeError>;
