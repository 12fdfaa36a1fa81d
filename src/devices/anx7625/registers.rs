//! ANX7625 Register Definitions
//!
//! Slave addresses are 7-bit. Offsets are grouped by the slave that owns them.

#![allow(dead_code)]

// ============================================================================
// Slave addresses
// ============================================================================

/// Type-C port controller interface
pub const TCPC_INTERFACE_ADDR: u8 = 0x2C;

/// DisplayPort transmitter pages
pub const TX_P0_ADDR: u8 = 0x38;
pub const TX_P1_ADDR: u8 = 0x3D;
pub const TX_P2_ADDR: u8 = 0x39;

/// MIPI receiver pages
pub const RX_P0_ADDR: u8 = 0x3F;
pub const RX_P1_ADDR: u8 = 0x42;
pub const RX_P2_ADDR: u8 = 0x2A;

// ============================================================================
// Reserved offsets used by the slave-switch access workaround
// ============================================================================

pub const RSVD_00_ADDR: u8 = 0x00;
pub const RSVD_D1_ADDR: u8 = 0xD1;
pub const RSVD_60_ADDR: u8 = 0x60;
pub const RSVD_39_ADDR: u8 = 0x39;
pub const RSVD_7F_ADDR: u8 = 0x7F;

/// Reserved offset to touch before talking to `addr` after another slave
pub const fn reserved_offset(addr: u8) -> u8 {
    match addr {
        TCPC_INTERFACE_ADDR => RSVD_00_ADDR,
        TX_P0_ADDR => RSVD_D1_ADDR,
        TX_P1_ADDR => RSVD_60_ADDR,
        RX_P0_ADDR => RSVD_39_ADDR,
        RX_P1_ADDR => RSVD_7F_ADDR,
        _ => RSVD_00_ADDR,
    }
}

// ============================================================================
// RX_P0: OCM firmware, AUX channel and AV status
// ============================================================================

/// Flash load status, bit 7 set once the OCM firmware is loaded
pub const FLASH_LOAD_STA: u8 = 0x05;
pub const FLASH_LOAD_STA_CHK: u8 = 1 << 7;

pub const AP_AUX_COMMAND: u8 = 0x10;
pub const AP_AUX_ADDR_7_0: u8 = 0x11;
pub const AP_AUX_ADDR_15_8: u8 = 0x12;
pub const AP_AUX_ADDR_19_16: u8 = 0x13;
pub const AP_AUX_BUFF_START: u8 = 0x15;

pub const AP_AUX_CTRL_STATUS: u8 = 0x22;
pub const AP_AUX_CTRL_OP_EN: u8 = 0x10;
pub const AP_AUX_CTRL_ADDRONLY: u8 = 0x20;
/// Low nibble of the AUX status holds the reply error code
pub const AP_AUX_CTRL_ERROR_MASK: u8 = 0x0F;

/// Pixel clock in MHz
pub const PIXEL_CLOCK_L: u8 = 0x25;
pub const PIXEL_CLOCK_H: u8 = 0x26;

pub const AP_AV_STATUS: u8 = 0x28;
pub const AP_MIPI_MUTE: u8 = 1 << 4;
pub const AP_MIPI_RX_EN: u8 = 1 << 5;

pub const OCM_FW_VERSION: u8 = 0x31;
pub const OCM_FW_REVERSION: u8 = 0x32;

/// Crystal selection
pub const XTAL_FRQ_SEL: u8 = 0x3F;
pub const XTAL_FRQ_27M: u8 = 4 << 5;

pub const R_DSC_CTRL_0: u8 = 0x40;
pub const DSC_EN: u8 = 0x01;

/// System status (VCONN, VBUS role, data role, HPD)
pub const SYSTEM_STSTUS: u8 = 0x45;

// ============================================================================
// RX_P1: MIPI PHY and ODFC PLL
// ============================================================================

pub const MIPI_PHY_CONTROL_3: u8 = 0x03;
pub const MIPI_HS_PWD_CLK: u8 = 7;
pub const MIPI_HS_RT_CLK: u8 = 6;
pub const MIPI_PD_CLK: u8 = 5;
pub const MIPI_CLK_RT_MANUAL_PD_EN: u8 = 4;
pub const MIPI_CLK_HS_MANUAL_PD_EN: u8 = 3;
pub const MIPI_CLK_DET_DET_BYPASS: u8 = 2;
pub const MIPI_CLK_MISS_CTRL: u8 = 1;
pub const MIPI_PD_LPTX_CH_MANUAL_PD_EN: u8 = 0;

pub const MIPI_LANE_CTRL_0: u8 = 0x05;
pub const MIPI_VIDEO_STABLE_CNT: u8 = 0x0A;
pub const MIPI_LANE_CTRL_10: u8 = 0x0F;
pub const MIPI_DIGITAL_ADJ_1: u8 = 0x1B;

pub const MIPI_PLL_M_NUM_23_16: u8 = 0x1E;
pub const MIPI_PLL_M_NUM_15_8: u8 = 0x1F;
pub const MIPI_PLL_M_NUM_7_0: u8 = 0x20;
pub const MIPI_PLL_N_NUM_23_16: u8 = 0x21;
pub const MIPI_PLL_N_NUM_15_8: u8 = 0x22;
pub const MIPI_PLL_N_NUM_7_0: u8 = 0x23;

pub const MIPI_DIGITAL_PLL_6: u8 = 0x2A;
pub const MIPI_M_NUM_READY: u8 = 0x10;
pub const MIPI_N_NUM_READY: u8 = 0x08;

pub const MIPI_DIGITAL_PLL_7: u8 = 0x2B;
pub const MIPI_PLL_VCO_TUNE_REG_VAL: u8 = 0x30;
pub const MIPI_PLL_RESET_N: u8 = 0x02;

pub const MIPI_DIGITAL_PLL_8: u8 = 0x33;

pub const MIPI_DIGITAL_PLL_16: u8 = 0x3B;
pub const MIPI_FREF_D_IND: u8 = 4;
pub const REF_CLK_27000KHZ: u8 = 1;

pub const MIPI_DIGITAL_PLL_18: u8 = 0x3D;
pub const MIPI_DPI_SELECT: u8 = 5;
pub const SELECT_DSI: u8 = 1;

pub const MIPI_SWAP: u8 = 0x4A;
pub const MIPI_SWAP_CH3: u8 = 7;

/// HDCP control, bits 5..6 enable HDCP
pub const HDCP_CTRL: u8 = 0xEE;
pub const HDCP_DISABLE_MASK: u8 = 0x9F;
/// DP try-auth flag
pub const DP_AUTH_CTRL: u8 = 0xEC;
pub const DP_TRY_AUTH: u8 = 0x10;
/// DRM interrupt enable
pub const DRM_INT_CTRL: u8 = 0xFF;
pub const DRM_INT_EN: u8 = 0x01;
/// Secure OCM firmware version
pub const SECURE_OCM_VERSION: u8 = 0x86;

// ============================================================================
// RX_P2: video timing and pixel window
// ============================================================================

pub const TOTAL_LINES_L: u8 = 0x12;
pub const TOTAL_LINES_H: u8 = 0x13;
pub const ACTIVE_LINES_L: u8 = 0x14;
pub const ACTIVE_LINES_H: u8 = 0x15;
pub const VERTICAL_FRONT_PORCH: u8 = 0x16;
pub const VERTICAL_SYNC_WIDTH: u8 = 0x18;
pub const VERTICAL_BACK_PORCH: u8 = 0x1A;

pub const HORIZONTAL_TOTAL_PIXELS_L: u8 = 0x1C;
pub const HORIZONTAL_TOTAL_PIXELS_H: u8 = 0x1D;
pub const HORIZONTAL_ACTIVE_PIXELS_L: u8 = 0x1E;
pub const HORIZONTAL_ACTIVE_PIXELS_H: u8 = 0x1F;
pub const HORIZONTAL_FRONT_PORCH_L: u8 = 0x20;
pub const HORIZONTAL_FRONT_PORCH_H: u8 = 0x21;
pub const HORIZONTAL_SYNC_WIDTH_L: u8 = 0x22;
pub const HORIZONTAL_SYNC_WIDTH_H: u8 = 0x23;
pub const HORIZONTAL_BACK_PORCH_L: u8 = 0x24;
pub const HORIZONTAL_BACK_PORCH_H: u8 = 0x25;

/// Default frame window: 24-bit byte offset, data FIFO, control
pub const FRAME_WINDOW_OFFSET: u8 = 0x60;
pub const FRAME_WINDOW_DATA: u8 = 0x63;
pub const FRAME_WINDOW_CTRL: u8 = 0x64;
pub const FRAME_WINDOW_COMMIT: u8 = 0x01;

// ============================================================================
// TX_P2
// ============================================================================

pub const RST_CTRL2: u8 = 0x07;
pub const AUX_RST: u8 = 0x04;

// ============================================================================
// Timing constants
// ============================================================================

/// Flash load polls per handshake attempt, 1 ms apart
pub const OCM_LOADING_TIME: u32 = 10;

/// AUX completion polls, 2 ms apart
pub const AUX_WAIT_POLLS: u32 = 150;
pub const AUX_WAIT_INTERVAL_MS: u32 = 2;

/// AUX reply buffer size
pub const MAX_DPCD_BUFFER_SIZE: usize = 16;

/// One EDID block
pub const ONE_BLOCK_SIZE: usize = 128;
pub const FOUR_BLOCK_SIZE: usize = 4 * ONE_BLOCK_SIZE;
