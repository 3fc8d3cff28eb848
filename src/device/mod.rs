//! CC1101 general device definitions
//!
//! Copyright 2019 Ryan Kurte

pub mod regs;
pub mod fields;
pub mod calibration;
pub mod link;

use calibration::{default_profiles, CalibrationProfile};

/// Bound on waiting for the chip ready indicator within a bus transaction
pub const TRANSPORT_TIMEOUT_MS: u32 = 100;

/// Bound on each edge of the GDO0 transmit handshake
pub const TX_HANDSHAKE_TIMEOUT_MS: u32 = 200;

/// Bound on waiting for GDO0 to signal end of packet in receive
pub const RX_END_TIMEOUT_MS: u32 = 100;

/// FSCAL2 read-back values below this are nudged after calibration
pub const FSCAL2_NUDGE_THRESHOLD: u8 = 32;
/// Amount added to an FSCAL2 value below the threshold
pub const FSCAL2_NUDGE: u8 = 32;

/// Hardware FIFO depth
pub const FIFO_SIZE: usize = 64;

/// Largest payload that fits the FIFO alongside the length byte and status bytes
pub const MAX_PAYLOAD: usize = 61;

/// Status bytes appended to received packets (RSSI, LQI / CRC)
pub const RX_STATUS_LEN: usize = 2;

/// Offset applied to the RSSI status register
pub const RSSI_OFFSET: i16 = 74;

/// Chip select pulse duration during reset
pub const RESET_PULSE_MS: u32 = 1;

/// Convert a raw RSSI status byte to dBm
pub fn rssi_dbm(raw: u8) -> i16 {
    let raw = raw as i16;
    if raw >= 128 {
        (raw - 256) / 2 - RSSI_OFFSET
    } else {
        raw / 2 - RSSI_OFFSET
    }
}

/// Driver view of the radio state
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum RadioMode {
    Idle,
    Transmitting,
    Receiving,
}

/// Chip modulation formats (pre-shifted MDMCFG2 MOD_FORMAT values)
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ModFormat {
    Fsk2 = 0x00,
    Gfsk = 0x10,
    /// ASK / OOK
    Ask = 0x30,
    Fsk4 = 0x40,
    Msk = 0x70,
}

impl ModFormat {
    /// FREND0 value, ASK ramps between PA table entries 0 and 1
    pub fn frend0(&self) -> u8 {
        match self {
            ModFormat::Ask => 0x11,
            _ => 0x10,
        }
    }

    pub fn is_ask(&self) -> bool {
        *self == ModFormat::Ask
    }
}

/// Data path configuration
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CcMode {
    /// FIFO packet handling with GDO0 asserting on sync word
    Packet,
    /// Raw asynchronous serial data on GDO0 / GDO2
    AsyncSerial,
}

/// IOCFG2, IOCFG0, PKTCTRL0, MDMCFG3 and MDMCFG4 data rate exponent for a CC mode
pub(crate) fn cc_mode_registers(mode: CcMode) -> (u8, u8, u8, u8, u8) {
    match mode {
        CcMode::Packet => (0x0B, 0x06, 0x05, 0xF8, 0x0B),
        CcMode::AsyncSerial => (0x0D, 0x0D, 0x32, 0x93, 0x07),
    }
}

/// CC1101 chip configuration
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Carrier frequency in MHz (defaults to 433.92 MHz)
    pub frequency_mhz: f32,
    /// Output power in dBm (defaults to 12 dBm)
    pub power_dbm: i8,
    /// Modulation format (defaults to ASK)
    pub mod_format: ModFormat,
    /// Data path mode (defaults to packet)
    pub cc_mode: CcMode,
    /// Channel number (defaults to 0)
    pub channel: u8,
    /// Per band FSCTRL0 calibration offsets, indexed by band
    pub calibration: [CalibrationProfile; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency_mhz: 433.92,
            power_dbm: 12,
            mod_format: ModFormat::Ask,
            cc_mode: CcMode::Packet,
            channel: 0,
            calibration: default_profiles(),
        }
    }
}

/// Register values written after reset, following the CC mode and frequency setup
pub const REGISTERS_INIT: &[(regs::Register, u8)] = &[
    (regs::Register::MDMCFG1, 0x22),
    (regs::Register::MDMCFG0, 0xF8),
];

/// Register values written after the channel number
pub const REGISTERS_TUNING: &[(regs::Register, u8)] = &[
    (regs::Register::DEVIATN, 0x47),
    (regs::Register::FREND1, 0x56),
    (regs::Register::MCSM0, 0x18),
    (regs::Register::FOCCFG, 0x16),
    (regs::Register::BSCFG, 0x1C),
    (regs::Register::AGCCTRL2, 0xC7),
    (regs::Register::AGCCTRL1, 0x00),
    (regs::Register::AGCCTRL0, 0xB2),
    (regs::Register::FSCAL3, 0xE9),
    (regs::Register::FSCAL2, 0x2A),
    (regs::Register::FSCAL1, 0x00),
    (regs::Register::FSCAL0, 0x1F),
    (regs::Register::FSTEST, 0x59),
    (regs::Register::TEST2, 0x81),
    (regs::Register::TEST1, 0x35),
    (regs::Register::TEST0, 0x09),
    (regs::Register::PKTCTRL1, 0x04),
    (regs::Register::ADDR, 0x00),
    (regs::Register::PKTLEN, 0xFF),
];

/// Link channel configuration, applied through `radio::Channel`
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Cc1101Channel {
    /// Carrier frequency in MHz (defaults to 433.92 MHz)
    pub frequency_mhz: f32,
    /// Data rate in kbps (defaults to 4.8 kbps)
    pub data_rate_kbps: f32,
    /// Frequency deviation in kHz (defaults to 5 kHz)
    pub deviation_khz: f32,
    /// RX filter bandwidth in kHz (defaults to 203 kHz)
    pub rx_bandwidth_khz: f32,
}

impl Default for Cc1101Channel {
    fn default() -> Self {
        Self {
            frequency_mhz: 433.92,
            data_rate_kbps: 4.8,
            deviation_khz: 5.0,
            rx_bandwidth_khz: 203.0,
        }
    }
}

/// Received packet information
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PacketInfo {
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Link quality estimate
    pub lqi: u8,
    /// CRC check passed
    pub crc_ok: bool,
}

impl PacketInfo {
    /// Build packet information from the appended RSSI and LQI / CRC status bytes
    pub fn from_status(status: [u8; RX_STATUS_LEN]) -> Self {
        Self {
            rssi: rssi_dbm(status[0]),
            lqi: status[1] & regs::LQI_EST_MASK,
            crc_ok: status[1] & regs::LQI_CRC_OK != 0,
        }
    }
}

impl radio::ReceiveInfo for PacketInfo {
    fn rssi(&self) -> i16 {
        self.rssi
    }
}
