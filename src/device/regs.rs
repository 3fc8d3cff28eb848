//! CC1101 Register Definitions
//!
//! Copyright 2019 Ryan Kurte

use bitflags::bitflags;

bitflags! {
    /// Header byte access bits, OR'd with the register address
    pub struct Access: u8 {
        const READ  = 0x80;
        const BURST = 0x40;
    }
}

/// Configuration registers, plus the PA table and FIFO access addresses
#[derive(Copy, Clone, PartialEq, Debug)]
#[allow(non_camel_case_types)]
pub enum Register {
    IOCFG2   = 0x00,
    IOCFG1   = 0x01,
    IOCFG0   = 0x02,
    FIFOTHR  = 0x03,
    SYNC1    = 0x04,
    SYNC0    = 0x05,
    PKTLEN   = 0x06,
    PKTCTRL1 = 0x07,
    PKTCTRL0 = 0x08,
    ADDR     = 0x09,
    CHANNR   = 0x0A,
    FSCTRL1  = 0x0B,
    FSCTRL0  = 0x0C,
    FREQ2    = 0x0D,
    FREQ1    = 0x0E,
    FREQ0    = 0x0F,
    MDMCFG4  = 0x10,
    MDMCFG3  = 0x11,
    MDMCFG2  = 0x12,
    MDMCFG1  = 0x13,
    MDMCFG0  = 0x14,
    DEVIATN  = 0x15,
    MCSM2    = 0x16,
    MCSM1    = 0x17,
    MCSM0    = 0x18,
    FOCCFG   = 0x19,
    BSCFG    = 0x1A,
    AGCCTRL2 = 0x1B,
    AGCCTRL1 = 0x1C,
    AGCCTRL0 = 0x1D,
    WOREVT1  = 0x1E,
    WOREVT0  = 0x1F,
    WORCTRL  = 0x20,
    FREND1   = 0x21,
    FREND0   = 0x22,
    FSCAL3   = 0x23,
    FSCAL2   = 0x24,
    FSCAL1   = 0x25,
    FSCAL0   = 0x26,
    RCCTRL1  = 0x27,
    RCCTRL0  = 0x28,
    FSTEST   = 0x29,
    PTEST    = 0x2A,
    AGCTEST  = 0x2B,
    TEST2    = 0x2C,
    TEST1    = 0x2D,
    TEST0    = 0x2E,

    /// Power amplifier output table (8 bytes, burst access)
    PATABLE  = 0x3E,
    /// TX FIFO on write, RX FIFO on read
    FIFO     = 0x3F,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

impl Into<u8> for Register {
    fn into(self) -> u8 {
        self as u8
    }
}

/// Command strobes, a header byte with no data phase
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Strobe {
    /// Reset chip
    SRES    = 0x30,
    /// Enable and calibrate frequency synthesizer
    SFSTXON = 0x31,
    /// Turn off crystal oscillator
    SXOFF   = 0x32,
    /// Calibrate frequency synthesizer and turn it off
    SCAL    = 0x33,
    /// Enable RX
    SRX     = 0x34,
    /// Enable TX
    STX     = 0x35,
    /// Exit RX / TX, turn off frequency synthesizer
    SIDLE   = 0x36,
    /// Start automatic RX polling sequence (Wake-on-Radio)
    SWOR    = 0x38,
    /// Enter power down mode when CSn goes high
    SPWD    = 0x39,
    /// Flush the RX FIFO buffer
    SFRX    = 0x3A,
    /// Flush the TX FIFO buffer
    SFTX    = 0x3B,
    /// Reset real time clock
    SWORRST = 0x3C,
    SNOP    = 0x3D,
}

impl Into<u8> for Strobe {
    fn into(self) -> u8 {
        self as u8
    }
}

/// Read-only status registers, accessed with READ | BURST set
#[derive(Copy, Clone, PartialEq, Debug)]
#[allow(non_camel_case_types)]
pub enum Status {
    PARTNUM    = 0x30,
    VERSION    = 0x31,
    FREQEST    = 0x32,
    LQI        = 0x33,
    RSSI       = 0x34,
    MARCSTATE  = 0x35,
    WORTIME1   = 0x36,
    WORTIME0   = 0x37,
    PKTSTATUS  = 0x38,
    VCO_VC_DAC = 0x39,
    TXBYTES    = 0x3A,
    RXBYTES    = 0x3B,
}

impl Into<u8> for Status {
    fn into(self) -> u8 {
        self as u8
    }
}

/// RXBYTES / TXBYTES byte count mask (bit 7 is the overflow flag)
pub const NUM_BYTES_MASK: u8 = 0x7F;

/// LQI status CRC_OK bit
pub const LQI_CRC_OK: u8 = 0x80;
/// LQI status link quality estimate mask
pub const LQI_EST_MASK: u8 = 0x7F;

/// MARCSTATE main radio state mask
pub const MARCSTATE_MASK: u8 = 0x1F;
pub const MARCSTATE_IDLE: u8 = 0x01;
pub const MARCSTATE_RX: u8 = 0x0D;
pub const MARCSTATE_TX: u8 = 0x13;
