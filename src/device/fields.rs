//! Packed register field definitions
//!
//! Several CC1101 control registers hold multiple settings. Each is modelled as a
//! struct of pre-shifted field values: decomposing a byte peels fields off by
//! descending thresholds and recomposing is the arithmetic sum of the fields.
//!
//! Copyright 2019 Ryan Kurte

use super::regs::Register;

/// A control register made up of independently settable fields
pub trait PackedRegister: Sized {
    /// Register holding these fields
    const ADDRESS: Register;

    /// Split a raw register value into fields
    fn decompose(value: u8) -> Self;

    /// Combine fields back into a raw register value
    fn recompose(&self) -> u8;
}

/// Remove every whole multiple of `step` from `value`, returning the amount removed
fn peel(value: &mut u8, step: u8) -> u8 {
    let mut acc = 0u8;
    while *value >= step {
        *value -= step;
        acc = acc.wrapping_add(step);
    }
    acc
}

fn flag(v: u8) -> bool {
    v != 0
}

/// Packet automation control 1 (PKTCTRL1)
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PktCtrl1 {
    pqt: u8,
    crc_autoflush: u8,
    append_status: u8,
    adr_chk: u8,
}

impl PackedRegister for PktCtrl1 {
    const ADDRESS: Register = Register::PKTCTRL1;

    fn decompose(mut v: u8) -> Self {
        let pqt = peel(&mut v, 32);
        let crc_autoflush = peel(&mut v, 8);
        let append_status = peel(&mut v, 4);
        Self { pqt, crc_autoflush, append_status, adr_chk: v }
    }

    fn recompose(&self) -> u8 {
        self.pqt
            .wrapping_add(self.crc_autoflush)
            .wrapping_add(self.append_status)
            .wrapping_add(self.adr_chk)
    }
}

impl PktCtrl1 {
    /// Preamble quality estimator threshold (0..=7)
    pub fn pqt(&self) -> u8 {
        self.pqt / 32
    }

    pub fn set_pqt(&mut self, v: u8) {
        self.pqt = v.min(7) * 32;
    }

    /// Flush the RX FIFO automatically on CRC failure
    pub fn crc_autoflush(&self) -> bool {
        flag(self.crc_autoflush)
    }

    pub fn set_crc_autoflush(&mut self, on: bool) {
        self.crc_autoflush = if on { 8 } else { 0 };
    }

    /// Append RSSI and LQI status bytes to received payloads
    pub fn append_status(&self) -> bool {
        flag(self.append_status)
    }

    pub fn set_append_status(&mut self, on: bool) {
        self.append_status = if on { 4 } else { 0 };
    }

    /// Address check mode (0..=3)
    pub fn address_check(&self) -> u8 {
        self.adr_chk
    }

    pub fn set_address_check(&mut self, v: u8) {
        self.adr_chk = v.min(3);
    }
}

/// Packet automation control 0 (PKTCTRL0)
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PktCtrl0 {
    white_data: u8,
    pkt_format: u8,
    crc_en: u8,
    length_config: u8,
}

impl PackedRegister for PktCtrl0 {
    const ADDRESS: Register = Register::PKTCTRL0;

    fn decompose(mut v: u8) -> Self {
        let white_data = peel(&mut v, 64);
        let pkt_format = peel(&mut v, 16);
        let crc_en = peel(&mut v, 4);
        Self { white_data, pkt_format, crc_en, length_config: v }
    }

    fn recompose(&self) -> u8 {
        self.white_data
            .wrapping_add(self.pkt_format)
            .wrapping_add(self.crc_en)
            .wrapping_add(self.length_config)
    }
}

impl PktCtrl0 {
    /// Data whitening
    pub fn white_data(&self) -> bool {
        flag(self.white_data)
    }

    pub fn set_white_data(&mut self, on: bool) {
        self.white_data = if on { 64 } else { 0 };
    }

    /// Packet format: 0 normal FIFO, 1 synchronous serial, 2 random TX, 3 asynchronous serial
    pub fn packet_format(&self) -> u8 {
        self.pkt_format / 16
    }

    pub fn set_packet_format(&mut self, v: u8) {
        self.pkt_format = v.min(3) * 16;
    }

    /// CRC calculation in TX and check in RX
    pub fn crc(&self) -> bool {
        flag(self.crc_en)
    }

    pub fn set_crc(&mut self, on: bool) {
        self.crc_en = if on { 4 } else { 0 };
    }

    /// Length configuration: 0 fixed, 1 variable, 2 infinite
    pub fn length_config(&self) -> u8 {
        self.length_config
    }

    pub fn set_length_config(&mut self, v: u8) {
        self.length_config = v.min(3);
    }
}

/// Modem configuration 1 (MDMCFG1)
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct MdmCfg1 {
    fec: u8,
    preamble: u8,
    chanspc_e: u8,
}

impl PackedRegister for MdmCfg1 {
    const ADDRESS: Register = Register::MDMCFG1;

    fn decompose(mut v: u8) -> Self {
        let fec = peel(&mut v, 128);
        let preamble = peel(&mut v, 16);
        Self { fec, preamble, chanspc_e: v }
    }

    fn recompose(&self) -> u8 {
        self.fec.wrapping_add(self.preamble).wrapping_add(self.chanspc_e)
    }
}

impl MdmCfg1 {
    /// Forward error correction
    pub fn fec(&self) -> bool {
        flag(self.fec)
    }

    pub fn set_fec(&mut self, on: bool) {
        self.fec = if on { 128 } else { 0 };
    }

    /// Minimum preamble bytes index (0..=7, 2 to 24 bytes)
    pub fn preamble(&self) -> u8 {
        self.preamble / 16
    }

    pub fn set_preamble(&mut self, v: u8) {
        self.preamble = v.min(7) * 16;
    }

    /// Channel spacing exponent
    pub fn chanspc_e(&self) -> u8 {
        self.chanspc_e
    }

    pub fn set_chanspc_e(&mut self, v: u8) {
        self.chanspc_e = v.min(3);
    }
}

/// Modem configuration 2 (MDMCFG2)
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct MdmCfg2 {
    dc_off: u8,
    mod_format: u8,
    manchester: u8,
    sync_mode: u8,
}

impl PackedRegister for MdmCfg2 {
    const ADDRESS: Register = Register::MDMCFG2;

    fn decompose(mut v: u8) -> Self {
        let dc_off = peel(&mut v, 128);
        let mod_format = peel(&mut v, 16);
        let manchester = peel(&mut v, 8);
        Self { dc_off, mod_format, manchester, sync_mode: v }
    }

    fn recompose(&self) -> u8 {
        self.dc_off
            .wrapping_add(self.mod_format)
            .wrapping_add(self.manchester)
            .wrapping_add(self.sync_mode)
    }
}

impl MdmCfg2 {
    /// Digital DC blocking filter disabled
    pub fn dc_filter_off(&self) -> bool {
        flag(self.dc_off)
    }

    pub fn set_dc_filter_off(&mut self, off: bool) {
        self.dc_off = if off { 128 } else { 0 };
    }

    /// Raw (pre-shifted) modulation format field
    pub fn mod_format(&self) -> u8 {
        self.mod_format
    }

    pub fn set_mod_format(&mut self, v: u8) {
        self.mod_format = v & 0x70;
    }

    /// Manchester encoding
    pub fn manchester(&self) -> bool {
        flag(self.manchester)
    }

    pub fn set_manchester(&mut self, on: bool) {
        self.manchester = if on { 8 } else { 0 };
    }

    /// Sync word qualifier mode (0..=7)
    pub fn sync_mode(&self) -> u8 {
        self.sync_mode
    }

    pub fn set_sync_mode(&mut self, v: u8) {
        self.sync_mode = v.min(7);
    }
}

/// Modem configuration 4 (MDMCFG4), shared by RX bandwidth and data rate exponent
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct MdmCfg4 {
    rx_bw: u8,
    drate_e: u8,
}

impl PackedRegister for MdmCfg4 {
    const ADDRESS: Register = Register::MDMCFG4;

    fn decompose(mut v: u8) -> Self {
        let rx_bw = peel(&mut v, 64).wrapping_add(peel(&mut v, 16));
        Self { rx_bw, drate_e: v }
    }

    fn recompose(&self) -> u8 {
        self.rx_bw.wrapping_add(self.drate_e)
    }
}

impl MdmCfg4 {
    /// Raw (pre-shifted) RX bandwidth field
    pub fn rx_bw(&self) -> u8 {
        self.rx_bw
    }

    pub fn set_rx_bw(&mut self, v: u8) {
        self.rx_bw = v & 0xF0;
    }

    /// Data rate exponent
    pub fn drate_e(&self) -> u8 {
        self.drate_e
    }

    pub fn set_drate_e(&mut self, v: u8) {
        self.drate_e = v.min(15);
    }
}
