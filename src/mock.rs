//! Simulated CC1101 transport for driver tests
//!
//! Decodes header / data phases into a register file, FIFOs and a minimal
//! radio state machine, logging headers and strobes for inspection.
//!
//! Copyright 2019 Ryan Kurte

use std::collections::VecDeque;
use std::vec::Vec;

use crate::base::Base;
use crate::device::regs::{self, Access, Strobe};
use crate::Error;

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MockError;

/// Simulated GDO0 behaviour
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Gdo0 {
    Unwired,
    Stuck(bool),
    /// High between the given offsets from the last STX strobe
    Packet { rise_ms: u64, fall_ms: u64 },
}

#[derive(Copy, Clone, PartialEq, Debug)]
enum State {
    Idle,
    Rx,
    Tx(u64),
    Sleep,
}

pub struct MockBase {
    pub regs: [u8; 0x30],
    pub pa_table: [u8; 8],

    pub tx_fifo: Vec<u8>,
    /// Everything written to the TX FIFO, survives flushes
    pub tx_log: Vec<u8>,
    pub rx_fifo: VecDeque<u8>,
    pub rx_overflow: bool,

    pub strobes: Vec<Strobe>,
    headers: Vec<u8>,

    pub selected: bool,
    pub ready: bool,
    /// Report a pin error from every deselect
    pub deselect_fails: bool,
    pub clock: u64,
    pub begin_count: usize,

    pub version: u8,
    pub partnum: u8,
    pub rssi: u8,
    pub lqi: u8,

    pub gdo0: Gdo0,
    pub gdo2: bool,
    pub tx_duration_ms: u64,

    state: State,
    header: Option<u8>,
    offset: usize,
}

impl MockBase {
    pub fn new() -> Self {
        Self {
            regs: [0u8; 0x30],
            pa_table: [0u8; 8],
            tx_fifo: Vec::new(),
            tx_log: Vec::new(),
            rx_fifo: VecDeque::new(),
            rx_overflow: false,
            strobes: Vec::new(),
            headers: Vec::new(),
            selected: false,
            ready: true,
            deselect_fails: false,
            clock: 0,
            begin_count: 0,
            version: 0x14,
            partnum: 0x00,
            rssi: 0,
            lqi: 0,
            gdo0: Gdo0::Packet { rise_ms: 2, fall_ms: 10 },
            gdo2: false,
            tx_duration_ms: 0,
            state: State::Idle,
            header: None,
            offset: 0,
        }
    }

    /// Forget logged headers, strobes and FIFO writes
    pub fn clear_log(&mut self) {
        self.headers.clear();
        self.strobes.clear();
        self.tx_log.clear();
    }

    /// Header bytes of every transaction that reached the data phase
    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    /// Queue a received packet with its length prefix and status bytes
    pub fn load_rx(&mut self, payload: &[u8], rssi: u8, lqi: u8) {
        self.rx_fifo.push_back(payload.len() as u8);
        self.rx_fifo.extend(payload.iter());
        self.rx_fifo.push_back(rssi);
        self.rx_fifo.push_back(lqi);
    }

    fn strobe_from(addr: u8) -> Option<Strobe> {
        let s = match addr {
            0x30 => Strobe::SRES,
            0x31 => Strobe::SFSTXON,
            0x32 => Strobe::SXOFF,
            0x33 => Strobe::SCAL,
            0x34 => Strobe::SRX,
            0x35 => Strobe::STX,
            0x36 => Strobe::SIDLE,
            0x38 => Strobe::SWOR,
            0x39 => Strobe::SPWD,
            0x3A => Strobe::SFRX,
            0x3B => Strobe::SFTX,
            0x3C => Strobe::SWORRST,
            0x3D => Strobe::SNOP,
            _ => return None,
        };
        Some(s)
    }

    fn execute(&mut self, strobe: Strobe) {
        self.strobes.push(strobe);

        match strobe {
            Strobe::SRES => {
                self.regs = [0u8; 0x30];
                self.tx_fifo.clear();
                self.rx_fifo.clear();
                self.rx_overflow = false;
                self.state = State::Idle;
            }
            Strobe::SRX => self.state = State::Rx,
            Strobe::STX => self.state = State::Tx(self.clock),
            Strobe::SIDLE => self.state = State::Idle,
            Strobe::SPWD => self.state = State::Sleep,
            Strobe::SFRX => {
                self.rx_fifo.clear();
                self.rx_overflow = false;
            }
            Strobe::SFTX => self.tx_fifo.clear(),
            _ => (),
        }
    }

    fn marcstate(&mut self) -> u8 {
        if let State::Tx(at) = self.state {
            if self.clock.saturating_sub(at) >= self.tx_duration_ms {
                self.state = State::Idle;
            }
        }

        match self.state {
            State::Idle => regs::MARCSTATE_IDLE,
            State::Rx => regs::MARCSTATE_RX,
            State::Tx(_) => regs::MARCSTATE_TX,
            State::Sleep => 0x00,
        }
    }

    fn status(&mut self, addr: u8) -> u8 {
        match addr {
            0x30 => self.partnum,
            0x31 => self.version,
            0x33 => self.lqi,
            0x34 => self.rssi,
            0x35 => self.marcstate(),
            0x3A => self.tx_fifo.len().min(0x7F) as u8,
            0x3B => {
                let n = self.rx_fifo.len().min(0x7F) as u8;
                if self.rx_overflow {
                    n | 0x80
                } else {
                    n
                }
            }
            _ => 0,
        }
    }

    fn write_data(&mut self, header: u8, b: u8) {
        let addr = header & 0x3F;

        match addr {
            0x3F => {
                self.tx_fifo.push(b);
                self.tx_log.push(b);
            }
            0x3E => self.pa_table[self.offset % 8] = b,
            a if (a as usize + self.offset) < self.regs.len() => self.regs[a as usize + self.offset] = b,
            _ => (),
        }

        self.offset += 1;
    }

    fn read_data(&mut self, header: u8) -> u8 {
        let addr = header & 0x3F;
        let burst = header & Access::BURST.bits() != 0;

        let v = match addr {
            0x3F => self.rx_fifo.pop_front().unwrap_or(0),
            0x3E => self.pa_table[self.offset % 8],
            0x30..=0x3D if burst => self.status(addr),
            a if (a as usize + self.offset) < self.regs.len() => self.regs[a as usize + self.offset],
            _ => 0,
        };

        self.offset += 1;
        v
    }
}

impl Base<MockError, MockError> for MockBase {
    fn begin(&mut self) -> Result<(), Error<MockError, MockError>> {
        self.begin_count += 1;
        Ok(())
    }

    fn select(&mut self) -> Result<(), Error<MockError, MockError>> {
        self.selected = true;
        self.header = None;
        self.offset = 0;
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Error<MockError, MockError>> {
        self.selected = false;
        self.header = None;
        if self.deselect_fails {
            return Err(Error::Pin(MockError));
        }
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, Error<MockError, MockError>> {
        Ok(self.ready)
    }

    fn spi_write(&mut self, data: &[u8]) -> Result<(), Error<MockError, MockError>> {
        assert!(self.selected, "bus write without chip select");

        for b in data {
            match self.header {
                None => {
                    self.header = Some(*b);
                    self.headers.push(*b);

                    let is_read = b & Access::READ.bits() != 0;
                    let is_burst = b & Access::BURST.bits() != 0;
                    if !is_read && !is_burst {
                        if let Some(s) = Self::strobe_from(*b) {
                            self.execute(s);
                        }
                    }
                }
                Some(h) => self.write_data(h, *b),
            }
        }

        Ok(())
    }

    fn spi_read(&mut self, data: &mut [u8]) -> Result<(), Error<MockError, MockError>> {
        assert!(self.selected, "bus read without chip select");

        let header = match self.header {
            Some(h) => h,
            None => return Err(Error::Comms(MockError)),
        };

        for b in data.iter_mut() {
            *b = self.read_data(header);
        }

        Ok(())
    }

    fn has_gdo0(&self) -> bool {
        self.gdo0 != Gdo0::Unwired
    }

    fn gdo0_is_high(&mut self) -> Result<bool, Error<MockError, MockError>> {
        match self.gdo0 {
            Gdo0::Unwired => Err(Error::Unwired),
            Gdo0::Stuck(v) => Ok(v),
            Gdo0::Packet { rise_ms, fall_ms } => match self.state {
                State::Tx(at) => {
                    let elapsed = self.clock.saturating_sub(at);
                    Ok(elapsed >= rise_ms && elapsed < fall_ms)
                }
                _ => Ok(false),
            },
        }
    }

    fn gdo2_is_high(&mut self) -> Result<bool, Error<MockError, MockError>> {
        Ok(self.gdo2)
    }

    fn now_ms(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn yield_now(&mut self) {}

    fn delay_ms(&mut self, ms: u32) {
        self.clock += ms as u64;
    }
}
