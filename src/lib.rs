//! CC1101 Sub GHz Radio Driver
//!
//! Drives TI CC1101 transceivers over a shared SPI bus, and provides a transceiver
//! abstraction with a frequency sweep engine for hosts running several radios.
//!
//! Copyright 2019 Ryan Kurte

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[macro_use]
extern crate log;

use core::marker::PhantomData;

pub mod base;
pub mod device;
pub mod packet;
pub mod transceiver;
pub mod prelude;

#[cfg(test)]
pub(crate) mod mock;

use base::Base as Cc1101Base;
use device::calibration::{self, Band, CalibrationProfile, FrequencyWord, PowerTable};
use device::fields::{MdmCfg1, MdmCfg2, MdmCfg4, PackedRegister, PktCtrl0, PktCtrl1};
use device::regs::{Register, Status, Strobe};
use device::{link, CcMode, Config, ModFormat, RadioMode};

/// CC1101 device object
///
/// One handle per physical chip, owning that chip's transport.
pub struct Cc1101<Base, CommsError, PinError> {
    hal: Base,
    config: Config,
    mode: RadioMode,

    frequency_mhz: f32,
    power_dbm: i8,
    mod_format: ModFormat,
    cc_mode: CcMode,

    pa_table: PowerTable,
    pa_band: Option<Band>,

    _ce: PhantomData<CommsError>,
    _pe: PhantomData<PinError>,
}

/// CC1101 error type
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Error<CommsError, PinError> {
    /// Communications (SPI) error
    Comms(CommsError),
    /// Pin control error
    Pin(PinError),
    /// Chip ready indicator not asserted within the transport timeout
    TransportTimeout,
    /// GDO0 did not signal transmission start
    HandshakeTimeout,
    /// Payload does not fit the FIFO or provided buffer
    BufferSize,
    /// Operation requires a GDO line that is not wired
    Unwired,
    /// No response from device
    NoResponse,
}

impl<Base, CommsError, PinError> Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
{
    /// Create a new radio instance over the provided transport, resetting and configuring the device
    pub fn new(hal: Base, config: &Config) -> Result<Self, Error<CommsError, PinError>> {
        let mut cc1101 = Self::build(hal, config);

        debug!("Initialising transport");
        cc1101.hal.begin()?;

        debug!("Resetting radio");
        cc1101.reset()?;

        cc1101.configure(config)?;

        Ok(cc1101)
    }

    /// Create a driver instance without touching the hardware
    pub(crate) fn build(hal: Base, config: &Config) -> Self {
        Self {
            hal,
            config: config.clone(),
            mode: RadioMode::Idle,
            frequency_mhz: config.frequency_mhz,
            power_dbm: config.power_dbm,
            mod_format: config.mod_format,
            cc_mode: config.cc_mode,
            pa_table: PowerTable::default(),
            pa_band: None,
            _ce: PhantomData,
            _pe: PhantomData,
        }
    }

    /// Hardware reset sequence: chip select pulse then SRES once the oscillator is stable
    pub fn reset(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.select()?;
        self.hal.delay_ms(device::RESET_PULSE_MS);
        self.hal.deselect()?;
        self.hal.delay_ms(device::RESET_PULSE_MS);

        self.hal.select()?;
        let r = self
            .hal
            .wait_ready()
            .and_then(|_| self.hal.spi_write(&[Strobe::SRES.into()]))
            .and_then(|_| self.hal.wait_ready());
        self.hal.deselect()?;

        if r.is_err() {
            warn!("Reset failed, chip not ready");
        }
        r?;

        self.mode = RadioMode::Idle;
        self.pa_band = None;

        Ok(())
    }

    /// Write the default register set for the provided configuration
    pub fn configure(&mut self, config: &Config) -> Result<(), Error<CommsError, PinError>> {
        debug!("Configuring radio: {:?}", config);

        self.config = config.clone();
        self.frequency_mhz = config.frequency_mhz;
        self.power_dbm = config.power_dbm;
        self.mod_format = config.mod_format;

        self.write_reg(Register::FSCTRL1, 0x06)?;

        self.set_cc_mode(config.cc_mode)?;
        self.set_frequency(config.frequency_mhz)?;

        for (reg, value) in device::REGISTERS_INIT {
            self.write_reg(*reg, *value)?;
        }

        self.write_reg(Register::CHANNR, config.channel)?;

        for (reg, value) in device::REGISTERS_TUNING {
            self.write_reg(*reg, *value)?;
        }

        Ok(())
    }

    /// Reset via the SRES strobe alone
    pub fn soft_reset(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SRES)?;
        self.mode = RadioMode::Idle;
        self.pa_band = None;
        Ok(())
    }

    /// Check for a connected device, a non-zero VERSION indicates a responding chip
    pub fn probe(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        Ok(self.version()? > 0)
    }

    /// Read the chip version
    pub fn version(&mut self) -> Result<u8, Error<CommsError, PinError>> {
        self.hal.read_status(Status::VERSION)
    }

    /// Read the chip part number
    pub fn part_number(&mut self) -> Result<u8, Error<CommsError, PinError>> {
        self.hal.read_status(Status::PARTNUM)
    }

    /// Read a configuration register
    pub fn read_reg(&mut self, reg: Register) -> Result<u8, Error<CommsError, PinError>> {
        self.hal.read_reg(reg)
    }

    /// Write a configuration register
    pub fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), Error<CommsError, PinError>> {
        self.hal.write_reg(reg, value)
    }

    /// Read a status register
    pub fn read_status(&mut self, status: Status) -> Result<u8, Error<CommsError, PinError>> {
        self.hal.read_status(status)
    }

    /// Decompose a packed register from its live hardware value
    pub fn read_fields<R: PackedRegister>(&mut self) -> Result<R, Error<CommsError, PinError>> {
        let v = self.hal.read_reg(R::ADDRESS)?;
        Ok(R::decompose(v))
    }

    /// Update fields of a packed register, re-reading siblings from hardware first
    pub fn modify_fields<R, F>(&mut self, f: F) -> Result<u8, Error<CommsError, PinError>>
    where
        R: PackedRegister,
        F: FnOnce(&mut R),
    {
        let mut fields = self.read_fields::<R>()?;
        f(&mut fields);

        let v = fields.recompose();
        self.hal.write_reg(R::ADDRESS, v)?;

        Ok(v)
    }

    /// Select packet or asynchronous serial data handling
    pub fn set_cc_mode(&mut self, mode: CcMode) -> Result<(), Error<CommsError, PinError>> {
        debug!("Setting CC mode: {:?}", mode);

        let (iocfg2, iocfg0, pktctrl0, mdmcfg3, drate_e) = device::cc_mode_registers(mode);

        self.write_reg(Register::IOCFG2, iocfg2)?;
        self.write_reg(Register::IOCFG0, iocfg0)?;
        self.write_reg(Register::PKTCTRL0, pktctrl0)?;
        self.write_reg(Register::MDMCFG3, mdmcfg3)?;
        self.modify_fields::<MdmCfg4, _>(|m| m.set_drate_e(drate_e))?;

        self.cc_mode = mode;

        self.set_mod_format(self.mod_format)
    }

    /// Set the chip modulation format, re-applying the PA table layout
    pub fn set_mod_format(&mut self, format: ModFormat) -> Result<(), Error<CommsError, PinError>> {
        debug!("Setting modulation format: {:?}", format);

        self.modify_fields::<MdmCfg2, _>(|m| m.set_mod_format(format as u8))?;
        self.write_reg(Register::FREND0, format.frend0())?;

        self.mod_format = format;

        self.set_power(self.power_dbm)
    }

    /// Set output power in dBm, selecting the PA level for the current band
    pub fn set_power(&mut self, dbm: i8) -> Result<(), Error<CommsError, PinError>> {
        self.power_dbm = dbm;

        let band = match Band::from_mhz(self.frequency_mhz) {
            Some(b) => b,
            None => {
                warn!("No PA table for {} MHz, leaving output power unchanged", self.frequency_mhz);
                return Ok(());
            }
        };

        let level = calibration::pa_level(band, dbm);
        let table = PowerTable::new(level, self.mod_format.is_ask());

        debug!("Setting PA level 0x{:02x} for {} dBm in {:?}", level, dbm, band);
        self.hal.write_burst(Register::PATABLE, table.as_bytes())?;

        self.pa_table = table;
        self.pa_band = Some(band);

        Ok(())
    }

    /// Set the carrier frequency in MHz and recalibrate for its band
    pub fn set_frequency(&mut self, mhz: f32) -> Result<(), Error<CommsError, PinError>> {
        let clamped = FrequencyWord::clamp_mhz(mhz);
        if clamped != mhz {
            warn!("Frequency {} MHz outside synthesizer range, clamped to {}", mhz, clamped);
        }

        let word = FrequencyWord::from_mhz(clamped);
        trace!("Setting frequency {} MHz: {:02x?}", clamped, word.bytes());

        self.frequency_mhz = clamped;

        self.write_reg(Register::FREQ2, word.freq2)?;
        self.write_reg(Register::FREQ1, word.freq1)?;
        self.write_reg(Register::FREQ0, word.freq0)?;

        self.calibrate()?;

        Ok(())
    }

    /// Apply band calibration for the current frequency, returning the band used
    pub fn calibrate(&mut self) -> Result<Option<Band>, Error<CommsError, PinError>> {
        let mhz = self.frequency_mhz;

        let band = match Band::from_mhz(mhz) {
            Some(b) => b,
            None => {
                warn!("Frequency {} MHz outside supported bands, skipping calibration", mhz);
                return Ok(None);
            }
        };

        let offset = self.config.calibration[band.index()].interpolate(band, mhz);
        self.write_reg(Register::FSCTRL0, offset)?;

        let test0 = band.test0(mhz);
        self.write_reg(Register::TEST0, test0)?;

        if test0 == calibration::TEST0_HIGH {
            let fscal2 = self.read_reg(Register::FSCAL2)?;
            if fscal2 < device::FSCAL2_NUDGE_THRESHOLD {
                self.write_reg(Register::FSCAL2, fscal2 + device::FSCAL2_NUDGE)?;
            }
        }

        if self.pa_band != Some(band) {
            debug!("Band changed to {:?}, regenerating PA table", band);
            self.set_power(self.power_dbm)?;
        }

        Ok(Some(band))
    }

    /// Override the calibration offsets for a band
    pub fn set_calibration_profile(&mut self, band: Band, low: u8, high: u8) {
        self.config.calibration[band.index()] = CalibrationProfile::new(low, high);
    }

    /// Set the data rate in kbps, preserving the RX bandwidth field
    pub fn set_data_rate(&mut self, kbps: f32) -> Result<(), Error<CommsError, PinError>> {
        let (e, m) = link::encode_data_rate(kbps);
        debug!("Setting data rate {} kbps (e: {} m: {})", kbps, e, m);

        self.modify_fields::<MdmCfg4, _>(|r| r.set_drate_e(e))?;
        self.write_reg(Register::MDMCFG3, m)
    }

    /// Set the frequency deviation in kHz
    pub fn set_deviation(&mut self, khz: f32) -> Result<(), Error<CommsError, PinError>> {
        let v = link::encode_deviation(khz);
        debug!("Setting deviation {} kHz (0x{:02x})", khz, v);

        self.write_reg(Register::DEVIATN, v)
    }

    /// Set the RX filter bandwidth in kHz, preserving the data rate exponent
    pub fn set_rx_bandwidth(&mut self, khz: f32) -> Result<(), Error<CommsError, PinError>> {
        let bw = link::encode_rx_bandwidth(khz);
        debug!("Setting RX bandwidth {} kHz (0x{:02x})", khz, bw);

        self.modify_fields::<MdmCfg4, _>(|r| r.set_rx_bw(bw))?;
        Ok(())
    }

    /// Set the channel spacing in kHz, preserving FEC and preamble fields
    pub fn set_channel_spacing(&mut self, khz: f32) -> Result<(), Error<CommsError, PinError>> {
        let (e, m) = link::encode_channel_spacing(khz);
        debug!("Setting channel spacing {} kHz (e: {} m: {})", khz, e, m);

        self.modify_fields::<MdmCfg1, _>(|r| r.set_chanspc_e(e))?;
        self.write_reg(Register::MDMCFG0, m)
    }

    /// Current data rate in kbps, decoded from hardware
    pub fn data_rate(&mut self) -> Result<f32, Error<CommsError, PinError>> {
        let e = self.read_fields::<MdmCfg4>()?.drate_e();
        let m = self.read_reg(Register::MDMCFG3)?;
        Ok(link::decode_data_rate(e, m))
    }

    /// Current deviation in kHz, decoded from hardware
    pub fn deviation(&mut self) -> Result<f32, Error<CommsError, PinError>> {
        let v = self.read_reg(Register::DEVIATN)?;
        Ok(link::decode_deviation(v))
    }

    /// Current RX filter bandwidth in kHz, decoded from hardware
    pub fn rx_bandwidth(&mut self) -> Result<f32, Error<CommsError, PinError>> {
        let bw = self.read_fields::<MdmCfg4>()?.rx_bw();
        Ok(link::decode_rx_bandwidth(bw))
    }

    /// Current channel spacing in kHz, decoded from hardware
    pub fn channel_spacing(&mut self) -> Result<f32, Error<CommsError, PinError>> {
        let e = self.read_fields::<MdmCfg1>()?.chanspc_e();
        let m = self.read_reg(Register::MDMCFG0)?;
        Ok(link::decode_channel_spacing(e, m))
    }

    /// Current frequency in MHz, decoded from the synthesizer registers
    pub fn frequency_word(&mut self) -> Result<FrequencyWord, Error<CommsError, PinError>> {
        Ok(FrequencyWord {
            freq2: self.read_reg(Register::FREQ2)?,
            freq1: self.read_reg(Register::FREQ1)?,
            freq0: self.read_reg(Register::FREQ0)?,
        })
    }

    pub fn set_sync_word(&mut self, high: u8, low: u8) -> Result<(), Error<CommsError, PinError>> {
        self.write_reg(Register::SYNC1, high)?;
        self.write_reg(Register::SYNC0, low)
    }

    /// Address for packet filtering, 0x00 and 0xFF are optional broadcast addresses
    pub fn set_address(&mut self, addr: u8) -> Result<(), Error<CommsError, PinError>> {
        self.write_reg(Register::ADDR, addr)
    }

    pub fn set_channel_number(&mut self, channel: u8) -> Result<(), Error<CommsError, PinError>> {
        self.config.channel = channel;
        self.write_reg(Register::CHANNR, channel)
    }

    /// Fixed packet length, or maximum length in variable length mode
    pub fn set_packet_length(&mut self, len: u8) -> Result<(), Error<CommsError, PinError>> {
        self.write_reg(Register::PKTLEN, len)
    }

    pub fn set_pqt(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl1, _>(|r| r.set_pqt(v)).map(|_| ())
    }

    pub fn set_crc_autoflush(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl1, _>(|r| r.set_crc_autoflush(on)).map(|_| ())
    }

    pub fn set_append_status(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl1, _>(|r| r.set_append_status(on)).map(|_| ())
    }

    pub fn set_address_check(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl1, _>(|r| r.set_address_check(v)).map(|_| ())
    }

    pub fn set_white_data(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl0, _>(|r| r.set_white_data(on)).map(|_| ())
    }

    pub fn set_packet_format(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl0, _>(|r| r.set_packet_format(v)).map(|_| ())
    }

    pub fn set_crc(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl0, _>(|r| r.set_crc(on)).map(|_| ())
    }

    pub fn set_length_config(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<PktCtrl0, _>(|r| r.set_length_config(v)).map(|_| ())
    }

    pub fn set_dc_filter_off(&mut self, off: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<MdmCfg2, _>(|r| r.set_dc_filter_off(off)).map(|_| ())
    }

    pub fn set_manchester(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<MdmCfg2, _>(|r| r.set_manchester(on)).map(|_| ())
    }

    pub fn set_sync_mode(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<MdmCfg2, _>(|r| r.set_sync_mode(v)).map(|_| ())
    }

    pub fn set_fec(&mut self, on: bool) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<MdmCfg1, _>(|r| r.set_fec(on)).map(|_| ())
    }

    pub fn set_preamble(&mut self, v: u8) -> Result<(), Error<CommsError, PinError>> {
        self.modify_fields::<MdmCfg1, _>(|r| r.set_preamble(v)).map(|_| ())
    }

    /// Current channel RSSI in dBm
    pub fn rssi(&mut self) -> Result<i16, Error<CommsError, PinError>> {
        let raw = self.hal.read_status(Status::RSSI)?;
        Ok(device::rssi_dbm(raw))
    }

    /// Raw link quality status
    pub fn lqi(&mut self) -> Result<u8, Error<CommsError, PinError>> {
        self.hal.read_status(Status::LQI)
    }

    /// Driver radio mode
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Last requested carrier frequency in MHz
    pub fn frequency(&self) -> f32 {
        self.frequency_mhz
    }

    /// Last requested output power in dBm
    pub fn power(&self) -> i8 {
        self.power_dbm
    }

    pub fn mod_format(&self) -> ModFormat {
        self.mod_format
    }

    pub fn cc_mode(&self) -> CcMode {
        self.cc_mode
    }

    /// PA table last written to the device
    pub fn pa_table(&self) -> &PowerTable {
        &self.pa_table
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release the underlying transport
    pub fn free(self) -> Base {
        self.hal
    }
}
