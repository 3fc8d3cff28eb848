//! Transceiver abstraction and frequency sweep engine
//!
//! Wraps each radio on the board (two CC1101s, a long range radio and two short range
//! radios) behind one set of operations, dispatched over a closed set of variants.
//! Captured and sampled data is handed to an [`EventSink`] as [`RadioSignalSample`]s.
//!
//! Copyright 2019 Ryan Kurte

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::{Deque, String, Vec};

use crate::base::Base as Cc1101Base;
use crate::device::calibration::FREQ_MAX_MHZ;
use crate::device::{ModFormat, RadioMode, FIFO_SIZE};
use crate::{Cc1101, Error};

/// Settle time between re-entering receive and sampling RSSI during a sweep
pub const SWEEP_SETTLE_MS: u32 = 1;

/// Settle time for a packet to complete once RX FIFO data is seen
pub const RX_SETTLE_MS: u32 = 5;

/// Maximum payload carried by a sample
pub const SAMPLE_PAYLOAD_LEN: usize = FIFO_SIZE;

/// Maximum length of a sample tag
pub const SAMPLE_TAG_LEN: usize = 32;

/// Module identifiers shared with the outward control protocol
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ModuleId {
    Cc1101Primary = 0,
    Cc1101Secondary = 1,
    LongRange = 2,
    Nfc = 3,
    WiFi = 4,
    Bluetooth = 5,
    Ir = 6,
}

impl From<ModuleId> for u8 {
    fn from(id: ModuleId) -> u8 {
        id as u8
    }
}

/// Sweep / receive modulation selection
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Modulation {
    Ook,
    Ask,
    Fsk2,
    Gfsk,
    Msk,
    Unknown,
}

/// Chip settings applied for a modulation
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ModulationPreset {
    pub mod_format: ModFormat,
    pub data_rate_kbps: f32,
    pub deviation_khz: f32,
}

impl Modulation {
    /// Parse a control protocol modulation name
    pub fn from_name(name: &str) -> Option<Modulation> {
        let m = match name {
            "OOK" => Modulation::Ook,
            "ASK" => Modulation::Ask,
            "2-FSK" | "2FSK" => Modulation::Fsk2,
            "GFSK" => Modulation::Gfsk,
            "MSK" => Modulation::Msk,
            _ => return None,
        };
        Some(m)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modulation::Ook => "OOK",
            Modulation::Ask => "ASK",
            Modulation::Fsk2 => "2-FSK",
            Modulation::Gfsk => "GFSK",
            Modulation::Msk => "MSK",
            Modulation::Unknown => "UNKNOWN",
        }
    }

    /// Sweep step in kHz, amplitude keyed modes use a finer step
    pub fn step_khz(&self) -> u32 {
        match self {
            Modulation::Ook | Modulation::Ask => 100,
            _ => 200,
        }
    }

    /// Chip settings for this modulation, MSK runs as narrow deviation 2-FSK
    pub fn preset(&self) -> Option<ModulationPreset> {
        let (mod_format, deviation_khz) = match self {
            Modulation::Ook | Modulation::Ask => (ModFormat::Ask, 0.0),
            Modulation::Fsk2 => (ModFormat::Fsk2, 5.0),
            Modulation::Gfsk => (ModFormat::Gfsk, 5.0),
            Modulation::Msk => (ModFormat::Fsk2, 2.4),
            Modulation::Unknown => return None,
        };

        Some(ModulationPreset {
            mod_format,
            data_rate_kbps: 4.8,
            deviation_khz,
        })
    }
}

/// Sweep band in MHz, the bounds may be given in either order
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanBand {
    /// Lower bound (defaults to 300 MHz)
    pub low_mhz: f32,
    /// Upper bound (defaults to 928 MHz)
    pub high_mhz: f32,
}

impl Default for ScanBand {
    fn default() -> Self {
        Self {
            low_mhz: 300.0,
            high_mhz: 928.0,
        }
    }
}

/// Whole kHz within the synthesizer range, NaN maps to zero
fn mhz_to_khz(mhz: f32) -> u32 {
    if mhz.is_nan() || mhz <= 0.0 {
        return 0;
    }
    ((mhz as f64).min(FREQ_MAX_MHZ) * 1000.0 + 0.5) as u32
}

impl ScanBand {
    pub fn new(low_mhz: f32, high_mhz: f32) -> Self {
        Self { low_mhz, high_mhz }
    }

    /// Bounds in kHz, ordered low to high
    pub fn bounds_khz(&self) -> (u32, u32) {
        let (a, b) = (mhz_to_khz(self.low_mhz), mhz_to_khz(self.high_mhz));
        if b < a {
            (b, a)
        } else {
            (a, b)
        }
    }

    /// Number of sweep steps, both bounds inclusive, a zero step is treated as 1 kHz
    pub fn steps(&self, step_khz: u32) -> usize {
        let (low, high) = self.bounds_khz();
        ((high - low) / step_khz.max(1)) as usize + 1
    }

    /// Frequency of sweep step `n` in MHz, saturating at the upper bound
    pub fn step_mhz(&self, step_khz: u32, n: usize) -> f32 {
        let (low, high) = self.bounds_khz();
        let offset = (step_khz.max(1) as u64).saturating_mul(n as u64);
        (low as u64 + offset).min(high as u64) as f32 / 1000.0
    }
}

/// A captured packet or signal strength sample
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RadioSignalSample {
    pub timestamp_ms: u64,
    pub module: ModuleId,
    pub frequency_mhz: f32,
    pub rssi_dbm: i32,
    pub payload: Vec<u8, SAMPLE_PAYLOAD_LEN>,
    pub extra: String<SAMPLE_TAG_LEN>,
}

impl RadioSignalSample {
    /// Build a sample, truncating payload and tag to the sample capacity
    pub fn new(timestamp_ms: u64, module: ModuleId, frequency_mhz: f32, rssi_dbm: i32, payload: &[u8], extra: &str) -> Self {
        let n = payload.len().min(SAMPLE_PAYLOAD_LEN);
        if n < payload.len() {
            warn!("Sample payload of {} bytes truncated to {}", payload.len(), n);
        }

        let mut bytes = Vec::new();
        // Length bounded above
        let _ = bytes.extend_from_slice(&payload[..n]);

        let mut tag = String::new();
        for c in extra.chars() {
            if tag.push(c).is_err() {
                break;
            }
        }

        Self {
            timestamp_ms,
            module,
            frequency_mhz,
            rssi_dbm,
            payload: bytes,
            extra: tag,
        }
    }
}

/// Consumer of radio samples, must not block
pub trait EventSink {
    fn enqueue(&mut self, sample: RadioSignalSample);
}

impl<F> EventSink for F
where
    F: FnMut(RadioSignalSample),
{
    fn enqueue(&mut self, sample: RadioSignalSample) {
        self(sample)
    }
}

/// Bounded queue sink, drops new samples when full
impl<const N: usize> EventSink for Deque<RadioSignalSample, N> {
    fn enqueue(&mut self, sample: RadioSignalSample) {
        if self.push_back(sample).is_err() {
            warn!("Sample queue full, dropping sample");
        }
    }
}

/// Cooperative cancellation flag for sweeps, cleared by the controller to stop scanning
#[derive(Debug, Default)]
pub struct ScanFlag(AtomicBool);

impl ScanFlag {
    pub const fn new(active: bool) -> Self {
        Self(AtomicBool::new(active))
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::Release)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release)
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Packet captured by a non CC1101 peripheral
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Capture {
    pub len: usize,
    pub frequency_mhz: f32,
    pub rssi_dbm: i32,
}

/// Receive path of a radio driven by another driver on the same bus
pub trait Peripheral<CommsError, PinError> {
    /// Service the receive path once, returning any captured packet in `buff`
    fn read(&mut self, buff: &mut [u8]) -> Result<Option<Capture>, Error<CommsError, PinError>>;

    /// Current time in milliseconds
    fn now_ms(&mut self) -> u64;
}

/// CC1101 backed transceiver with sweep support
pub struct ChipTransceiver<Base, CommsError, PinError> {
    chip: Cc1101<Base, CommsError, PinError>,
    module: ModuleId,
    modulation: Modulation,
    band: ScanBand,
    receiving: bool,
}

impl<Base, CommsError, PinError> ChipTransceiver<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
{
    pub fn new(chip: Cc1101<Base, CommsError, PinError>, module: ModuleId, modulation: Modulation) -> Self {
        Self {
            chip,
            module,
            modulation,
            band: ScanBand::default(),
            receiving: false,
        }
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn band(&self) -> ScanBand {
        self.band
    }

    pub fn set_band(&mut self, band: ScanBand) {
        self.band = band;
    }

    pub fn set_top_frequency(&mut self, mhz: f32) {
        self.band.high_mhz = mhz;
    }

    pub fn set_bottom_frequency(&mut self, mhz: f32) {
        self.band.low_mhz = mhz;
    }

    pub fn chip(&mut self) -> &mut Cc1101<Base, CommsError, PinError> {
        &mut self.chip
    }

    /// Reprogram the chip for a named modulation, returning false (with no chip access)
    /// for unrecognised names
    pub fn set_modulation(&mut self, name: &str) -> Result<bool, Error<CommsError, PinError>> {
        let (modulation, preset) = match Modulation::from_name(name).and_then(|m| m.preset().map(|p| (m, p))) {
            Some(v) => v,
            None => {
                warn!("Unrecognised modulation '{}', keeping {:?}", name, self.modulation);
                return Ok(false);
            }
        };

        debug!("{:?} modulation {:?}: {:?}", self.module, modulation, preset);

        self.chip.set_idle()?;

        self.chip.set_mod_format(preset.mod_format)?;
        self.chip.set_data_rate(preset.data_rate_kbps)?;
        self.chip.set_deviation(preset.deviation_khz)?;

        self.chip.set_rx()?;

        self.modulation = modulation;

        Ok(true)
    }

    /// Sweep the scan band, emitting one RSSI sample per step
    ///
    /// Stops before the next step once `flag` is cleared, returning the number of samples emitted.
    pub fn scan_range<S>(&mut self, flag: &ScanFlag, sink: &mut S) -> Result<usize, Error<CommsError, PinError>>
    where
        S: EventSink + ?Sized,
    {
        let step_khz = self.modulation.step_khz();
        let steps = self.band.steps(step_khz);

        debug!("{:?} sweep {:?} in {} kHz steps ({} steps)", self.module, self.band, step_khz, steps);

        if let Some(p) = self.modulation.preset() {
            self.chip.set_mod_format(p.mod_format)?;
        }

        let mut emitted = 0;

        for n in 0..steps {
            if !flag.is_active() {
                debug!("Sweep cancelled after {} of {} steps", n, steps);
                break;
            }

            let mhz = self.band.step_mhz(step_khz, n);

            self.chip.set_rx_at(mhz)?;
            self.chip.hal.delay_ms(SWEEP_SETTLE_MS);
            let rssi = self.chip.rssi()?;

            let timestamp = self.chip.hal.now_ms();
            sink.enqueue(RadioSignalSample::new(timestamp, self.module, mhz, rssi as i32, &[], self.modulation.name()));

            emitted += 1;
        }

        Ok(emitted)
    }

    /// Fetch a pending packet if one is available, returning whether a sample was emitted
    fn read<S>(&mut self, sink: &mut S) -> Result<bool, Error<CommsError, PinError>>
    where
        S: EventSink + ?Sized,
    {
        if !self.chip.check_rx_fifo(RX_SETTLE_MS)? {
            return Ok(false);
        }

        let mut buff = [0u8; FIFO_SIZE];
        let (n, info) = self.chip.receive(&mut buff)?;

        if n == 0 {
            return Ok(false);
        }

        if !info.crc_ok {
            warn!("{:?} dropping packet with failed CRC", self.module);
            return Ok(false);
        }

        let timestamp = self.chip.hal.now_ms();
        let mhz = self.chip.frequency();
        sink.enqueue(RadioSignalSample::new(timestamp, self.module, mhz, info.rssi as i32, &buff[..n], ""));

        Ok(true)
    }
}

/// Transceiver wrapping a radio with its own driver
pub struct PeripheralTransceiver<P> {
    dev: P,
    module: ModuleId,
    receiving: bool,
}

impl<P> PeripheralTransceiver<P> {
    pub fn new(dev: P, module: ModuleId) -> Self {
        Self {
            dev,
            module,
            receiving: false,
        }
    }

    pub fn inner(&mut self) -> &mut P {
        &mut self.dev
    }
}

/// Board transceivers, one variant per physical radio
pub enum Transceiver<Base, CommsError, PinError, Lr, Sr> {
    Cc1101Primary(ChipTransceiver<Base, CommsError, PinError>),
    Cc1101Secondary(ChipTransceiver<Base, CommsError, PinError>),
    LongRange(PeripheralTransceiver<Lr>),
    ShortRangeA(PeripheralTransceiver<Sr>),
    ShortRangeB(PeripheralTransceiver<Sr>),
}

impl<Base, CommsError, PinError, Lr, Sr> Transceiver<Base, CommsError, PinError, Lr, Sr>
where
    Base: Cc1101Base<CommsError, PinError>,
    Lr: Peripheral<CommsError, PinError>,
    Sr: Peripheral<CommsError, PinError>,
{
    /// Primary CC1101, defaults to OOK
    pub fn cc1101_primary(chip: Cc1101<Base, CommsError, PinError>) -> Self {
        Transceiver::Cc1101Primary(ChipTransceiver::new(chip, ModuleId::Cc1101Primary, Modulation::Ook))
    }

    /// Secondary CC1101, modulation unset until configured
    pub fn cc1101_secondary(chip: Cc1101<Base, CommsError, PinError>) -> Self {
        Transceiver::Cc1101Secondary(ChipTransceiver::new(chip, ModuleId::Cc1101Secondary, Modulation::Unknown))
    }

    pub fn long_range(dev: Lr) -> Self {
        Transceiver::LongRange(PeripheralTransceiver::new(dev, ModuleId::LongRange))
    }

    pub fn short_range_a(dev: Sr) -> Self {
        Transceiver::ShortRangeA(PeripheralTransceiver::new(dev, ModuleId::Bluetooth))
    }

    pub fn short_range_b(dev: Sr) -> Self {
        Transceiver::ShortRangeB(PeripheralTransceiver::new(dev, ModuleId::Bluetooth))
    }

    pub fn module(&self) -> ModuleId {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.module,
            Transceiver::LongRange(t) => t.module,
            Transceiver::ShortRangeA(t) | Transceiver::ShortRangeB(t) => t.module,
        }
    }

    fn receiving_mut(&mut self) -> &mut bool {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => &mut t.receiving,
            Transceiver::LongRange(t) => &mut t.receiving,
            Transceiver::ShortRangeA(t) | Transceiver::ShortRangeB(t) => &mut t.receiving,
        }
    }

    fn now_ms(&mut self) -> u64 {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.chip.hal.now_ms(),
            Transceiver::LongRange(t) => t.dev.now_ms(),
            Transceiver::ShortRangeA(t) | Transceiver::ShortRangeB(t) => t.dev.now_ms(),
        }
    }

    /// Forward a payload to the sink tagged with this module, never touches the radio
    pub fn send_packet<S>(&mut self, payload: &[u8], frequency_mhz: f32, rssi_dbm: i32, extra: &str, sink: &mut S) -> bool
    where
        S: EventSink + ?Sized,
    {
        let timestamp = self.now_ms();
        let module = self.module();

        sink.enqueue(RadioSignalSample::new(timestamp, module, frequency_mhz, rssi_dbm, payload, extra));

        true
    }

    pub fn start_receive_loop(&mut self) {
        *self.receiving_mut() = true;
    }

    pub fn stop_receive_loop(&mut self) {
        *self.receiving_mut() = false;
    }

    pub fn is_receiving(&self) -> bool {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.receiving,
            Transceiver::LongRange(t) => t.receiving,
            Transceiver::ShortRangeA(t) | Transceiver::ShortRangeB(t) => t.receiving,
        }
    }

    /// Service the receive loop once, no-op unless the loop is active
    pub fn poll<S>(&mut self, sink: &mut S) -> Result<bool, Error<CommsError, PinError>>
    where
        S: EventSink + ?Sized,
    {
        if !self.is_receiving() {
            return Ok(false);
        }

        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.read(sink),
            Transceiver::LongRange(t) => poll_peripheral(t, sink),
            Transceiver::ShortRangeA(t) | Transceiver::ShortRangeB(t) => poll_peripheral(t, sink),
        }
    }

    /// Apply a named modulation to CC1101 variants, others report false
    pub fn set_modulation(&mut self, name: &str) -> Result<bool, Error<CommsError, PinError>> {
        let module = self.module();

        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.set_modulation(name),
            _ => {
                warn!("{:?} does not support modulation selection", module);
                Ok(false)
            }
        }
    }

    /// Sweep the configured band on CC1101 variants, others emit nothing
    pub fn scan_range<S>(&mut self, flag: &ScanFlag, sink: &mut S) -> Result<usize, Error<CommsError, PinError>>
    where
        S: EventSink + ?Sized,
    {
        let module = self.module();

        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => t.scan_range(flag, sink),
            _ => {
                warn!("{:?} does not support sweeping", module);
                Ok(0)
            }
        }
    }

    /// CC1101 transceiver, if this is a CC1101 variant
    pub fn chip_transceiver(&mut self) -> Option<&mut ChipTransceiver<Base, CommsError, PinError>> {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => Some(t),
            _ => None,
        }
    }

    /// Current chip RSSI, mode and LQI for CC1101 variants
    pub fn chip_status(&mut self) -> Result<Option<(i16, u8, RadioMode)>, Error<CommsError, PinError>> {
        match self {
            Transceiver::Cc1101Primary(t) | Transceiver::Cc1101Secondary(t) => {
                let rssi = t.chip.rssi()?;
                let lqi = t.chip.lqi()?;
                Ok(Some((rssi, lqi, t.chip.mode())))
            }
            _ => Ok(None),
        }
    }
}

fn poll_peripheral<P, S, CommsError, PinError>(
    t: &mut PeripheralTransceiver<P>,
    sink: &mut S,
) -> Result<bool, Error<CommsError, PinError>>
where
    P: Peripheral<CommsError, PinError>,
    S: EventSink + ?Sized,
{
    let mut buff = [0u8; SAMPLE_PAYLOAD_LEN];

    let capture = match t.dev.read(&mut buff)? {
        Some(c) => c,
        None => return Ok(false),
    };

    let n = capture.len.min(buff.len());
    let timestamp = t.dev.now_ms();
    sink.enqueue(RadioSignalSample::new(
        timestamp,
        t.module,
        capture.frequency_mhz,
        capture.rssi_dbm,
        &buff[..n],
        "",
    ));

    Ok(true)
}
