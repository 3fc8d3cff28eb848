//! CC1101 frequency synthesizer and calibration definitions
//!
//! Copyright 2019 Ryan Kurte

/// FREQ2 step in MHz
pub const FREQ2_STEP: f64 = 26.0;
/// FREQ1 step in MHz
pub const FREQ1_STEP: f64 = 0.1015625;
/// FREQ0 step in MHz
pub const FREQ0_STEP: f64 = 0.00039675;
/// Highest frequency the control word can express, all three bytes at 0xFF
pub const FREQ_MAX_MHZ: f64 = 255.0 * (FREQ2_STEP + FREQ1_STEP + FREQ0_STEP);

/// TEST0 value below the band edge sub-range
pub const TEST0_LOW: u8 = 0x0B;
/// TEST0 value above the band edge sub-range
pub const TEST0_HIGH: u8 = 0x09;

/// Supported frequency bands
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Band {
    /// 300 - 348 MHz
    Mhz315,
    /// 378 - 464 MHz
    Mhz433,
    /// 779 - 899.99 MHz
    Mhz868,
    /// 900 - 928 MHz
    Mhz915,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Mhz315, Band::Mhz433, Band::Mhz868, Band::Mhz915];

    /// Find the band containing a frequency
    pub fn from_mhz(mhz: f32) -> Option<Band> {
        match mhz {
            f if f >= 300.0 && f <= 348.0 => Some(Band::Mhz315),
            f if f >= 378.0 && f <= 464.0 => Some(Band::Mhz433),
            f if f >= 779.0 && f <= 899.99 => Some(Band::Mhz868),
            f if f >= 900.0 && f <= 928.0 => Some(Band::Mhz915),
            _ => None,
        }
    }

    /// Integer MHz range used for calibration interpolation
    pub fn interpolation_range(&self) -> (i32, i32) {
        match self {
            Band::Mhz315 => (300, 348),
            Band::Mhz433 => (378, 464),
            Band::Mhz868 => (779, 899),
            Band::Mhz915 => (900, 928),
        }
    }

    /// Frequency above which the upper TEST0 preset applies
    pub fn edge_mhz(&self) -> Option<f32> {
        match self {
            Band::Mhz315 => Some(322.88),
            Band::Mhz433 => Some(430.5),
            Band::Mhz868 => Some(861.0),
            Band::Mhz915 => None,
        }
    }

    /// TEST0 preset for a frequency within this band
    pub fn test0(&self, mhz: f32) -> u8 {
        match self.edge_mhz() {
            Some(edge) if mhz < edge => TEST0_LOW,
            _ => TEST0_HIGH,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Per-band FSCTRL0 calibration offsets, interpolated across the band
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CalibrationProfile {
    /// Offset at the bottom of the band
    pub low: u8,
    /// Offset at the top of the band
    pub high: u8,
}

impl CalibrationProfile {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// Default profile for a band
    pub fn default_for(band: Band) -> Self {
        match band {
            Band::Mhz315 => Self::new(24, 28),
            Band::Mhz433 => Self::new(31, 38),
            Band::Mhz868 => Self::new(65, 76),
            Band::Mhz915 => Self::new(77, 79),
        }
    }

    /// Linearly interpolate the offset for a frequency within `band`
    ///
    /// Uses whole MHz with integer arithmetic, matching the chip vendor tables.
    pub fn interpolate(&self, band: Band, mhz: f32) -> u8 {
        let (in_lo, in_hi) = band.interpolation_range();
        let x = (mhz as i32).max(in_lo).min(in_hi);
        let (lo, hi) = (self.low as i32, self.high as i32);

        let v = (x - in_lo) * (hi - lo) / (in_hi - in_lo) + lo;
        v.max(0).min(255) as u8
    }
}

/// Default calibration profiles, indexed by `Band::index`
pub fn default_profiles() -> [CalibrationProfile; 4] {
    [
        CalibrationProfile::default_for(Band::Mhz315),
        CalibrationProfile::default_for(Band::Mhz433),
        CalibrationProfile::default_for(Band::Mhz868),
        CalibrationProfile::default_for(Band::Mhz915),
    ]
}

/// FREQ2/FREQ1/FREQ0 frequency control word
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FrequencyWord {
    pub freq2: u8,
    pub freq1: u8,
    pub freq0: u8,
}

impl FrequencyWord {
    /// Clamp a requested frequency to the range the control word covers, NaN maps to zero
    pub fn clamp_mhz(mhz: f32) -> f32 {
        if mhz.is_nan() {
            return 0.0;
        }
        (mhz as f64).max(0.0).min(FREQ_MAX_MHZ) as f32
    }

    /// Compute the control word by greedy largest-step-first subtraction
    ///
    /// Input is clamped first, so each byte takes at most 256 subtractions.
    pub fn from_mhz(mhz: f32) -> Self {
        let mut rem = if mhz.is_nan() { 0.0 } else { (mhz as f64).max(0.0).min(FREQ_MAX_MHZ) };
        let (mut f2, mut f1, mut f0) = (0u32, 0u32, 0u32);

        while rem >= FREQ2_STEP {
            rem -= FREQ2_STEP;
            f2 += 1;
        }
        while rem >= FREQ1_STEP {
            rem -= FREQ1_STEP;
            f1 += 1;
        }
        while rem >= FREQ0_STEP {
            rem -= FREQ0_STEP;
            f0 += 1;
        }

        // FREQ0 step is slightly coarser than 1/256 of FREQ1
        if f0 > 255 {
            f1 += 1;
            f0 -= 256;
        }

        Self {
            freq2: f2.min(255) as u8,
            freq1: f1.min(255) as u8,
            freq0: f0 as u8,
        }
    }

    /// Frequency in MHz represented by this word
    pub fn to_mhz(&self) -> f32 {
        (self.freq2 as f64 * FREQ2_STEP
            + self.freq1 as f64 * FREQ1_STEP
            + self.freq0 as f64 * FREQ0_STEP) as f32
    }

    pub fn bytes(&self) -> [u8; 3] {
        [self.freq2, self.freq1, self.freq0]
    }
}

/// Per band PA output levels, from lowest to highest power
const PA_LEVELS_315: [u8; 8] = [0x12, 0x0D, 0x1C, 0x34, 0x51, 0x85, 0xCB, 0xC2];
const PA_LEVELS_433: [u8; 8] = [0x12, 0x0E, 0x1D, 0x34, 0x60, 0x84, 0xC8, 0xC0];
const PA_LEVELS_868: [u8; 10] = [0x03, 0x17, 0x1D, 0x26, 0x37, 0x50, 0x86, 0xCD, 0xC5, 0xC0];
const PA_LEVELS_915: [u8; 10] = [0x03, 0x0E, 0x1E, 0x27, 0x38, 0x8E, 0x84, 0xCC, 0xC3, 0xC0];

/// Upper dBm bound of each ladder step, the final step is open ended
const PA_STEPS_LOW_BANDS: [i8; 7] = [-30, -20, -15, -10, 0, 5, 7];
const PA_STEPS_HIGH_BANDS: [i8; 9] = [-30, -20, -15, -10, -6, 0, 5, 7, 10];

fn ladder(levels: &[u8], steps: &[i8], dbm: i8) -> u8 {
    let i = steps.iter().position(|s| dbm <= *s).unwrap_or(steps.len());
    levels[i]
}

/// Select the PA output level for a requested power in a band
pub fn pa_level(band: Band, dbm: i8) -> u8 {
    match band {
        Band::Mhz315 => ladder(&PA_LEVELS_315, &PA_STEPS_LOW_BANDS, dbm),
        Band::Mhz433 => ladder(&PA_LEVELS_433, &PA_STEPS_LOW_BANDS, dbm),
        Band::Mhz868 => ladder(&PA_LEVELS_868, &PA_STEPS_HIGH_BANDS, dbm),
        Band::Mhz915 => ladder(&PA_LEVELS_915, &PA_STEPS_HIGH_BANDS, dbm),
    }
}

/// Size of the chip PA table
pub const PA_TABLE_LEN: usize = 8;

/// PATABLE contents, entries 0 and 1 hold the off / on output levels
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct PowerTable(pub [u8; PA_TABLE_LEN]);

impl PowerTable {
    /// Build a table for a PA level, ASK keys between entry 0 (off) and entry 1 (on)
    pub fn new(level: u8, ask: bool) -> Self {
        let mut t = [0u8; PA_TABLE_LEN];
        if ask {
            t[1] = level;
        } else {
            t[0] = level;
        }
        PowerTable(t)
    }

    /// The active output level
    pub fn level(&self) -> u8 {
        self.0[0].max(self.0[1])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
