//! CC1101 link parameter encoding
//!
//! Data rate, deviation, RX filter bandwidth and channel spacing are all stored as
//! exponent / mantissa pairs. Encoding reduces the requested value by a bounded number
//! of halving (or scaling) steps, decoding applies the datasheet formulae.
//!
//! Copyright 2019 Ryan Kurte

/// Crystal frequency in kHz
pub const XTAL_KHZ: f32 = 26_000.0;

pub const DATA_RATE_MIN_KBPS: f32 = 0.0247955;
pub const DATA_RATE_MAX_KBPS: f32 = 1621.83;
const DATA_RATE_STEP_LIMIT: f32 = 0.0494942;
const DATA_RATE_MANTISSA_STEP: f32 = 0.00009685;
const DATA_RATE_ITERATIONS: usize = 20;

pub const DEVIATION_MIN_KHZ: f32 = 1.586914;
pub const DEVIATION_MAX_KHZ: f32 = 380.859375;
const DEVIATION_STEP_KHZ: f32 = 0.19836425;

const RX_BW_HALVING_LIMIT: f32 = 101.5625;
const RX_BW_SCALING_LIMIT: f32 = 58.1;

pub const CHANNEL_SPACING_MIN_KHZ: f32 = 25.390625;
pub const CHANNEL_SPACING_MAX_KHZ: f32 = 405.456543;
const CHANNEL_SPACING_STEP_LIMIT: f32 = 50.682068;
const CHANNEL_SPACING_MANTISSA_STEP: f32 = 0.0991825;
const CHANNEL_SPACING_ITERATIONS: usize = 5;

/// Clamp to `[min, max]`, NaN maps to `min`
fn clamp(v: f32, min: f32, max: f32) -> f32 {
    if v.is_nan() {
        min
    } else if v > max {
        max
    } else if v < min {
        min
    } else {
        v
    }
}

/// Truncate to a mantissa, rounding up when the first decimal is 5 or more
fn round_half_up(v: f32) -> u32 {
    let whole = v as u32;
    let frac = (v - whole as f32) * 10.0;
    if frac >= 5.0 {
        whole + 1
    } else {
        whole
    }
}

/// Exponent / mantissa pair, carrying a rounded-up mantissa of 256 into the exponent
fn mantissa(e: u8, v: f32, e_max: u8) -> (u8, u8) {
    match round_half_up(v) {
        m if m <= 255 => (e, m as u8),
        _ if e < e_max => (e + 1, 0),
        _ => (e_max, 255),
    }
}

/// Data rate exponent (MDMCFG4[3:0]) and mantissa (MDMCFG3)
pub fn encode_data_rate(kbps: f32) -> (u8, u8) {
    let mut c = clamp(kbps, DATA_RATE_MIN_KBPS, DATA_RATE_MAX_KBPS);
    let mut e = 0u8;

    for _ in 0..DATA_RATE_ITERATIONS {
        if c <= DATA_RATE_STEP_LIMIT {
            // The exponent field is four bits wide
            if e > 15 {
                return (15, 255);
            }
            let m = (c - DATA_RATE_MIN_KBPS) / DATA_RATE_MANTISSA_STEP;
            return mantissa(e, m, 15);
        }
        e += 1;
        c /= 2.0;
    }

    (15, 255)
}

/// Data rate in kbps for an exponent / mantissa pair
pub fn decode_data_rate(e: u8, m: u8) -> f32 {
    let scale = (1u64 << (e & 0x0F)) as f32;
    (256.0 + m as f32) * scale * XTAL_KHZ / (1u64 << 28) as f32
}

/// Raw DEVIATN value for a deviation in kHz
///
/// Walks the deviation progression, where the step doubles every eight mantissa counts,
/// until the requested value is reached.
pub fn encode_deviation(khz: f32) -> u8 {
    let d = clamp(khz, DEVIATION_MIN_KHZ, DEVIATION_MAX_KHZ);

    let mut f = DEVIATION_MIN_KHZ;
    let mut v = DEVIATION_STEP_KHZ;
    let mut c: i32 = 0;
    let mut i: i32 = 0;

    while i < 255 {
        f += v;
        if c == 7 {
            v *= 2.0;
            c = -1;
            i += 8;
        }
        if f >= d {
            c = i;
            i = 255;
        }
        c += 1;
        i += 1;
    }

    c.max(0).min(0x77) as u8
}

/// Deviation in kHz for a raw DEVIATN value
pub fn decode_deviation(v: u8) -> f32 {
    let e = (v >> 4) & 0x07;
    let m = v & 0x07;
    XTAL_KHZ / (1u32 << 17) as f32 * (8.0 + m as f32) * (1u32 << e) as f32
}

/// Pre-shifted MDMCFG4[7:4] RX filter bandwidth field for a bandwidth in kHz
pub fn encode_rx_bandwidth(khz: f32) -> u8 {
    // NaN selects the narrowest filter
    let mut f = if khz.is_nan() { 0.0 } else { khz };
    let mut e: u8 = 3;
    let mut m: u8 = 3;

    for _ in 0..3 {
        if f > RX_BW_HALVING_LIMIT {
            f /= 2.0;
            e -= 1;
        } else {
            break;
        }
    }

    for _ in 0..3 {
        if f > RX_BW_SCALING_LIMIT {
            f /= 1.25;
            m -= 1;
        } else {
            break;
        }
    }

    e * 64 + m * 16
}

/// RX filter bandwidth in kHz for a pre-shifted MDMCFG4 field
pub fn decode_rx_bandwidth(field: u8) -> f32 {
    let e = (field >> 6) & 0x03;
    let m = (field >> 4) & 0x03;
    XTAL_KHZ / (8.0 * (4.0 + m as f32) * (1u32 << e) as f32)
}

/// Channel spacing exponent (MDMCFG1[1:0]) and mantissa (MDMCFG0)
pub fn encode_channel_spacing(khz: f32) -> (u8, u8) {
    let mut f = clamp(khz, CHANNEL_SPACING_MIN_KHZ, CHANNEL_SPACING_MAX_KHZ);
    let mut e = 0u8;

    for _ in 0..CHANNEL_SPACING_ITERATIONS {
        if f <= CHANNEL_SPACING_STEP_LIMIT {
            let m = (f - CHANNEL_SPACING_MIN_KHZ) / CHANNEL_SPACING_MANTISSA_STEP;
            return mantissa(e.min(3), m, 3);
        }
        e += 1;
        f /= 2.0;
    }

    (e.min(3), 0)
}

/// Channel spacing in kHz for an exponent / mantissa pair
pub fn decode_channel_spacing(e: u8, m: u8) -> f32 {
    XTAL_KHZ / (1u32 << 18) as f32 * (256.0 + m as f32) * (1u32 << (e & 0x03)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn data_rate_4800() {
        let (e, m) = encode_data_rate(4.8);
        assert_eq!((e, m), (7, 131));

        // Within one mantissa count of the request
        let step = decode_data_rate(e, m) - decode_data_rate(e, m - 1);
        assert!(close(decode_data_rate(e, m), 4.8, step));
    }

    #[test]
    fn data_rate_clamps() {
        let (e, m) = encode_data_rate(0.0);
        assert_eq!((e, m), (0, 0));
        assert!(close(decode_data_rate(e, m), DATA_RATE_MIN_KBPS, 0.0001));

        let (e, m) = encode_data_rate(5000.0);
        assert_eq!(e, 15);
        assert!(close(decode_data_rate(e, m), DATA_RATE_MAX_KBPS, 10.0));
    }

    #[test]
    fn data_rate_tracks_requests() {
        for kbps in [1.2f32, 2.4, 9.6, 38.4, 99.97, 250.0, 500.0].iter() {
            let (e, m) = encode_data_rate(*kbps);
            let got = decode_data_rate(e, m);
            assert!(close(got, *kbps, kbps * 0.01), "{} -> {}", kbps, got);
        }
    }

    #[test]
    fn deviation_presets() {
        assert_eq!(encode_deviation(5.0), 0x15);
        assert!(close(decode_deviation(0x15), 5.157, 0.01));

        // The register default decodes to ~47.6 kHz
        assert!(close(decode_deviation(0x47), 47.607, 0.01));

        // Zero clamps to the smallest deviation
        assert_eq!(encode_deviation(0.0), 0x01);

        let v = encode_deviation(2.4);
        assert!(decode_deviation(v) >= 2.4);
    }

    #[test]
    fn deviation_reaches_request() {
        for khz in [1.6f32, 2.4, 5.0, 10.0, 20.0, 47.6, 100.0, 200.0].iter() {
            let v = encode_deviation(*khz);
            let got = decode_deviation(v);
            assert!(got >= khz - 0.001 && got < khz * 1.2 + 0.2, "{} -> {}", khz, got);
        }
    }

    #[test]
    fn rx_bandwidth() {
        assert_eq!(encode_rx_bandwidth(812.0), 0x00);
        assert_eq!(encode_rx_bandwidth(58.0), 0xF0);
        assert_eq!(encode_rx_bandwidth(203.0), 0x80);

        assert!(close(decode_rx_bandwidth(0x00), 812.5, 0.1));
        assert!(close(decode_rx_bandwidth(0xF0), 58.04, 0.1));
        assert!(close(decode_rx_bandwidth(0x80), 203.125, 0.1));
    }

    #[test]
    fn channel_spacing() {
        let (e, m) = encode_channel_spacing(199.95);
        assert_eq!((e, m), (2, 0xF8));
        assert!(close(decode_channel_spacing(e, m), 199.95, 0.1));

        assert_eq!(encode_channel_spacing(1.0), (0, 0));
        let (e, _) = encode_channel_spacing(1000.0);
        assert_eq!(e, 3);
    }

    #[test]
    fn mantissa_rounding_carries_into_exponent() {
        assert_eq!(mantissa(3, 254.4, 15), (3, 254));
        assert_eq!(mantissa(3, 254.5, 15), (3, 255));
        assert_eq!(mantissa(3, 255.5, 15), (4, 0));
        // Exponent already at its field limit
        assert_eq!(mantissa(15, 255.5, 15), (15, 255));
        assert_eq!(mantissa(3, 255.7, 3), (3, 255));
    }

    #[test]
    fn non_finite_requests_clamp() {
        assert_eq!(encode_data_rate(f32::NAN), (0, 0));
        assert_eq!(encode_data_rate(-9.6), (0, 0));
        assert_eq!(encode_data_rate(f32::INFINITY), encode_data_rate(DATA_RATE_MAX_KBPS));

        assert_eq!(encode_deviation(f32::NAN), encode_deviation(DEVIATION_MIN_KHZ));
        assert_eq!(encode_deviation(f32::INFINITY), encode_deviation(DEVIATION_MAX_KHZ));
        assert!(encode_deviation(f32::INFINITY) <= 0x77);

        assert_eq!(encode_rx_bandwidth(f32::NAN), 0xF0);
        assert_eq!(encode_rx_bandwidth(-100.0), 0xF0);
        assert_eq!(encode_rx_bandwidth(f32::INFINITY), 0x00);

        assert_eq!(encode_channel_spacing(f32::NAN), (0, 0));
        assert_eq!(encode_channel_spacing(f32::INFINITY), encode_channel_spacing(CHANNEL_SPACING_MAX_KHZ));
    }
}
