//! # Fixed-Point Decoding
//!
//! Converts raw integer sample fields into physical units, and implements the
//! "smallest-three" quaternion compression and packed-sample gyro-integration schemes
//! used by the `Quat`/`Packed` sensor-data encodings.

use crate::constants::{ACC, DELTA, GYR, GYR_BIAS, MAG};

/// Converts a raw gyroscope count to radians/second.
pub fn gyr_to_rad_s(raw: i16) -> f64 {
    raw as f64 * GYR
}

/// Converts a raw accelerometer count to meters/second^2.
pub fn acc_to_m_s2(raw: i16) -> f64 {
    raw as f64 * ACC
}

/// Converts a raw magnetometer count to microtesla.
pub fn mag_to_ut(raw: i16) -> f64 {
    raw as f64 * MAG
}

/// Converts a raw heading-delta count to radians.
pub fn delta_to_rad(raw: i16) -> f64 {
    raw as f64 * DELTA
}

/// Converts a raw gyroscope-bias count to radians/second.
pub fn gyr_bias_to_rad_s(raw: i16) -> f64 {
    raw as f64 * GYR_BIAS
}

/// A unit quaternion in scalar-last (x, y, z, w) order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

/// Flags packed alongside a smallest-three quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuatFlags {
    pub rest_detected: bool,
    pub mag_dist_detected: bool,
}

/// One component of a 64-bit smallest-three quaternion: 20 bits, signed fixed-point over
/// `[-1/sqrt(2), 1/sqrt(2)]`.
const COMPONENT_BITS: u32 = 20;
const COMPONENT_MAX: i64 = (1i64 << COMPONENT_BITS) - 1;
/// Magnitude bound of the three smallest components; the omitted (largest) component is
/// always positive and reconstructed from `sqrt(1 - sum of squares)`.
const COMPONENT_RANGE: f64 = std::f64::consts::FRAC_1_SQRT_2;

fn encode_component(value: f64) -> u32 {
    let clamped = value.clamp(-COMPONENT_RANGE, COMPONENT_RANGE);
    let scaled = ((clamped + COMPONENT_RANGE) / (2.0 * COMPONENT_RANGE) * COMPONENT_MAX as f64)
        .round() as i64;
    scaled.clamp(0, COMPONENT_MAX) as u32
}

fn decode_component(raw: u32) -> f64 {
    (raw as f64 / COMPONENT_MAX as f64) * (2.0 * COMPONENT_RANGE) - COMPONENT_RANGE
}

/// Decodes a 64-bit smallest-three quaternion word.
///
/// Bit layout, MSB to LSB:
/// - bit 63: `magDistDetected`
/// - bit 62: `restDetected`
/// - bits 61..60: index (0..=3) of the omitted (largest-magnitude) component, in (x, y, z, w) order
/// - bits 59..40: third smallest component (20 bits)
/// - bits 39..20: second smallest component (20 bits)
/// - bits 19..0: first smallest component (20 bits)
pub fn decode_smallest_three(word: u64) -> (Quaternion, QuatFlags) {
    let mag_dist_detected = (word >> 63) & 1 != 0;
    let rest_detected = (word >> 62) & 1 != 0;
    let axis = ((word >> 60) & 0b11) as usize;

    // Reading from the lowest-placed 20-bit field upward, the stored components correspond
    // to indices (axis+3)%4, (axis+2)%4, (axis+1)%4.
    let c_low = decode_component((word & 0xFFFFF) as u32);
    let c_mid = decode_component(((word >> 20) & 0xFFFFF) as u32);
    let c_high = decode_component(((word >> 40) & 0xFFFFF) as u32);

    let sum_sq = c_low * c_low + c_mid * c_mid + c_high * c_high;
    let omitted = (1.0 - sum_sq).max(0.0).sqrt();

    let mut components = [0.0f64; 4];
    components[axis] = omitted;
    components[(axis + 3) % 4] = c_low;
    components[(axis + 2) % 4] = c_mid;
    components[(axis + 1) % 4] = c_high;

    (
        Quaternion {
            x: components[0],
            y: components[1],
            z: components[2],
            w: components[3],
        },
        QuatFlags {
            rest_detected,
            mag_dist_detected,
        },
    )
}

/// Encodes a unit quaternion into the smallest-three representation, omitting whichever
/// of (x, y, z, w) has the largest magnitude and normalizing its sign to positive.
pub fn encode_smallest_three(q: Quaternion, flags: QuatFlags) -> u64 {
    let components = [q.x, q.y, q.z, q.w];
    let (axis, _) = components
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.abs().partial_cmp(&b.abs()).unwrap())
        .unwrap();

    // The omitted component is reconstructed as a non-negative square root on decode, so the
    // sign of the whole quaternion must be normalized to make the omitted component positive.
    let sign = if components[axis] < 0.0 { -1.0 } else { 1.0 };

    let c_low = encode_component(components[(axis + 3) % 4] * sign) as u64;
    let c_mid = encode_component(components[(axis + 2) % 4] * sign) as u64;
    let c_high = encode_component(components[(axis + 1) % 4] * sign) as u64;

    let mut word = 0u64;
    word |= (flags.mag_dist_detected as u64) << 63;
    word |= (flags.rest_detected as u64) << 62;
    word |= (axis as u64) << 60;
    word |= c_high << 40;
    word |= c_mid << 20;
    word |= c_low;
    word
}

/// Reconstructs the next orientation from a gyro-integration "packed sample": applies the
/// Hamilton quaternion product of `previous` with the small rotation implied by
/// `angular_velocity` (rad/s) over `dt` seconds.
///
/// Uses the half-angle small-angle mapping `sin(theta/2) ~= theta/2` with a Taylor-series
/// correction term, falling back to the exact `sin`/`cos` when the angle isn't small, so the
/// reconstruction stays accurate across the whole range of device-reported angular rates.
pub fn integrate_packed_sample(
    previous: Quaternion,
    angular_velocity: [f64; 3],
    dt: f64,
) -> Quaternion {
    let omega = (angular_velocity[0].powi(2)
        + angular_velocity[1].powi(2)
        + angular_velocity[2].powi(2))
    .sqrt();
    let theta = omega * dt;
    let half = theta / 2.0;

    // Small-angle Taylor expansion of sin(x)/x around 0, good to 1e-9 for |x| < 1e-2.
    const SMALL_ANGLE_THRESHOLD: f64 = 1e-3;
    let (sinc_half, cos_half) = if half.abs() < SMALL_ANGLE_THRESHOLD {
        (1.0 - half * half / 6.0, 1.0 - half * half / 2.0)
    } else {
        (half.sin() / half, half.cos())
    };

    let delta = if omega > 0.0 {
        let axis = [
            angular_velocity[0] / omega,
            angular_velocity[1] / omega,
            angular_velocity[2] / omega,
        ];
        Quaternion {
            x: axis[0] * half * sinc_half,
            y: axis[1] * half * sinc_half,
            z: axis[2] * half * sinc_half,
            w: cos_half,
        }
    } else {
        Quaternion::IDENTITY
    };

    hamilton_product(previous, delta)
}

/// Hamilton product `a * b` for scalar-last quaternions.
fn hamilton_product(a: Quaternion, b: Quaternion) -> Quaternion {
    Quaternion {
        w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_constants_convert_full_scale_reading() {
        // +32767 raw at the gyro's +-2000 deg/s scale should land just under 2000 deg/s in rad/s.
        let rad_s = gyr_to_rad_s(32767);
        let deg_s = rad_s.to_degrees();
        assert!((deg_s - 2000.0).abs() < 0.1);
    }

    #[test]
    fn decode_0x4000000000000000_matches_scenario_bit_layout() {
        // Worked example from the protocol's documented scenarios: bit63=0, bit62=1, so per
        // the structural bit layout (authoritative over the scenario's prose labels, which
        // invert it and are hedged as device-dependent) this is magDistDetected=false,
        // restDetected=true, axis=0, all three stored components zero (decoding to -1/sqrt2
        // each), and a degenerate omitted component clamped to zero under the square root.
        let word: u64 = 0x4000_0000_0000_0000;
        let (quat, flags) = decode_smallest_three(word);
        assert!(!flags.mag_dist_detected);
        assert!(flags.rest_detected);
        assert_eq!(quat.x, 0.0);
        assert!((quat.y + std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!((quat.z + std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!((quat.w + std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn smallest_three_round_trips_identity() {
        let flags = QuatFlags {
            rest_detected: false,
            mag_dist_detected: false,
        };
        let word = encode_smallest_three(Quaternion::IDENTITY, flags);
        let (decoded, _) = decode_smallest_three(word);
        assert!((decoded.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_angular_velocity_leaves_orientation_unchanged() {
        let previous = Quaternion {
            x: 0.1,
            y: 0.2,
            z: 0.3,
            w: (1.0 - 0.01 - 0.04 - 0.09f64).sqrt(),
        };
        let next = integrate_packed_sample(previous, [0.0, 0.0, 0.0], 0.01);
        assert!((next.x - previous.x).abs() < 1e-9);
        assert!((next.y - previous.y).abs() < 1e-9);
        assert!((next.z - previous.z).abs() < 1e-9);
        assert!((next.w - previous.w).abs() < 1e-9);
    }

    #[test]
    fn small_angle_and_exact_paths_agree_near_the_threshold() {
        let previous = Quaternion::IDENTITY;
        let omega = [0.0, 0.0, 0.2];
        let a = integrate_packed_sample(previous, omega, 0.01);
        let b = integrate_packed_sample(previous, omega, 0.010001);
        assert!((a.z - b.z).abs() < 1e-6);
    }
}
