//! # Sensor Sample Reconstruction
//!
//! Converts a raw [`SensorDataPacket`](crate::registry::SensorDataPacket) into a sequence of
//! [`SensorSample`]s in physical units, reconstructing the per-sample quaternions that
//! `Packed` encodings never store on the wire.

use crate::constants::error_flags;
use crate::fixedpoint::{
    self, acc_to_m_s2, delta_to_rad, gyr_to_rad_s, mag_to_ut, Quaternion,
};
use crate::registry::{SensorDataPacket, SensorEncoding, SensorShape};

/// One fully decoded sample: physical units, reconstructed orientation, and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub timestamp_ns: i64,
    pub gyro_rad_s: Option<[f64; 3]>,
    pub acc_m_s2: Option<[f64; 3]>,
    pub mag_ut: Option<[f64; 3]>,
    pub orientation: Quaternion,
    pub heading_delta_rad: f64,
    pub rest_detected: bool,
    pub mag_dist_detected: bool,
    pub error_flags: u8,
}

impl SensorSample {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.error_flags & flag != 0
    }

    pub fn time_gap(&self) -> bool {
        self.has_flag(error_flags::TIME_GAP)
    }
}

/// Reconstructs every sample carried by `packet` into physical units, per §4.5: packed
/// encodings extrapolate each subsequent quaternion from the anchor plus the per-sample gyro
/// triplet; fixed/float encodings already carry every sample's fields directly.
pub fn parse(packet: &SensorDataPacket) -> Vec<SensorSample> {
    let period_ns = (1e9 / packet.rate.hz()) as i64;

    match packet.encoding {
        SensorEncoding::Packed => parse_packed(packet, period_ns),
        SensorEncoding::Fixed => parse_fixed(packet, period_ns),
        SensorEncoding::Float => parse_float(packet, period_ns),
    }
}

fn parse_packed(packet: &SensorDataPacket, period_ns: i64) -> Vec<SensorSample> {
    let anchor_word = packet.anchor_quat.unwrap_or(0);
    let (anchor_quat, anchor_flags) = fixedpoint::decode_smallest_three(anchor_word);
    let dt = 1.0 / packet.rate.hz();

    let n = packet.gyro_raw.len();
    let mut orientation = anchor_quat;
    let mut samples = Vec::with_capacity(n);

    let (whole_delta, whole_error_flags) = if packet.shape == SensorShape::Quat {
        (None, None)
    } else {
        (
            packet.delta_raw.first().copied(),
            packet.error_flags.first().copied(),
        )
    };

    for i in 0..n {
        if i > 0 {
            let gyro_raw = packet.gyro_raw[i];
            let omega = [
                gyr_to_rad_s(gyro_raw[0]),
                gyr_to_rad_s(gyro_raw[1]),
                gyr_to_rad_s(gyro_raw[2]),
            ];
            orientation = fixedpoint::integrate_packed_sample(orientation, omega, dt);
        }

        let gyro_rad_s = Some({
            let g = packet.gyro_raw[i];
            [gyr_to_rad_s(g[0]), gyr_to_rad_s(g[1]), gyr_to_rad_s(g[2])]
        });
        let acc_m_s2 = packet.acc_raw.get(i).map(|a| {
            [acc_to_m_s2(a[0]), acc_to_m_s2(a[1]), acc_to_m_s2(a[2])]
        });
        let mag_ut = packet.mag_raw.get(i).map(|m| {
            [mag_to_ut(m[0]), mag_to_ut(m[1]), mag_to_ut(m[2])]
        });

        let (delta_raw, ef, rest_detected, mag_dist_detected) = if packet.shape == SensorShape::Quat {
            (
                packet.delta_raw[i],
                packet.error_flags[i],
                if i == 0 { anchor_flags.rest_detected } else { false },
                if i == 0 { anchor_flags.mag_dist_detected } else { false },
            )
        } else {
            (
                whole_delta.unwrap_or(0),
                whole_error_flags.unwrap_or(0),
                if i == 0 { anchor_flags.rest_detected } else { false },
                if i == 0 { anchor_flags.mag_dist_detected } else { false },
            )
        };

        samples.push(SensorSample {
            timestamp_ns: packet.timestamp_ns + i as i64 * period_ns,
            gyro_rad_s,
            acc_m_s2,
            mag_ut,
            orientation,
            heading_delta_rad: delta_to_rad(delta_raw),
            rest_detected,
            mag_dist_detected,
            error_flags: ef,
        });
    }

    samples
}

fn parse_fixed(packet: &SensorDataPacket, period_ns: i64) -> Vec<SensorSample> {
    let n = packet.quat_words.len();
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let (orientation, flags) = fixedpoint::decode_smallest_three(packet.quat_words[i]);
        let gyro_rad_s = packet.gyro_raw.get(i).map(|g| {
            [gyr_to_rad_s(g[0]), gyr_to_rad_s(g[1]), gyr_to_rad_s(g[2])]
        });
        let acc_m_s2 = packet.acc_raw.get(i).map(|a| {
            [acc_to_m_s2(a[0]), acc_to_m_s2(a[1]), acc_to_m_s2(a[2])]
        });
        let mag_ut = packet.mag_raw.get(i).map(|m| {
            [mag_to_ut(m[0]), mag_to_ut(m[1]), mag_to_ut(m[2])]
        });
        samples.push(SensorSample {
            timestamp_ns: packet.timestamp_ns + i as i64 * period_ns,
            gyro_rad_s,
            acc_m_s2,
            mag_ut,
            orientation,
            heading_delta_rad: delta_to_rad(packet.delta_raw[i]),
            rest_detected: flags.rest_detected,
            mag_dist_detected: flags.mag_dist_detected,
            error_flags: packet.error_flags[i],
        });
    }
    samples
}

fn parse_float(packet: &SensorDataPacket, period_ns: i64) -> Vec<SensorSample> {
    let n = packet.quat_floats.len();
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let q = packet.quat_floats[i];
        let orientation = Quaternion {
            x: q[0] as f64,
            y: q[1] as f64,
            z: q[2] as f64,
            w: q[3] as f64,
        };
        let gyro_rad_s = packet
            .gyro_float
            .get(i)
            .map(|g| [g[0] as f64, g[1] as f64, g[2] as f64]);
        let acc_m_s2 = packet
            .acc_float
            .get(i)
            .map(|a| [a[0] as f64, a[1] as f64, a[2] as f64]);
        let mag_ut = packet
            .mag_float
            .get(i)
            .map(|m| [m[0] as f64, m[1] as f64, m[2] as f64]);
        samples.push(SensorSample {
            timestamp_ns: packet.timestamp_ns + i as i64 * period_ns,
            gyro_rad_s,
            acc_m_s2,
            mag_ut,
            orientation,
            heading_delta_rad: packet.delta_float[i] as f64,
            rest_detected: false,
            mag_dist_detected: false,
            error_flags: packet.error_flags[i],
        });
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixedpoint::QuatFlags;
    use crate::registry::{SampleRate, SensorDataPacket};

    fn identity_packed_packet() -> SensorDataPacket {
        SensorDataPacket {
            shape: SensorShape::Full,
            encoding: SensorEncoding::Packed,
            rate: SampleRate::Hz200,
            timestamp_ns: 1_000_000_000,
            anchor_quat: Some(fixedpoint::encode_smallest_three(
                Quaternion::IDENTITY,
                QuatFlags {
                    rest_detected: false,
                    mag_dist_detected: false,
                },
            )),
            quat_words: Vec::new(),
            quat_floats: Vec::new(),
            gyro_raw: vec![[0, 0, 0]; 8],
            acc_raw: vec![[0, 0, 1670]; 8],
            mag_raw: vec![[0, 0, 0]; 8],
            gyro_float: Vec::new(),
            acc_float: Vec::new(),
            mag_float: Vec::new(),
            delta_raw: vec![0],
            delta_float: Vec::new(),
            error_flags: vec![0],
        }
    }

    #[test]
    fn all_zero_gyro_packed_samples_all_equal_the_anchor() {
        let packet = identity_packed_packet();
        let samples = parse(&packet);
        assert_eq!(samples.len(), 8);
        for sample in &samples {
            assert!((sample.orientation.w - 1.0).abs() < 1e-6);
            assert!(sample.orientation.x.abs() < 1e-6);
            assert!(sample.orientation.y.abs() < 1e-6);
            assert!(sample.orientation.z.abs() < 1e-6);
        }
    }

    #[test]
    fn per_sample_timestamps_advance_by_the_rate_period() {
        let packet = identity_packed_packet();
        let samples = parse(&packet);
        let period_ns = (1e9 / SampleRate::Hz200.hz()) as i64;
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.timestamp_ns, packet.timestamp_ns + i as i64 * period_ns);
        }
    }

    #[test]
    fn time_gap_flag_is_readable_from_whole_package_error_flags() {
        let mut packet = identity_packed_packet();
        packet.error_flags = vec![error_flags::TIME_GAP | error_flags::ACC_CLIPPING];
        let samples = parse(&packet);
        assert!(samples[0].time_gap());
        assert!(samples[0].has_flag(error_flags::ACC_CLIPPING));
        assert!(!samples[0].has_flag(error_flags::MAG_CLIPPING));
    }
}
