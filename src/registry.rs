//! # Packet Registry
//!
//! Maps 16-bit header codes to concrete payload layouts. Each variant round-trips losslessly
//! through [`encode`]/[`decode`]; headers this registry doesn't recognize decode to
//! [`Packet::Unknown`] rather than an error, so forward-compatible callers can ignore them.

use crate::error::{DeviceErrorKind, ImuError};

/// All header codes this registry recognizes, grouped by family.
pub mod header {
    pub const CMD_GET_DEVICE_INFO: u16 = 0x0001;
    pub const DATA_DEVICE_INFO: u16 = 0x0002;

    pub const CMD_SET_ABSOLUTE_TIME: u16 = 0x0170;
    pub const DATA_ABSOLUTE_TIME: u16 = 0x0171;
    pub const DATA_CLOCK_ROUNDTRIP: u16 = 0x0172;

    pub const CMD_SLEEP: u16 = 0x0200;
    pub const CMD_DEEP_SLEEP: u16 = 0x0201;
    pub const ACK_SLEEP: u16 = 0x0202;

    pub const CMD_SET_MEASUREMENT_MODE: u16 = 0x0300;
    pub const ACK_MEASUREMENT_MODE: u16 = 0x0301;

    pub const CMD_SET_BURST_MODE: u16 = 0x0400;
    pub const ACK_BURST_MODE: u16 = 0x0401;

    pub const CMD_START_RECORDING: u16 = 0x0500;
    pub const CMD_STOP_RECORDING: u16 = 0x0501;
    pub const ACK_START_RECORDING: u16 = 0x0502;
    pub const ACK_STOP_RECORDING: u16 = 0x0503;

    pub const CMD_START_STREAMING: u16 = 0x0600;
    pub const CMD_STOP_STREAMING: u16 = 0x0601;
    pub const ACK_START_STREAMING: u16 = 0x0602;
    pub const ACK_STOP_STREAMING: u16 = 0x0603;

    pub const CMD_START_REAL_TIME_STREAMING: u16 = 0x0700;
    pub const CMD_STOP_REAL_TIME_STREAMING: u16 = 0x0701;
    pub const ACK_START_REAL_TIME_STREAMING: u16 = 0x0702;
    pub const ACK_STOP_REAL_TIME_STREAMING: u16 = 0x0703;

    pub const CMD_SET_LED: u16 = 0x0800;
    pub const ACK_SET_LED: u16 = 0x0801;

    pub const CMD_SET_SYNC_OUTPUT: u16 = 0x0900;
    pub const ACK_SET_SYNC_OUTPUT: u16 = 0x0901;

    pub const CMD_GET_STATUS: u16 = 0x0A00;
    pub const DATA_STATUS: u16 = 0x0A01;

    pub const CMD_SYNC_TRIGGER: u16 = 0x0B00;
    pub const DATA_SYNC_TRIGGER: u16 = 0x0B01;

    pub const CMD_FS_LIST_FILES: u16 = 0x0C00;
    pub const DATA_FS_FILE_COUNT: u16 = 0x0C01;
    pub const DATA_FS_FILE: u16 = 0x0C02;
    pub const CMD_FS_GET_BYTES: u16 = 0x0C03;
    pub const DATA_FS_BYTES: u16 = 0x0C04;
    pub const CMD_FS_STOP_GET_BYTES: u16 = 0x0C05;
    pub const ACK_FS_STOP_GET_BYTES: u16 = 0x0C06;
    pub const CMD_FS_DELETE_FILE: u16 = 0x0C07;
    pub const ACK_FS_DELETE_FILE: u16 = 0x0C08;
    pub const CMD_FS_FORMAT: u16 = 0x0C09;
    pub const ACK_FS_FORMAT: u16 = 0x0C0A;

    pub const DATA_SENSOR_ERROR: u16 = 0x0D00;

    pub const DATA_RAW_BURST: u16 = 0x1100;

    /// Base of the 56-code sensor-data family: 8 shape/encoding combinations times 7 rates.
    pub const SENSOR_DATA_BASE: u16 = 0x1000;
}

/// The three telemetry shapes a sensor-data packet may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorShape {
    Full,
    Full6D,
    Quat,
}

/// How samples within a sensor-data packet are represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEncoding {
    /// One anchor quaternion plus per-sample gyro deltas; the rest are reconstructed.
    Packed,
    /// Every sample's fields stored directly as fixed-point integers.
    Fixed,
    /// Every sample's fields stored directly as IEEE-754 floats, already in SI units.
    Float,
}

/// The sampling rate a sensor-data packet was produced at. `Rt` is the real-time sub-channel
/// variant, which always carries exactly one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz200,
    Hz100,
    Hz50,
    Hz25,
    Hz10,
    Hz1,
    Rt,
}

impl SampleRate {
    pub fn hz(self) -> f64 {
        match self {
            SampleRate::Hz200 => 200.0,
            SampleRate::Hz100 => 100.0,
            SampleRate::Hz50 => 50.0,
            SampleRate::Hz25 => 25.0,
            SampleRate::Hz10 => 10.0,
            SampleRate::Hz1 => 1.0,
            SampleRate::Rt => 200.0,
        }
    }

    fn index(self) -> u16 {
        match self {
            SampleRate::Hz200 => 0,
            SampleRate::Hz100 => 1,
            SampleRate::Hz50 => 2,
            SampleRate::Hz25 => 3,
            SampleRate::Hz10 => 4,
            SampleRate::Hz1 => 5,
            SampleRate::Rt => 6,
        }
    }

    fn from_index(i: u16) -> Option<Self> {
        match i {
            0 => Some(SampleRate::Hz200),
            1 => Some(SampleRate::Hz100),
            2 => Some(SampleRate::Hz50),
            3 => Some(SampleRate::Hz25),
            4 => Some(SampleRate::Hz10),
            5 => Some(SampleRate::Hz1),
            6 => Some(SampleRate::Rt),
            _ => None,
        }
    }
}

/// The 8 valid (shape, encoding) combinations, in registry order.
const SHAPE_ENCODING_COMBOS: [(SensorShape, SensorEncoding); 8] = [
    (SensorShape::Full, SensorEncoding::Packed),
    (SensorShape::Full, SensorEncoding::Fixed),
    (SensorShape::Full, SensorEncoding::Float),
    (SensorShape::Full6D, SensorEncoding::Packed),
    (SensorShape::Full6D, SensorEncoding::Fixed),
    (SensorShape::Quat, SensorEncoding::Packed),
    (SensorShape::Quat, SensorEncoding::Fixed),
    (SensorShape::Quat, SensorEncoding::Float),
];

/// Packed encodings carry this many gyro-integrated samples per packet.
pub const PACKED_SAMPLE_COUNT: usize = 8;
/// Fixed/Float encodings store every field directly, so fewer samples fit per packet.
pub const DIRECT_SAMPLE_COUNT: usize = 4;

/// Computes the header code for a (shape, encoding, rate) combination, or `None` if that
/// combination isn't one of the 8 valid shape/encoding pairs.
pub fn sensor_header(shape: SensorShape, encoding: SensorEncoding, rate: SampleRate) -> Option<u16> {
    let combo_index = SHAPE_ENCODING_COMBOS
        .iter()
        .position(|&(s, e)| s == shape && e == encoding)? as u16;
    Some(header::SENSOR_DATA_BASE + combo_index * 7 + rate.index())
}

/// Inverse of [`sensor_header`]: recovers (shape, encoding, rate) from a header code in the
/// sensor-data range.
pub fn sensor_header_parts(header_code: u16) -> Option<(SensorShape, SensorEncoding, SampleRate)> {
    if header_code < header::SENSOR_DATA_BASE {
        return None;
    }
    let offset = header_code - header::SENSOR_DATA_BASE;
    if offset >= 56 {
        return None;
    }
    let combo_index = (offset / 7) as usize;
    let rate = SampleRate::from_index(offset % 7)?;
    let (shape, encoding) = SHAPE_ENCODING_COMBOS[combo_index];
    Some((shape, encoding, rate))
}

/// Raw fields of a sensor-data packet, before unit scaling or quaternion reconstruction.
/// See [`crate::sample::parse`] for the decoded, physical-unit view.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDataPacket {
    pub shape: SensorShape,
    pub encoding: SensorEncoding,
    pub rate: SampleRate,
    pub timestamp_ns: i64,
    /// `Packed`: one anchor quaternion word. `Fixed`/`Float`: one quat64/four f32 per sample,
    /// stored in `quat_words`/`quat_floats` respectively instead.
    pub anchor_quat: Option<u64>,
    pub quat_words: Vec<u64>,
    pub quat_floats: Vec<[f32; 4]>,
    pub gyro_raw: Vec<[i16; 3]>,
    pub acc_raw: Vec<[i16; 3]>,
    pub mag_raw: Vec<[i16; 3]>,
    pub gyro_float: Vec<[f32; 3]>,
    pub acc_float: Vec<[f32; 3]>,
    pub mag_float: Vec<[f32; 3]>,
    /// One `delta`/`errorFlags` pair for `Full`/`Full6D` packets; one per sample for `Quat`.
    pub delta_raw: Vec<i16>,
    pub delta_float: Vec<f32>,
    pub error_flags: Vec<u8>,
}

/// A decoded, tagged packet. `Unknown` preserves the raw header/payload for headers this
/// registry doesn't recognize, per the forward-compatibility requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    DeviceInfo(DeviceInfo),
    CmdGetDeviceInfo,
    SetAbsoluteTime { timestamp_ns: i64 },
    AbsoluteTime { timestamp_ns: i64 },
    ClockRoundtrip(ClockRoundtrip),
    Sleep,
    DeepSleep,
    AckSleep,
    SetMeasurementMode { mode: u8 },
    AckMeasurementMode { mode: u8 },
    SetBurstMode { enabled: bool },
    AckBurstMode { enabled: bool },
    StartRecording,
    StopRecording,
    AckStartRecording,
    AckStopRecording,
    StartStreaming,
    StopStreaming,
    AckStartStreaming,
    AckStopStreaming,
    StartRealTimeStreaming { rate_hz: u16 },
    StopRealTimeStreaming,
    AckStartRealTimeStreaming,
    AckStopRealTimeStreaming,
    SetLed { r: u8, g: u8, b: u8 },
    AckSetLed,
    SetSyncOutput { mode: u8 },
    AckSetSyncOutput,
    GetStatus,
    Status(Status),
    SyncTrigger { timestamp_ns: i64 },
    FsListFiles,
    FsFileCount(u16),
    FsFile(FsFile),
    FsGetBytes(FsGetBytes),
    FsBytes(FsBytes),
    FsStopGetBytes,
    AckFsStopGetBytes,
    FsDeleteFile { filename: String },
    AckFsDeleteFile,
    FsFormat,
    AckFsFormat,
    SensorError { command: u16, error: DeviceErrorKind },
    SensorData(Box<SensorDataPacket>),
    Unknown { header: u16, payload: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceInfo {
    pub serial: [u8; 6],
    pub hardware_version: u16,
    pub firmware_version: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockRoundtrip {
    pub host_send_timestamp_ns: i64,
    pub sensor_recv_timestamp_ns: i64,
    pub sensor_send_timestamp_ns: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Idle,
    Recording,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: SensorState,
    pub battery_percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsFile {
    pub index: u16,
    pub filename: String,
    pub size_bytes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsGetBytes {
    pub filename: String,
    pub start_pos: u32,
    pub end_pos: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsBytes {
    pub offset: u32,
    pub data: Vec<u8>,
}

fn read_filename(bytes: &[u8]) -> Result<String, ImuError> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(bytes.len());
    String::from_utf8(bytes[..nul].to_vec())
        .map_err(|e| ImuError::Other(format!("invalid filename bytes: {e}")))
}

fn write_filename(name: &str, out: &mut Vec<u8>) -> Result<(), ImuError> {
    if name.len() > crate::constants::FS_FILENAME_MAX_LEN {
        return Err(ImuError::Other(format!(
            "filename {name:?} exceeds {} characters",
            crate::constants::FS_FILENAME_MAX_LEN
        )));
    }
    let mut field = [0u8; crate::constants::FS_FILENAME_FIELD_LEN];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
    Ok(())
}

/// Decodes a frame's header and payload into a typed [`Packet`].
pub fn decode(header_code: u16, payload: &[u8]) -> Result<Packet, ImuError> {
    use header::*;

    if let Some((shape, encoding, rate)) = sensor_header_parts(header_code) {
        return decode_sensor_data(shape, encoding, rate, header_code, payload);
    }

    macro_rules! need {
        ($len:expr) => {
            if payload.len() != $len {
                return Err(ImuError::Decode {
                    header: header_code,
                    reason: format!("expected {} payload bytes, got {}", $len, payload.len()),
                });
            }
        };
    }

    Ok(match header_code {
        CMD_GET_DEVICE_INFO => {
            need!(0);
            Packet::CmdGetDeviceInfo
        }
        DATA_DEVICE_INFO => {
            need!(10);
            let mut serial = [0u8; 6];
            serial.copy_from_slice(&payload[0..6]);
            Packet::DeviceInfo(DeviceInfo {
                serial,
                hardware_version: u16::from_le_bytes([payload[6], payload[7]]),
                firmware_version: u16::from_le_bytes([payload[8], payload[9]]),
            })
        }
        CMD_SET_ABSOLUTE_TIME => {
            need!(8);
            Packet::SetAbsoluteTime {
                timestamp_ns: i64::from_le_bytes(payload[0..8].try_into().unwrap()),
            }
        }
        DATA_ABSOLUTE_TIME => {
            need!(8);
            Packet::AbsoluteTime {
                timestamp_ns: i64::from_le_bytes(payload[0..8].try_into().unwrap()),
            }
        }
        DATA_CLOCK_ROUNDTRIP => {
            need!(24);
            Packet::ClockRoundtrip(ClockRoundtrip {
                host_send_timestamp_ns: i64::from_le_bytes(payload[0..8].try_into().unwrap()),
                sensor_recv_timestamp_ns: i64::from_le_bytes(payload[8..16].try_into().unwrap()),
                sensor_send_timestamp_ns: i64::from_le_bytes(payload[16..24].try_into().unwrap()),
            })
        }
        CMD_SLEEP => {
            need!(0);
            Packet::Sleep
        }
        CMD_DEEP_SLEEP => {
            need!(0);
            Packet::DeepSleep
        }
        ACK_SLEEP => {
            need!(0);
            Packet::AckSleep
        }
        CMD_SET_MEASUREMENT_MODE => {
            need!(1);
            Packet::SetMeasurementMode { mode: payload[0] }
        }
        ACK_MEASUREMENT_MODE => {
            need!(1);
            Packet::AckMeasurementMode { mode: payload[0] }
        }
        CMD_SET_BURST_MODE => {
            need!(1);
            Packet::SetBurstMode {
                enabled: payload[0] != 0,
            }
        }
        ACK_BURST_MODE => {
            need!(1);
            Packet::AckBurstMode {
                enabled: payload[0] != 0,
            }
        }
        CMD_START_RECORDING => {
            need!(0);
            Packet::StartRecording
        }
        CMD_STOP_RECORDING => {
            need!(0);
            Packet::StopRecording
        }
        ACK_START_RECORDING => {
            need!(0);
            Packet::AckStartRecording
        }
        ACK_STOP_RECORDING => {
            need!(0);
            Packet::AckStopRecording
        }
        CMD_START_STREAMING => {
            need!(0);
            Packet::StartStreaming
        }
        CMD_STOP_STREAMING => {
            need!(0);
            Packet::StopStreaming
        }
        ACK_START_STREAMING => {
            need!(0);
            Packet::AckStartStreaming
        }
        ACK_STOP_STREAMING => {
            need!(0);
            Packet::AckStopStreaming
        }
        CMD_START_REAL_TIME_STREAMING => {
            need!(2);
            Packet::StartRealTimeStreaming {
                rate_hz: u16::from_le_bytes([payload[0], payload[1]]),
            }
        }
        CMD_STOP_REAL_TIME_STREAMING => {
            need!(0);
            Packet::StopRealTimeStreaming
        }
        ACK_START_REAL_TIME_STREAMING => {
            need!(0);
            Packet::AckStartRealTimeStreaming
        }
        ACK_STOP_REAL_TIME_STREAMING => {
            need!(0);
            Packet::AckStopRealTimeStreaming
        }
        CMD_SET_LED => {
            need!(3);
            Packet::SetLed {
                r: payload[0],
                g: payload[1],
                b: payload[2],
            }
        }
        ACK_SET_LED => {
            need!(0);
            Packet::AckSetLed
        }
        CMD_SET_SYNC_OUTPUT => {
            need!(1);
            Packet::SetSyncOutput { mode: payload[0] }
        }
        ACK_SET_SYNC_OUTPUT => {
            need!(0);
            Packet::AckSetSyncOutput
        }
        CMD_GET_STATUS => {
            need!(0);
            Packet::GetStatus
        }
        DATA_STATUS => {
            need!(2);
            let state = match payload[0] {
                0 => SensorState::Idle,
                1 => SensorState::Recording,
                2 => SensorState::Streaming,
                other => {
                    return Err(ImuError::Decode {
                        header: header_code,
                        reason: format!("unknown sensor state byte {other}"),
                    })
                }
            };
            Packet::Status(Status {
                state,
                battery_percent: payload[1],
            })
        }
        CMD_SYNC_TRIGGER => {
            need!(8);
            Packet::SyncTrigger {
                timestamp_ns: i64::from_le_bytes(payload[0..8].try_into().unwrap()),
            }
        }
        DATA_SYNC_TRIGGER => {
            need!(8);
            Packet::SyncTrigger {
                timestamp_ns: i64::from_le_bytes(payload[0..8].try_into().unwrap()),
            }
        }
        CMD_FS_LIST_FILES => {
            need!(0);
            Packet::FsListFiles
        }
        DATA_FS_FILE_COUNT => {
            need!(2);
            Packet::FsFileCount(u16::from_le_bytes([payload[0], payload[1]]))
        }
        DATA_FS_FILE => {
            need!(2 + crate::constants::FS_FILENAME_FIELD_LEN + 4);
            let index = u16::from_le_bytes([payload[0], payload[1]]);
            let name_end = 2 + crate::constants::FS_FILENAME_FIELD_LEN;
            let filename = read_filename(&payload[2..name_end])?;
            let size_bytes = u32::from_le_bytes(payload[name_end..name_end + 4].try_into().unwrap());
            Packet::FsFile(FsFile {
                index,
                filename,
                size_bytes,
            })
        }
        CMD_FS_GET_BYTES => {
            need!(crate::constants::FS_FILENAME_FIELD_LEN + 8);
            let filename = read_filename(&payload[0..crate::constants::FS_FILENAME_FIELD_LEN])?;
            let rest = &payload[crate::constants::FS_FILENAME_FIELD_LEN..];
            Packet::FsGetBytes(FsGetBytes {
                filename,
                start_pos: u32::from_le_bytes(rest[0..4].try_into().unwrap()),
                end_pos: u32::from_le_bytes(rest[4..8].try_into().unwrap()),
            })
        }
        DATA_FS_BYTES => {
            if payload.len() < 4 {
                return Err(ImuError::Decode {
                    header: header_code,
                    reason: "DataFsBytes payload shorter than its 4-byte offset field".into(),
                });
            }
            Packet::FsBytes(FsBytes {
                offset: u32::from_le_bytes(payload[0..4].try_into().unwrap()),
                data: payload[4..].to_vec(),
            })
        }
        CMD_FS_STOP_GET_BYTES => {
            need!(0);
            Packet::FsStopGetBytes
        }
        ACK_FS_STOP_GET_BYTES => {
            need!(0);
            Packet::AckFsStopGetBytes
        }
        CMD_FS_DELETE_FILE => {
            need!(crate::constants::FS_FILENAME_FIELD_LEN);
            Packet::FsDeleteFile {
                filename: read_filename(payload)?,
            }
        }
        ACK_FS_DELETE_FILE => {
            need!(0);
            Packet::AckFsDeleteFile
        }
        CMD_FS_FORMAT => {
            need!(0);
            Packet::FsFormat
        }
        ACK_FS_FORMAT => {
            need!(0);
            Packet::AckFsFormat
        }
        DATA_SENSOR_ERROR => {
            need!(3);
            Packet::SensorError {
                command: u16::from_le_bytes([payload[0], payload[1]]),
                error: DeviceErrorKind::from(payload[2]),
            }
        }
        other => Packet::Unknown {
            header: other,
            payload: payload.to_vec(),
        },
    })
}

fn decode_sensor_data(
    shape: SensorShape,
    encoding: SensorEncoding,
    rate: SampleRate,
    header_code: u16,
    payload: &[u8],
) -> Result<Packet, ImuError> {
    let err = |reason: String| ImuError::Decode {
        header: header_code,
        reason,
    };
    if payload.len() < 8 {
        return Err(err("sensor-data payload shorter than the 8-byte timestamp".into()));
    }
    let timestamp_ns = i64::from_le_bytes(payload[0..8].try_into().unwrap());
    let mut cursor = 8usize;

    let mut read = |n: usize| -> Result<&[u8], ImuError> {
        if cursor + n > payload.len() {
            return Err(err(format!(
                "truncated sensor-data payload: needed {n} more bytes at offset {cursor}"
            )));
        }
        let slice = &payload[cursor..cursor + n];
        cursor += n;
        Ok(slice)
    };

    let mut packet = SensorDataPacket {
        shape,
        encoding,
        rate,
        timestamp_ns,
        anchor_quat: None,
        quat_words: Vec::new(),
        quat_floats: Vec::new(),
        gyro_raw: Vec::new(),
        acc_raw: Vec::new(),
        mag_raw: Vec::new(),
        gyro_float: Vec::new(),
        acc_float: Vec::new(),
        mag_float: Vec::new(),
        delta_raw: Vec::new(),
        delta_float: Vec::new(),
        error_flags: Vec::new(),
    };

    match encoding {
        SensorEncoding::Packed => {
            let n = PACKED_SAMPLE_COUNT;
            packet.anchor_quat = Some(u64::from_le_bytes(read(8)?.try_into().unwrap()));
            for _ in 0..n {
                let g = read(6)?;
                packet.gyro_raw.push([
                    i16::from_le_bytes([g[0], g[1]]),
                    i16::from_le_bytes([g[2], g[3]]),
                    i16::from_le_bytes([g[4], g[5]]),
                ]);
            }
            if shape != SensorShape::Quat {
                for _ in 0..n {
                    let a = read(6)?;
                    packet.acc_raw.push([
                        i16::from_le_bytes([a[0], a[1]]),
                        i16::from_le_bytes([a[2], a[3]]),
                        i16::from_le_bytes([a[4], a[5]]),
                    ]);
                }
            }
            if shape == SensorShape::Full {
                for _ in 0..n {
                    let m = read(6)?;
                    packet.mag_raw.push([
                        i16::from_le_bytes([m[0], m[1]]),
                        i16::from_le_bytes([m[2], m[3]]),
                        i16::from_le_bytes([m[4], m[5]]),
                    ]);
                }
            }
            if shape == SensorShape::Quat {
                for _ in 0..n {
                    let d = read(2)?;
                    packet.delta_raw.push(i16::from_le_bytes([d[0], d[1]]));
                }
                for _ in 0..n {
                    packet.error_flags.push(read(1)?[0]);
                }
            } else {
                packet.delta_raw.push(i16::from_le_bytes(read(2)?.try_into().unwrap()));
                packet.error_flags.push(read(1)?[0]);
            }
        }
        SensorEncoding::Fixed => {
            let n = DIRECT_SAMPLE_COUNT;
            for _ in 0..n {
                packet
                    .quat_words
                    .push(u64::from_le_bytes(read(8)?.try_into().unwrap()));
                let g = read(6)?;
                packet.gyro_raw.push([
                    i16::from_le_bytes([g[0], g[1]]),
                    i16::from_le_bytes([g[2], g[3]]),
                    i16::from_le_bytes([g[4], g[5]]),
                ]);
                if shape != SensorShape::Quat {
                    let a = read(6)?;
                    packet.acc_raw.push([
                        i16::from_le_bytes([a[0], a[1]]),
                        i16::from_le_bytes([a[2], a[3]]),
                        i16::from_le_bytes([a[4], a[5]]),
                    ]);
                }
                if shape == SensorShape::Full {
                    let m = read(6)?;
                    packet.mag_raw.push([
                        i16::from_le_bytes([m[0], m[1]]),
                        i16::from_le_bytes([m[2], m[3]]),
                        i16::from_le_bytes([m[4], m[5]]),
                    ]);
                }
                packet
                    .delta_raw
                    .push(i16::from_le_bytes(read(2)?.try_into().unwrap()));
                packet.error_flags.push(read(1)?[0]);
            }
        }
        SensorEncoding::Float => {
            let n = DIRECT_SAMPLE_COUNT;
            for _ in 0..n {
                let q = read(16)?;
                packet.quat_floats.push([
                    f32::from_le_bytes(q[0..4].try_into().unwrap()),
                    f32::from_le_bytes(q[4..8].try_into().unwrap()),
                    f32::from_le_bytes(q[8..12].try_into().unwrap()),
                    f32::from_le_bytes(q[12..16].try_into().unwrap()),
                ]);
                if shape != SensorShape::Quat {
                    let g = read(12)?;
                    packet.gyro_float.push([
                        f32::from_le_bytes(g[0..4].try_into().unwrap()),
                        f32::from_le_bytes(g[4..8].try_into().unwrap()),
                        f32::from_le_bytes(g[8..12].try_into().unwrap()),
                    ]);
                    let a = read(12)?;
                    packet.acc_float.push([
                        f32::from_le_bytes(a[0..4].try_into().unwrap()),
                        f32::from_le_bytes(a[4..8].try_into().unwrap()),
                        f32::from_le_bytes(a[8..12].try_into().unwrap()),
                    ]);
                }
                if shape == SensorShape::Full {
                    let m = read(12)?;
                    packet.mag_float.push([
                        f32::from_le_bytes(m[0..4].try_into().unwrap()),
                        f32::from_le_bytes(m[4..8].try_into().unwrap()),
                        f32::from_le_bytes(m[8..12].try_into().unwrap()),
                    ]);
                }
                packet
                    .delta_float
                    .push(f32::from_le_bytes(read(4)?.try_into().unwrap()));
                packet.error_flags.push(read(1)?[0]);
            }
        }
    }

    Ok(Packet::SensorData(Box::new(packet)))
}

/// Encodes a [`Packet`] back into its header code and payload bytes.
pub fn encode(packet: &Packet) -> Result<(u16, Vec<u8>), ImuError> {
    use header::*;

    Ok(match packet {
        Packet::CmdGetDeviceInfo => (CMD_GET_DEVICE_INFO, Vec::new()),
        Packet::DeviceInfo(info) => {
            let mut out = Vec::with_capacity(10);
            out.extend_from_slice(&info.serial);
            out.extend_from_slice(&info.hardware_version.to_le_bytes());
            out.extend_from_slice(&info.firmware_version.to_le_bytes());
            (DATA_DEVICE_INFO, out)
        }
        Packet::SetAbsoluteTime { timestamp_ns } => {
            (CMD_SET_ABSOLUTE_TIME, timestamp_ns.to_le_bytes().to_vec())
        }
        Packet::AbsoluteTime { timestamp_ns } => {
            (DATA_ABSOLUTE_TIME, timestamp_ns.to_le_bytes().to_vec())
        }
        Packet::ClockRoundtrip(rt) => {
            let mut out = Vec::with_capacity(24);
            out.extend_from_slice(&rt.host_send_timestamp_ns.to_le_bytes());
            out.extend_from_slice(&rt.sensor_recv_timestamp_ns.to_le_bytes());
            out.extend_from_slice(&rt.sensor_send_timestamp_ns.to_le_bytes());
            (DATA_CLOCK_ROUNDTRIP, out)
        }
        Packet::Sleep => (CMD_SLEEP, Vec::new()),
        Packet::DeepSleep => (CMD_DEEP_SLEEP, Vec::new()),
        Packet::AckSleep => (ACK_SLEEP, Vec::new()),
        Packet::SetMeasurementMode { mode } => (CMD_SET_MEASUREMENT_MODE, vec![*mode]),
        Packet::AckMeasurementMode { mode } => (ACK_MEASUREMENT_MODE, vec![*mode]),
        Packet::SetBurstMode { enabled } => (CMD_SET_BURST_MODE, vec![*enabled as u8]),
        Packet::AckBurstMode { enabled } => (ACK_BURST_MODE, vec![*enabled as u8]),
        Packet::StartRecording => (CMD_START_RECORDING, Vec::new()),
        Packet::StopRecording => (CMD_STOP_RECORDING, Vec::new()),
        Packet::AckStartRecording => (ACK_START_RECORDING, Vec::new()),
        Packet::AckStopRecording => (ACK_STOP_RECORDING, Vec::new()),
        Packet::StartStreaming => (CMD_START_STREAMING, Vec::new()),
        Packet::StopStreaming => (CMD_STOP_STREAMING, Vec::new()),
        Packet::AckStartStreaming => (ACK_START_STREAMING, Vec::new()),
        Packet::AckStopStreaming => (ACK_STOP_STREAMING, Vec::new()),
        Packet::StartRealTimeStreaming { rate_hz } => (
            CMD_START_REAL_TIME_STREAMING,
            rate_hz.to_le_bytes().to_vec(),
        ),
        Packet::StopRealTimeStreaming => (CMD_STOP_REAL_TIME_STREAMING, Vec::new()),
        Packet::AckStartRealTimeStreaming => (ACK_START_REAL_TIME_STREAMING, Vec::new()),
        Packet::AckStopRealTimeStreaming => (ACK_STOP_REAL_TIME_STREAMING, Vec::new()),
        Packet::SetLed { r, g, b } => (CMD_SET_LED, vec![*r, *g, *b]),
        Packet::AckSetLed => (ACK_SET_LED, Vec::new()),
        Packet::SetSyncOutput { mode } => (CMD_SET_SYNC_OUTPUT, vec![*mode]),
        Packet::AckSetSyncOutput => (ACK_SET_SYNC_OUTPUT, Vec::new()),
        Packet::GetStatus => (CMD_GET_STATUS, Vec::new()),
        Packet::Status(status) => {
            let state_byte = match status.state {
                SensorState::Idle => 0,
                SensorState::Recording => 1,
                SensorState::Streaming => 2,
            };
            (DATA_STATUS, vec![state_byte, status.battery_percent])
        }
        Packet::SyncTrigger { timestamp_ns } => {
            (DATA_SYNC_TRIGGER, timestamp_ns.to_le_bytes().to_vec())
        }
        Packet::FsListFiles => (CMD_FS_LIST_FILES, Vec::new()),
        Packet::FsFileCount(count) => (DATA_FS_FILE_COUNT, count.to_le_bytes().to_vec()),
        Packet::FsFile(file) => {
            let mut out = Vec::new();
            out.extend_from_slice(&file.index.to_le_bytes());
            write_filename(&file.filename, &mut out)?;
            out.extend_from_slice(&file.size_bytes.to_le_bytes());
            (DATA_FS_FILE, out)
        }
        Packet::FsGetBytes(req) => {
            let mut out = Vec::new();
            write_filename(&req.filename, &mut out)?;
            out.extend_from_slice(&req.start_pos.to_le_bytes());
            out.extend_from_slice(&req.end_pos.to_le_bytes());
            (CMD_FS_GET_BYTES, out)
        }
        Packet::FsBytes(bytes) => {
            let mut out = Vec::with_capacity(4 + bytes.data.len());
            out.extend_from_slice(&bytes.offset.to_le_bytes());
            out.extend_from_slice(&bytes.data);
            (DATA_FS_BYTES, out)
        }
        Packet::FsStopGetBytes => (CMD_FS_STOP_GET_BYTES, Vec::new()),
        Packet::AckFsStopGetBytes => (ACK_FS_STOP_GET_BYTES, Vec::new()),
        Packet::FsDeleteFile { filename } => {
            let mut out = Vec::new();
            write_filename(filename, &mut out)?;
            (CMD_FS_DELETE_FILE, out)
        }
        Packet::AckFsDeleteFile => (ACK_FS_DELETE_FILE, Vec::new()),
        Packet::FsFormat => (CMD_FS_FORMAT, Vec::new()),
        Packet::AckFsFormat => (ACK_FS_FORMAT, Vec::new()),
        Packet::SensorError { command, error } => (
            DATA_SENSOR_ERROR,
            {
                let mut out = command.to_le_bytes().to_vec();
                out.push((*error).into());
                out
            },
        ),
        Packet::SensorData(data) => encode_sensor_data(data)?,
        Packet::Unknown { header, payload } => (*header, payload.clone()),
    })
}

fn encode_sensor_data(packet: &SensorDataPacket) -> Result<(u16, Vec<u8>), ImuError> {
    let header_code = sensor_header(packet.shape, packet.encoding, packet.rate).ok_or_else(|| {
        ImuError::Other(format!(
            "{:?}/{:?} is not a valid shape/encoding combination",
            packet.shape, packet.encoding
        ))
    })?;

    let mut out = Vec::with_capacity(crate::constants::PAYLOAD_MAX);
    out.extend_from_slice(&packet.timestamp_ns.to_le_bytes());

    match packet.encoding {
        SensorEncoding::Packed => {
            let anchor = packet
                .anchor_quat
                .ok_or_else(|| ImuError::Other("packed sensor data missing anchor quaternion".into()))?;
            out.extend_from_slice(&anchor.to_le_bytes());
            for g in &packet.gyro_raw {
                for v in g {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            if packet.shape != SensorShape::Quat {
                for a in &packet.acc_raw {
                    for v in a {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
            if packet.shape == SensorShape::Full {
                for m in &packet.mag_raw {
                    for v in m {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
            if packet.shape == SensorShape::Quat {
                for d in &packet.delta_raw {
                    out.extend_from_slice(&d.to_le_bytes());
                }
                out.extend_from_slice(&packet.error_flags);
            } else {
                out.extend_from_slice(&packet.delta_raw[0].to_le_bytes());
                out.push(packet.error_flags[0]);
            }
        }
        SensorEncoding::Fixed => {
            for i in 0..DIRECT_SAMPLE_COUNT {
                out.extend_from_slice(&packet.quat_words[i].to_le_bytes());
                for v in &packet.gyro_raw[i] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                if packet.shape != SensorShape::Quat {
                    for v in &packet.acc_raw[i] {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                if packet.shape == SensorShape::Full {
                    for v in &packet.mag_raw[i] {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                out.extend_from_slice(&packet.delta_raw[i].to_le_bytes());
                out.push(packet.error_flags[i]);
            }
        }
        SensorEncoding::Float => {
            for i in 0..DIRECT_SAMPLE_COUNT {
                for v in &packet.quat_floats[i] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                if packet.shape != SensorShape::Quat {
                    for v in &packet.gyro_float[i] {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                    for v in &packet.acc_float[i] {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                if packet.shape == SensorShape::Full {
                    for v in &packet.mag_float[i] {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                out.extend_from_slice(&packet.delta_float[i].to_le_bytes());
                out.push(packet.error_flags[i]);
            }
        }
    }

    if out.len() > crate::constants::PAYLOAD_MAX {
        return Err(ImuError::Other(format!(
            "encoded sensor-data payload of {} bytes exceeds the {}-byte maximum",
            out.len(),
            crate::constants::PAYLOAD_MAX
        )));
    }

    Ok((header_code, out))
}
