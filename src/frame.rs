//! # Frame Codec
//!
//! This module encodes and decodes the fixed 244-byte wire envelope (`SensorSerialPackage`)
//! shared by both transports: start byte, CRC32, payload size, 16-bit header, and payload.
//! It has no knowledge of what a header or payload *means* — that's [`crate::registry`]'s job.
//!
//! ```ignore
//! let bytes = encode(0x0170, &[0x00, 0x00, 0x64, 0xA1, 0x93, 0x9C, 0x97, 0x17]);
//! let frame = decode(&bytes).unwrap();
//! assert_eq!(frame.header, 0x0170);
//! ```

use crate::constants::{
    CRC_OFFSET, FRAME_SIZE, HEADER_OFFSET, PAYLOAD_MAX, PAYLOAD_OFFSET, PAYLOAD_SIZE_OFFSET,
    START_BYTE,
};
use thiserror::Error;

/// A decoded frame: a 16-bit header and its payload, CRC already verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: u16,
    pub payload: Vec<u8>,
}

/// Reasons a candidate 244-byte window failed to decode as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected start byte 0x{START_BYTE:02X}, got 0x{0:02X}")]
    BadStartByte(u8),
    #[error("payload size {0} exceeds maximum of {PAYLOAD_MAX}")]
    BadPayloadSize(u8),
    #[error("CRC mismatch: frame claims 0x{expected:08X}, computed 0x{computed:08X}")]
    BadCrc { expected: u32, computed: u32 },
    #[error("input is {0} bytes, expected exactly {FRAME_SIZE}")]
    WrongLength(usize),
}

/// Computes the CRC-32 (IEEE 802.3 / zlib polynomial) over `header_le || payload`.
fn crc_over(header: u16, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Encodes `header`/`payload` into a 244-byte frame, zero-padded after the payload.
///
/// # Panics
/// Panics if `payload.len() > PAYLOAD_MAX`; callers construct payloads from the registry,
/// which never produces an oversized payload, so this is a programmer-error guard rather
/// than a recoverable condition.
pub fn encode(header: u16, payload: &[u8]) -> [u8; FRAME_SIZE] {
    assert!(
        payload.len() <= PAYLOAD_MAX,
        "payload of {} bytes exceeds the {PAYLOAD_MAX}-byte maximum",
        payload.len()
    );

    let mut out = [0u8; FRAME_SIZE];
    out[0] = START_BYTE;
    out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc_over(header, payload).to_le_bytes());
    out[PAYLOAD_SIZE_OFFSET] = payload.len() as u8;
    out[HEADER_OFFSET..HEADER_OFFSET + 2].copy_from_slice(&header.to_le_bytes());
    out[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    out
}

/// Decodes a single 244-byte window into a [`Frame`], verifying the start byte, payload-size
/// bound, and CRC in that order.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.len() != FRAME_SIZE {
        return Err(FrameError::WrongLength(bytes.len()));
    }
    if bytes[0] != START_BYTE {
        return Err(FrameError::BadStartByte(bytes[0]));
    }

    let payload_size = bytes[PAYLOAD_SIZE_OFFSET];
    if payload_size as usize > PAYLOAD_MAX {
        return Err(FrameError::BadPayloadSize(payload_size));
    }
    let payload_size = payload_size as usize;

    let header = u16::from_le_bytes([bytes[HEADER_OFFSET], bytes[HEADER_OFFSET + 1]]);
    let payload = &bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload_size];

    let expected = u32::from_le_bytes([
        bytes[CRC_OFFSET],
        bytes[CRC_OFFSET + 1],
        bytes[CRC_OFFSET + 2],
        bytes[CRC_OFFSET + 3],
    ]);
    let computed = crc_over(header, payload);
    if expected != computed {
        return Err(FrameError::BadCrc { expected, computed });
    }

    Ok(Frame {
        header,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_empty_payload() {
        let bytes = encode(0x0001, &[]);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.header, 0x0001);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn round_trips_max_payload() {
        let payload = vec![0xAB; PAYLOAD_MAX];
        let bytes = encode(0x0200, &payload);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn set_absolute_time_matches_literal_bytes() {
        // Scenario 1 from the spec: newTimestamp = 1_700_000_000_000_000_000 ns.
        let timestamp: i64 = 1_700_000_000_000_000_000;
        let payload = timestamp.to_le_bytes();
        assert_eq!(payload, [0x00, 0x00, 0x64, 0xA1, 0x93, 0x9C, 0x97, 0x17]);

        let bytes = encode(0x0170, &payload);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.header, 0x0170);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn rejects_bad_start_byte() {
        let mut bytes = encode(0x0001, &[]);
        bytes[0] = 0x00;
        assert!(matches!(decode(&bytes), Err(FrameError::BadStartByte(0))));
    }

    #[test]
    fn rejects_oversized_payload_size_field() {
        let mut bytes = encode(0x0001, &[]);
        bytes[PAYLOAD_SIZE_OFFSET] = 237;
        assert!(matches!(
            decode(&bytes),
            Err(FrameError::BadPayloadSize(237))
        ));
    }

    #[test]
    fn single_byte_flip_in_header_or_payload_is_rejected() {
        let bytes = encode(0x0042, &[1, 2, 3, 4, 5]);
        for i in HEADER_OFFSET..PAYLOAD_OFFSET + 5 {
            let mut corrupted = bytes;
            corrupted[i] ^= 0x01;
            assert!(decode(&corrupted).is_err(), "flip at byte {i} went undetected");
        }
    }
}
