//! Integration tests for the frame codec against the documented end-to-end scenarios.

use imu_rs::frame::{decode, encode, FrameError};
use imu_rs::registry::header;

#[test]
fn scenario_1_set_absolute_time_encodes_the_documented_literal_bytes() {
    let timestamp_ns: i64 = 1_700_000_000_000_000_000;
    let payload = timestamp_ns.to_le_bytes();
    assert_eq!(payload, [0x00, 0x00, 0x64, 0xA1, 0x93, 0x9C, 0x97, 0x17]);

    let frame_bytes = encode(header::CMD_SET_ABSOLUTE_TIME, &payload);
    let frame = decode(&frame_bytes).unwrap();
    assert_eq!(frame.header, header::CMD_SET_ABSOLUTE_TIME);
    assert_eq!(frame.payload, payload);
}

#[test]
fn payload_size_zero_and_236_both_round_trip() {
    let empty = encode(0x0001, &[]);
    assert_eq!(decode(&empty).unwrap().payload.len(), 0);

    let max_payload = vec![0x42u8; 236];
    let max_frame = encode(0x1000, &max_payload);
    let decoded = decode(&max_frame).unwrap();
    assert_eq!(decoded.payload, max_payload);
}

#[test]
fn single_byte_flip_is_rejected_with_probability_one_across_many_positions() {
    let mut frame_bytes = encode(0x0A01, &[1, 99]).to_vec();
    let original = frame_bytes.clone();

    for position in 6..frame_bytes.len() {
        frame_bytes[position] ^= 0x01;
        let result = decode(&frame_bytes);
        assert!(
            matches!(result, Err(FrameError::BadCrc { .. })),
            "expected a CRC rejection after flipping byte {position}"
        );
        frame_bytes[position] = original[position];
    }
}

#[test]
fn scenario_6_resync_after_corrupted_leading_frame_reports_a_dropped_byte() {
    let valid = encode(0x0A01, &[0, 55]);
    let mut corrupted = valid;
    corrupted[1] ^= 0xFF; // break the CRC of the byte-0 candidate frame

    let mut stream = corrupted.to_vec();
    stream.extend_from_slice(&valid);

    let mut unpacker = imu_rs::unpacker::Unpacker::new(imu_rs::transport::Channel::SendBuffer);
    let frames = unpacker.feed(&stream);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].header, 0x0A01);
    assert!(unpacker.stats().dropped_bytes_stream >= 1);
}
