//! # Stream Framer
//!
//! [`Unpacker`] turns an arbitrary byte stream into a sequence of [`Frame`]s, resyncing one
//! byte at a time on corruption so that a valid frame embedded anywhere in garbage is never
//! skipped. Grounded on the teacher's `IoBuffer`: a `VecDeque`-backed buffer that callers feed
//! incrementally and drain via repeated `try_next`-style calls.

use crate::constants::FRAME_SIZE;
use crate::frame::{self, Frame};
use crate::instrumentation::FrameStatistics;
use crate::transport::Channel;
use std::collections::VecDeque;

/// A resynchronizing byte-stream framer for one logical channel.
#[derive(Debug)]
pub struct Unpacker {
    buffer: VecDeque<u8>,
    stats: FrameStatistics,
    channel: Channel,
}

impl Default for Unpacker {
    fn default() -> Self {
        Unpacker::new(Channel::SendBuffer)
    }
}

impl Unpacker {
    /// Builds a framer for `channel`, so dropped-byte counters land in the field of
    /// [`FrameStatistics`] matching the channel it actually resyncs.
    pub fn new(channel: Channel) -> Self {
        Unpacker {
            buffer: VecDeque::new(),
            stats: FrameStatistics::new(),
            channel,
        }
    }

    fn record_dropped_byte(&mut self) {
        match self.channel {
            Channel::SendBuffer => self.stats.record_dropped_byte_stream(),
            Channel::RealTime => self.stats.record_dropped_byte_real_time(),
        }
    }

    /// Read-only access to this unpacker's running telemetry.
    pub fn stats(&self) -> &FrameStatistics {
        &self.stats
    }

    /// Appends `bytes` to the internal buffer and extracts every whole frame that can be
    /// recovered so far. Bytes that can't yet form a frame (a short trailing prefix) remain
    /// buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend(bytes);
        let mut frames = Vec::new();

        loop {
            if self.buffer.len() < FRAME_SIZE {
                break;
            }

            if self.buffer[0] != crate::constants::START_BYTE {
                self.buffer.pop_front();
                self.record_dropped_byte();
                continue;
            }

            let candidate: Vec<u8> = self.buffer.iter().take(FRAME_SIZE).copied().collect();
            self.stats.record_attempt();
            match frame::decode(&candidate) {
                Ok(frame) => {
                    self.stats.record_valid();
                    self.buffer.drain(..FRAME_SIZE);
                    frames.push(frame);
                }
                Err(frame::FrameError::BadCrc { .. }) => {
                    self.stats.record_crc_error();
                    self.buffer.pop_front();
                    self.record_dropped_byte();
                }
                Err(_) => {
                    self.stats.record_frame_error();
                    self.buffer.pop_front();
                    self.record_dropped_byte();
                }
            }
        }

        frames
    }

    /// Number of bytes currently buffered but not yet resolved into a frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    #[test]
    fn emits_frame_fed_in_one_call() {
        let bytes = encode(0x0001, &[1, 2, 3]);
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let frames = unpacker.feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, 0x0001);
    }

    #[test]
    fn emits_frame_fed_byte_by_byte() {
        let bytes = encode(0x0002, &[9, 9]);
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let mut frames = Vec::new();
        for b in bytes.iter() {
            frames.extend(unpacker.feed(&[*b]));
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, 0x0002);
    }

    #[test]
    fn resyncs_past_leading_garbage() {
        let mut stream = vec![0x00, 0xAB, 0xCD, 0x02, 0x02];
        stream.extend(encode(0x0003, &[7]));
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let frames = unpacker.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, 0x0003);
        assert!(unpacker.stats().dropped_bytes_stream >= 1);
    }

    #[test]
    fn resyncs_after_a_crc_failure_at_the_true_start_byte() {
        // A start byte at index 0 that fails CRC must be dropped, not trusted, so the real
        // frame starting later is still recovered.
        let mut stream = vec![0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00];
        stream.extend(std::iter::repeat(0u8).take(FRAME_SIZE - stream.len()));
        stream.extend(encode(0x0004, &[]));
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let frames = unpacker.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, 0x0004);
        assert!(unpacker.stats().dropped_bytes_stream >= 1);
        assert!(unpacker.stats().crc_errors >= 1);
    }

    #[test]
    fn partial_trailing_frame_stays_buffered_until_completed() {
        let bytes = encode(0x0005, &[1]);
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let frames = unpacker.feed(&bytes[..100]);
        assert!(frames.is_empty());
        assert_eq!(unpacker.pending_len(), 100);

        let frames = unpacker.feed(&bytes[100..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, 0x0005);
    }

    #[test]
    fn real_time_channel_drops_count_against_its_own_field() {
        let mut stream = vec![0x00, 0xAB, 0xCD];
        stream.extend(encode(0x0006, &[1]));
        let mut unpacker = Unpacker::new(Channel::RealTime);
        let frames = unpacker.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert!(unpacker.stats().dropped_bytes_real_time >= 1);
        assert_eq!(unpacker.stats().dropped_bytes_stream, 0);
    }

    #[test]
    fn payload_size_zero_and_max_both_round_trip() {
        let mut unpacker = Unpacker::new(Channel::SendBuffer);
        let empty = encode(0x0010, &[]);
        let full = encode(0x0011, &[0xEE; crate::constants::PAYLOAD_MAX]);

        let mut stream = Vec::new();
        stream.extend(empty);
        stream.extend(full);
        let frames = unpacker.feed(&stream);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].payload.is_empty());
        assert_eq!(frames[1].payload.len(), crate::constants::PAYLOAD_MAX);
    }
}
