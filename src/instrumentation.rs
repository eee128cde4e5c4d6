//! # Telemetry Counters
//!
//! Per-session/per-[`crate::unpacker::Unpacker`] frame statistics. Unlike the teacher's
//! global `lazy_static!` stats registry, these counters live as plain fields on the structs
//! that own the resources they describe: a session's counters die with the session, and two
//! sessions in one process never contend on the same lock.

/// Running counters for one [`crate::unpacker::Unpacker`] or [`crate::session::Session`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FrameStatistics {
    /// Total 244-byte windows the unpacker attempted to decode.
    pub frames_attempted: u64,
    /// Windows that decoded into a valid [`crate::frame::Frame`].
    pub frames_valid: u64,
    /// Windows rejected specifically for a CRC mismatch.
    pub crc_errors: u64,
    /// Windows rejected for a bad start byte or bad payload-size field.
    pub frame_errors: u64,
    /// Bytes dropped one at a time while resyncing on the reassembled-stream channel.
    pub dropped_bytes_stream: u64,
    /// Bytes dropped one at a time while resyncing on the real-time sub-channel.
    pub dropped_bytes_real_time: u64,
    /// Times the consumer queue overflowed under [`crate::config::OverflowPolicy`].
    pub queue_overflows: u64,
}

impl FrameStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.frames_attempted += 1;
    }

    pub fn record_valid(&mut self) {
        self.frames_valid += 1;
    }

    pub fn record_crc_error(&mut self) {
        self.crc_errors += 1;
        self.frame_errors += 1;
    }

    pub fn record_frame_error(&mut self) {
        self.frame_errors += 1;
    }

    pub fn record_dropped_byte_stream(&mut self) {
        self.dropped_bytes_stream += 1;
    }

    pub fn record_dropped_byte_real_time(&mut self) {
        self.dropped_bytes_real_time += 1;
    }

    pub fn record_queue_overflow(&mut self) {
        self.queue_overflows += 1;
    }

    /// Renders the counters as JSON for a monitoring sidecar or log line.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("FrameStatistics fields are all plain integers")
    }
}
