//! # Client Configuration
//!
//! [`ClientConfig`] gathers every tunable knob threaded through [`crate::connect`] and
//! [`crate::session`]: timeouts, queue sizing, and the optional clock round-trip task.
//! Mirrors the teacher's flat `SerialConfig`/`CollisionConfig` structs: one struct per
//! concern, `Default` impls instead of builder boilerplate.

use std::time::Duration;

/// What the consumer queue does when a caller isn't draining it fast enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Discard the oldest queued sample to make room for the new one.
    DropOldest,
    /// Surface [`crate::error::ImuError::QueueOverflow`] to the producer side instead.
    Error,
}

/// Tunables for a single [`crate::session::Session`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a BLE scan may run before giving up with no matching device found.
    pub scan_timeout: Duration,
    /// How long to wait for a transport-level connection to complete.
    pub connect_timeout: Duration,
    /// How long to wait for a device to echo/ack a single simple outbound command
    /// (everything except filesystem listing and file download).
    pub echo_timeout: Duration,
    /// How long to wait for the filesystem listing exchange (`FsListFiles` plus its declared
    /// count of `FsFile` follow-ups) to finish.
    pub fs_listing_timeout: Duration,
    /// How long to wait for the *next* chunk of a file download before declaring the
    /// transfer stalled. There is no overall deadline for a download: this is a
    /// progress-based watchdog, reset every time a chunk arrives, not a fixed ceiling on the
    /// whole transfer.
    pub download_idle_timeout: Duration,
    /// Capacity of the bounded consumer queue fed by the receive task.
    pub consumer_queue_capacity: usize,
    /// What happens when the consumer queue is full and a new sample arrives.
    pub overflow_policy: OverflowPolicy,
    /// Whether the periodic clock round-trip task runs at all. Off by default: callers
    /// that don't need synchronized timestamps shouldn't pay the periodic command traffic.
    pub clock_roundtrip_enabled: bool,
    /// Interval between clock round-trip exchanges when enabled.
    pub clock_roundtrip_interval: Duration,
    /// Real-time streaming rate requested when a caller passes `0` to mean "device default".
    pub default_real_time_rate_hz: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            echo_timeout: Duration::from_secs(2),
            fs_listing_timeout: Duration::from_secs(30),
            download_idle_timeout: Duration::from_secs(5),
            consumer_queue_capacity: 1024,
            overflow_policy: OverflowPolicy::DropOldest,
            clock_roundtrip_enabled: false,
            clock_roundtrip_interval: Duration::from_secs(30),
            default_real_time_rate_hz: crate::constants::DEFAULT_REAL_TIME_RATE_HZ,
        }
    }
}
