//! # Clock Round-Trip
//!
//! A periodic background task that exchanges `ClockRoundtrip` packets with the device and
//! keeps a running estimate of the link delay and host/sensor clock offset, per §4.10. The
//! estimate is informational only: nothing in this crate rewrites a sample's timestamp using
//! it.

use crate::registry::{self, ClockRoundtrip, Packet};
use crate::session::Session;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One resolved delay/offset estimate, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEstimate {
    /// Half the round-trip time: `((hostRecv + sensorRecv) - (hostSend + sensorSend)) / 2`.
    pub delay_ns: i64,
    /// How far the sensor clock leads the host clock:
    /// `((hostSend + hostRecv) - (sensorRecv + sensorSend)) / 2`.
    pub offset_ns: i64,
}

impl ClockEstimate {
    /// Resolves one exchange's four timestamps into a delay/offset pair.
    pub fn compute(host_send: i64, sensor_recv: i64, sensor_send: i64, host_recv: i64) -> Self {
        ClockEstimate {
            delay_ns: ((host_recv + sensor_recv) - (host_send + sensor_send)) / 2,
            offset_ns: ((host_send + host_recv) - (sensor_recv + sensor_send)) / 2,
        }
    }
}

/// Shared holder for the most recent estimate, readable from any clone without touching the
/// session itself.
#[derive(Clone)]
pub struct ClockHandle {
    delay_ns: Arc<AtomicI64>,
    offset_ns: Arc<AtomicI64>,
}

impl ClockHandle {
    fn new() -> Self {
        ClockHandle {
            delay_ns: Arc::new(AtomicI64::new(0)),
            offset_ns: Arc::new(AtomicI64::new(0)),
        }
    }

    /// The most recently observed estimate, or `None` if no round trip has completed yet.
    pub fn latest(&self) -> Option<ClockEstimate> {
        let delay_ns = self.delay_ns.load(Ordering::Relaxed);
        let offset_ns = self.offset_ns.load(Ordering::Relaxed);
        if delay_ns == 0 && offset_ns == 0 {
            return None;
        }
        Some(ClockEstimate { delay_ns, offset_ns })
    }

    fn store(&self, estimate: ClockEstimate) {
        self.delay_ns.store(estimate.delay_ns, Ordering::Relaxed);
        self.offset_ns.store(estimate.offset_ns, Ordering::Relaxed);
    }
}

/// Spawns the periodic round-trip task against `session`, returning a handle to read the
/// latest estimate and the task itself so the caller can abort it on shutdown.
pub fn spawn(
    session: Arc<Session>,
    interval: Duration,
    echo_timeout: Duration,
) -> (ClockHandle, tokio::task::JoinHandle<()>) {
    let handle = ClockHandle::new();
    let returned = handle.clone();
    let task = tokio::spawn(run(session, interval, echo_timeout, handle));
    (returned, task)
}

async fn run(
    session: Arc<Session>,
    interval: Duration,
    echo_timeout: Duration,
    handle: ClockHandle,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if session.is_closed() {
            return;
        }

        let host_send = now_ns();
        let request = ClockRoundtrip {
            host_send_timestamp_ns: host_send,
            sensor_recv_timestamp_ns: 0,
            sensor_send_timestamp_ns: 0,
        };

        let response = session
            .send_and_await(
                &Packet::ClockRoundtrip(request),
                &[registry::header::DATA_CLOCK_ROUNDTRIP],
                echo_timeout,
            )
            .await;

        let host_recv = now_ns();
        if let Ok(Packet::ClockRoundtrip(reply)) = response {
            let estimate = ClockEstimate::compute(
                host_send,
                reply.sensor_recv_timestamp_ns,
                reply.sensor_send_timestamp_ns,
                host_recv,
            );
            handle.store(estimate);
        }
    }
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_matches_the_documented_worked_example() {
        let estimate = ClockEstimate::compute(1000, 1050, 1060, 1120);
        assert_eq!(estimate.delay_ns, 55);
        assert_eq!(estimate.offset_ns, 5);
    }

    #[test]
    fn handle_reports_none_until_a_round_trip_completes() {
        let handle = ClockHandle::new();
        assert_eq!(handle.latest(), None);
        handle.store(ClockEstimate { delay_ns: 10, offset_ns: -3 });
        assert_eq!(
            handle.latest(),
            Some(ClockEstimate { delay_ns: 10, offset_ns: -3 })
        );
    }
}
