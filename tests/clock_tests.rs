//! Integration test for the periodic clock round-trip task.

mod support;

use imu_rs::config::ClientConfig;
use imu_rs::registry::{header, ClockRoundtrip, Packet};
use imu_rs::session::{clock, Session};
use std::sync::Arc;
use std::time::Duration;
use support::ScriptedTransport;

#[tokio::test]
async fn spawned_round_trip_task_produces_a_delay_and_offset_estimate() {
    let script = vec![(
        header::DATA_CLOCK_ROUNDTRIP,
        vec![Packet::ClockRoundtrip(ClockRoundtrip {
            host_send_timestamp_ns: 0,
            sensor_recv_timestamp_ns: 50,
            sensor_send_timestamp_ns: 60,
        })],
    )];
    let session = Session::new(Box::new(ScriptedTransport::new(script)), ClientConfig::default())
        .await
        .unwrap();
    let session = Arc::new(session);

    let (handle, task) = clock::spawn(session, Duration::from_millis(10), Duration::from_secs(1));

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if handle.latest().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("a clock estimate should have been produced");

    let estimate = handle.latest().unwrap();
    assert!(estimate.delay_ns >= 0);
    task.abort();
}
