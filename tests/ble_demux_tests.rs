//! Integration tests for the BLE notification demultiplexer.

use imu_rs::constants::FRAME_SIZE;
use imu_rs::transport::ble::demux_notification;

#[test]
fn scenario_3_two_real_time_frames_then_twenty_send_buffer_bytes() {
    let mut notification = vec![0xFDu8]; // rt_count = 0xFF - 0xFD = 2
    let frame_a = [0xAAu8; FRAME_SIZE];
    let frame_b = [0xBBu8; FRAME_SIZE];
    notification.extend_from_slice(&frame_a);
    notification.extend_from_slice(&frame_b);
    let tail = vec![0x11u8; 20];
    notification.extend_from_slice(&tail);

    let (real_time, send_buffer) = demux_notification(&notification);
    assert_eq!(real_time.len(), 2);
    assert_eq!(real_time[0], &frame_a[..]);
    assert_eq!(real_time[1], &frame_b[..]);
    assert_eq!(send_buffer, &tail[..]);
}

#[test]
fn rt_count_zero_leading_0xff_yields_no_real_time_frames() {
    let mut notification = vec![0xFFu8];
    let tail = vec![0x22u8; 50];
    notification.extend_from_slice(&tail);

    let (real_time, send_buffer) = demux_notification(&notification);
    assert!(real_time.is_empty());
    assert_eq!(send_buffer, &tail[..]);
}

#[test]
fn truncated_notification_yields_only_the_complete_frames_available() {
    let mut notification = vec![0xFCu8]; // claims rt_count = 3
    notification.extend_from_slice(&[0xCCu8; FRAME_SIZE]);
    notification.extend_from_slice(&[0x01u8; 10]); // short of a second full frame

    let (real_time, send_buffer) = demux_notification(&notification);
    assert_eq!(real_time.len(), 1);
    assert_eq!(send_buffer, &[0x01u8; 10][..]);
}
