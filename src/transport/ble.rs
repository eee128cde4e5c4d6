//! # BLE Transport and Demultiplexer
//!
//! Connects to a device over `bluest`, subscribes to TX notifications, and demultiplexes
//! each notification's leading "real-time count" byte into real-time frames and send-buffer
//! bytes per §4.3.

use super::{Channel, RawChunk, Transport};
use crate::constants::{BLE_RX_CHARACTERISTIC_UUID, BLE_TX_CHARACTERISTIC_UUID, FRAME_SIZE};
use crate::error::ImuError;
use async_trait::async_trait;
use bluest::{Device, Uuid};
use futures_util::StreamExt;
use tokio::sync::mpsc;

/// Splits one BLE notification buffer into its real-time frames and trailing send-buffer
/// bytes, per the `rt_count = 0xFF - leading_byte` contract.
///
/// Returns `(real_time_frames, send_buffer_tail)`. `real_time_frames` is always a whole
/// number of `FRAME_SIZE`-byte frames; a notification shorter than its declared `rt_count`
/// implies is truncated defensively rather than panicking, since a conforming device never
/// sends a partial real-time frame.
pub fn demux_notification(notification: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    if notification.is_empty() {
        return (Vec::new(), &[]);
    }
    let rt_count = (0xFFu16 - notification[0] as u16) as usize;
    let available = (notification.len() - 1) / FRAME_SIZE;
    let rt_count = rt_count.min(available);

    let mut frames = Vec::with_capacity(rt_count);
    for i in 0..rt_count {
        let start = 1 + i * FRAME_SIZE;
        frames.push(&notification[start..start + FRAME_SIZE]);
    }
    let tail_start = 1 + rt_count * FRAME_SIZE;
    (frames, &notification[tail_start..])
}

/// An open BLE connection to one device, subscribed to its TX characteristic.
pub struct BleTransport {
    device: Device,
    rx_characteristic: bluest::Characteristic,
    tx_characteristic: bluest::Characteristic,
}

impl BleTransport {
    /// Connects to `device` (already discovered via [`crate::scanner`]) and discovers the TX
    /// and RX characteristics declared in §6.
    pub async fn connect(adapter: &bluest::Adapter, device: Device) -> Result<Self, ImuError> {
        adapter
            .connect_device(&device)
            .await
            .map_err(|e| ImuError::Transport(format!("BLE connect failed: {e}")))?;

        let service_uuid = Uuid::parse_str(crate::constants::BLE_SERVICE_UUID)
            .expect("BLE_SERVICE_UUID is a valid UUID literal");
        let services = device
            .discover_services_with_uuid(service_uuid)
            .await
            .map_err(|e| ImuError::Transport(format!("service discovery failed: {e}")))?;
        let service = services
            .into_iter()
            .next()
            .ok_or_else(|| ImuError::Transport("device does not advertise the IMU service".into()))?;

        let characteristics = service
            .discover_characteristics()
            .await
            .map_err(|e| ImuError::Transport(format!("characteristic discovery failed: {e}")))?;

        let tx_uuid = Uuid::parse_str(BLE_TX_CHARACTERISTIC_UUID).unwrap();
        let rx_uuid = Uuid::parse_str(BLE_RX_CHARACTERISTIC_UUID).unwrap();

        let tx_characteristic = characteristics
            .iter()
            .find(|c| c.uuid() == tx_uuid)
            .cloned()
            .ok_or_else(|| ImuError::Transport("TX characteristic not found".into()))?;
        let rx_characteristic = characteristics
            .iter()
            .find(|c| c.uuid() == rx_uuid)
            .cloned()
            .ok_or_else(|| ImuError::Transport("RX characteristic not found".into()))?;

        Ok(BleTransport {
            device,
            rx_characteristic,
            tx_characteristic,
        })
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), ImuError> {
        self.rx_characteristic
            .write(frame)
            .await
            .map_err(|e| ImuError::Transport(format!("BLE write failed: {e}")))
    }

    fn recv_stream(&mut self) -> mpsc::Receiver<RawChunk> {
        let (tx, rx) = mpsc::channel(256);
        let characteristic = self.tx_characteristic.clone();
        tokio::spawn(async move {
            let mut notifications = match characteristic.notify().await {
                Ok(stream) => stream,
                Err(_) => return,
            };
            while let Some(Ok(notification)) = notifications.next().await {
                let (frames, tail) = demux_notification(&notification);
                for frame in frames {
                    if tx
                        .send(RawChunk {
                            channel: Channel::RealTime,
                            bytes: frame.to_vec(),
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                if !tail.is_empty()
                    && tx
                        .send(RawChunk {
                            channel: Channel::SendBuffer,
                            bytes: tail.to_vec(),
                        })
                        .await
                        .is_err()
                {
                    return;
                }
            }
        });
        rx
    }

    async fn disconnect(&mut self) -> Result<(), ImuError> {
        // bluest has no adapter handle on Device; the caller's Adapter::disconnect_device
        // is invoked by the owning Session, which holds the Adapter.
        let _ = &self.device;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    #[test]
    fn rt_count_zero_leading_0xff_yields_no_real_time_frames() {
        let mut notification = vec![0xFF];
        notification.extend_from_slice(&[1, 2, 3, 4, 5]);
        let (frames, tail) = demux_notification(&notification);
        assert!(frames.is_empty());
        assert_eq!(tail, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn two_real_time_frames_then_twenty_send_buffer_bytes() {
        let frame_a = encode(0x0001, &[1]);
        let frame_b = encode(0x0002, &[2]);
        let tail_bytes = vec![0xABu8; 20];

        let mut notification = vec![0xFD]; // rt_count = 0xFF - 0xFD = 2
        notification.extend_from_slice(&frame_a);
        notification.extend_from_slice(&frame_b);
        notification.extend_from_slice(&tail_bytes);

        let (frames, tail) = demux_notification(&notification);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], &frame_a[..]);
        assert_eq!(frames[1], &frame_b[..]);
        assert_eq!(tail, &tail_bytes[..]);
    }

    #[test]
    fn truncated_notification_yields_only_the_complete_frames_available() {
        let frame_a = encode(0x0001, &[1]);
        let mut notification = vec![0xFD]; // claims rt_count = 2
        notification.extend_from_slice(&frame_a);
        notification.extend_from_slice(&[0xAA; 10]); // not a full second frame

        let (frames, tail) = demux_notification(&notification);
        assert_eq!(frames.len(), 1);
        assert_eq!(tail, &[0xAA; 10]);
    }
}
