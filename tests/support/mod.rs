//! Test-only transport double: answers each outbound frame's header with a scripted sequence
//! of response packets, one at a time with a short real delay between them so a multi-chunk
//! response (file listing, file download) paces the way a live device would instead of
//! racing the receive task's dispatch loop.

use async_trait::async_trait;
use imu_rs::error::ImuError;
use imu_rs::frame::encode;
use imu_rs::registry::{self, Packet};
use imu_rs::transport::{Channel, RawChunk, Transport};
use std::time::Duration;
use tokio::sync::mpsc;

const STEP_DELAY: Duration = Duration::from_millis(5);

pub struct ScriptedTransport {
    script: Option<Vec<(u16, Vec<Packet>)>>,
    trigger_tx: mpsc::UnboundedSender<u16>,
    trigger_rx: Option<mpsc::UnboundedReceiver<u16>>,
}

impl ScriptedTransport {
    /// `script` maps a triggering request header to the sequence of packets the device emits
    /// in response. Each trigger fires at most once, in the order supplied.
    pub fn new(script: Vec<(u16, Vec<Packet>)>) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        ScriptedTransport {
            script: Some(script),
            trigger_tx,
            trigger_rx: Some(trigger_rx),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), ImuError> {
        let decoded = imu_rs::frame::decode(frame)?;
        let _ = self.trigger_tx.send(decoded.header);
        Ok(())
    }

    fn recv_stream(&mut self) -> mpsc::Receiver<RawChunk> {
        let (tx, rx) = mpsc::channel(64);
        let mut script = self.script.take().unwrap_or_default();
        let mut trigger_rx = self.trigger_rx.take().expect("recv_stream called twice");

        tokio::spawn(async move {
            while let Some(header) = trigger_rx.recv().await {
                let Some(position) = script.iter().position(|(trigger, _)| *trigger == header) else {
                    continue;
                };
                let (_, responses) = script.remove(position);
                for packet in responses {
                    tokio::time::sleep(STEP_DELAY).await;
                    let (header_code, payload) = registry::encode(&packet).unwrap();
                    let bytes = encode(header_code, &payload).to_vec();
                    if tx
                        .send(RawChunk {
                            channel: Channel::SendBuffer,
                            bytes,
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });

        rx
    }

    async fn disconnect(&mut self) -> Result<(), ImuError> {
        Ok(())
    }
}
