//! # USB Serial Transport
//!
//! A CDC-ACM serial port carrying a single interleaved byte stream: real-time and
//! send-buffer packets arrive on the same stream, distinguished only by header. Per §6, the
//! host must write `CmdGetDeviceInfo` first to elicit transmission from the device.

use super::{Channel, RawChunk, Transport};
use crate::error::ImuError;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;

const READ_CHUNK_SIZE: usize = 4096;

/// A handle to one open USB CDC-ACM serial connection. Split into independent read/write
/// halves up front so `recv_stream` can hand the read half to its own task.
pub struct UsbTransport {
    writer: WriteHalf<tokio_serial::SerialStream>,
    reader: Option<ReadHalf<tokio_serial::SerialStream>>,
}

impl UsbTransport {
    /// Opens `port_name` at the device's fixed baud rate.
    pub async fn connect(port_name: &str, baud_rate: u32) -> Result<Self, ImuError> {
        let port = tokio_serial::new(port_name, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .open_native_async()
            .map_err(|e| ImuError::Transport(format!("failed to open {port_name}: {e}")))?;
        let (reader, writer) = tokio::io::split(port);
        Ok(UsbTransport {
            writer,
            reader: Some(reader),
        })
    }
}

#[async_trait]
impl Transport for UsbTransport {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), ImuError> {
        self.writer
            .write_all(frame)
            .await
            .map_err(|e| ImuError::Transport(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ImuError::Transport(e.to_string()))
    }

    fn recv_stream(&mut self) -> mpsc::Receiver<RawChunk> {
        let (tx, rx) = mpsc::channel(64);
        let mut reader = self
            .reader
            .take()
            .expect("recv_stream called more than once on the same UsbTransport");
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = RawChunk {
                            channel: Channel::SendBuffer,
                            bytes: buf[..n].to_vec(),
                        };
                        if tx.send(chunk).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        rx
    }

    async fn disconnect(&mut self) -> Result<(), ImuError> {
        // SerialStream has no explicit close; dropping the handle releases the OS descriptor.
        Ok(())
    }
}
