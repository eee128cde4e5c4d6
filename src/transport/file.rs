//! # File-Playback Transport
//!
//! Replays a previously recorded binary file (a direct concatenation of frames, per §6) at no
//! wall-clock rate. Useful for tests and offline analysis: feeding the whole file through an
//! [`Unpacker`](crate::unpacker::Unpacker) is equivalent to having received it live.

use super::{Channel, RawChunk, Transport};
use crate::error::ImuError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Plays a byte buffer back as a single send-buffer channel. `send_frame` is a no-op sink:
/// there is no live peer to write to.
pub struct FileTransport {
    bytes: Vec<u8>,
    chunk_size: usize,
}

impl FileTransport {
    /// Loads `path` fully into memory for playback.
    pub async fn open(path: &std::path::Path) -> Result<Self, ImuError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImuError::Transport(format!("failed to read {}: {e}", path.display())))?;
        Ok(FileTransport {
            bytes,
            chunk_size: crate::constants::FRAME_SIZE,
        })
    }

    /// Wraps an in-memory buffer directly, for tests that don't want to touch the filesystem.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        FileTransport {
            bytes,
            chunk_size: crate::constants::FRAME_SIZE,
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn send_frame(&mut self, _frame: &[u8]) -> Result<(), ImuError> {
        Ok(())
    }

    fn recv_stream(&mut self) -> mpsc::Receiver<RawChunk> {
        let (tx, rx) = mpsc::channel(64);
        let bytes = std::mem::take(&mut self.bytes);
        let chunk_size = self.chunk_size;
        tokio::spawn(async move {
            for chunk in bytes.chunks(chunk_size) {
                if tx
                    .send(RawChunk {
                        channel: Channel::SendBuffer,
                        bytes: chunk.to_vec(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        rx
    }

    async fn disconnect(&mut self) -> Result<(), ImuError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    #[tokio::test]
    async fn replays_every_byte_on_the_send_buffer_channel() {
        let mut bytes = Vec::new();
        bytes.extend(encode(0x0001, &[1, 2, 3]));
        bytes.extend(encode(0x0002, &[4, 5]));

        let mut transport = FileTransport::from_bytes(bytes.clone());
        let mut rx = transport.recv_stream();

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            assert_eq!(chunk.channel, Channel::SendBuffer);
            received.extend(chunk.bytes);
        }
        assert_eq!(received, bytes);
    }

    #[tokio::test]
    async fn open_reads_a_recorded_frame_file_from_disk() {
        let mut bytes = Vec::new();
        bytes.extend(encode(0x0001, &[7, 8, 9]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        tokio::fs::write(&path, &bytes).await.unwrap();

        let mut transport = FileTransport::open(&path).await.unwrap();
        let mut rx = transport.recv_stream();

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend(chunk.bytes);
        }
        assert_eq!(received, bytes);
    }
}
