//! # Transport Abstraction
//!
//! A uniform interface above BLE, USB-serial, and file-playback peers. [`Session`] talks to
//! whichever [`Transport`] it was given without knowing which one it is.
//!
//! [`Session`]: crate::session::Session

pub mod ble;
pub mod file;
pub mod usb;

use crate::error::ImuError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One received channel's worth of frame bytes, tagged so a multiplexing transport (BLE) can
/// keep its real-time and send-buffer streams distinguishable downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// The reliable, in-order stream carrying everything except real-time snapshots.
    SendBuffer,
    /// The latest-snapshot sub-channel, framed one notification at a time on BLE.
    RealTime,
}

/// A chunk of raw bytes received on one channel, handed to the matching
/// [`Unpacker`](crate::unpacker::Unpacker).
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

/// Connects, writes whole frames, and streams raw received bytes. Implemented by the BLE,
/// USB-serial, and file-playback transports; [`crate::session::Session`] is generic over this.
#[async_trait]
pub trait Transport: Send {
    /// Writes one already-CRC'd, already-padded 244-byte frame to the peer.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), ImuError>;

    /// Takes ownership of the receive side: all raw bytes/chunks arriving after this call are
    /// delivered on the returned channel until the transport disconnects or is dropped.
    fn recv_stream(&mut self) -> mpsc::Receiver<RawChunk>;

    /// Tears down the connection, releasing any OS-level handle.
    async fn disconnect(&mut self) -> Result<(), ImuError>;
}
