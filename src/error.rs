//! # IMU Client Error Handling
//!
//! This module defines [`ImuError`], the single discriminated error type surfaced by every
//! fallible operation in the crate, per the error taxonomy in the protocol specification.

use thiserror::Error;

/// Represents the different error kinds that can occur while talking to an IMU device.
#[derive(Debug, Error)]
pub enum ImuError {
    /// A transport-level I/O failure (serial port, BLE adapter) or a mid-frame disconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// The frame's start byte, payload size, or CRC was invalid. Non-fatal to the session;
    /// the [`crate::unpacker::Unpacker`] resyncs and this is only surfaced for telemetry.
    #[error("frame error: {0}")]
    Frame(#[from] crate::frame::FrameError),

    /// A frame decoded cleanly but its header is not present in the packet registry.
    /// Carries the raw header and payload so forward-compatible callers can ignore it.
    #[error("unknown header: 0x{header:04X}")]
    UnknownHeader { header: u16, payload: Vec<u8> },

    /// A frame's header is known but its payload size does not match the registry's
    /// expectation for that variant. Fatal to this one frame, not to the session.
    #[error("decode error for header 0x{header:04X}: {reason}")]
    Decode { header: u16, reason: String },

    /// The device reported a `SensorError` packet.
    #[error("device error: {0:?}")]
    Device(DeviceErrorKind),

    /// A command was refused client-side because the cached sensor state forbids it.
    #[error("state error: {0}")]
    State(StateError),

    /// An expected echo/ack did not arrive within the configured deadline.
    #[error("timeout waiting for header 0x{expected:04X}")]
    Timeout { expected: u16 },

    /// The session was closed (explicitly, or by a fatal transport error) while a caller
    /// had a pending request.
    #[error("session disconnected")]
    Disconnected,

    /// The consumer queue reached capacity under the `error` overflow policy.
    #[error("consumer queue overflow")]
    QueueOverflow,

    /// Catch-all for conditions that don't warrant a dedicated variant.
    #[error("{0}")]
    Other(String),
}

/// Client-side refusals based on the cached sensor state mirror (§4.8 refusal policies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("device is already recording")]
    DeviceIsRecording,
    #[error("device is already streaming")]
    DeviceIsStreaming,
}

/// Mirrors the `errorCode` field of a `SensorError` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    FileNotFound,
    FileAlreadyExists,
    FileNameInvalid,
    FilesystemFull,
    WrongState,
    UnknownCommand,
    SendBufferFull,
    Other(u8),
}

impl From<u8> for DeviceErrorKind {
    fn from(code: u8) -> Self {
        match code {
            1 => DeviceErrorKind::FileNotFound,
            2 => DeviceErrorKind::FileAlreadyExists,
            3 => DeviceErrorKind::FileNameInvalid,
            4 => DeviceErrorKind::FilesystemFull,
            5 => DeviceErrorKind::WrongState,
            6 => DeviceErrorKind::UnknownCommand,
            7 => DeviceErrorKind::SendBufferFull,
            other => DeviceErrorKind::Other(other),
        }
    }
}

impl From<DeviceErrorKind> for u8 {
    fn from(kind: DeviceErrorKind) -> Self {
        match kind {
            DeviceErrorKind::FileNotFound => 1,
            DeviceErrorKind::FileAlreadyExists => 2,
            DeviceErrorKind::FileNameInvalid => 3,
            DeviceErrorKind::FilesystemFull => 4,
            DeviceErrorKind::WrongState => 5,
            DeviceErrorKind::UnknownCommand => 6,
            DeviceErrorKind::SendBufferFull => 7,
            DeviceErrorKind::Other(code) => code,
        }
    }
}
