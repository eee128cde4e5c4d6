//! # Device
//!
//! The high-level, semantic API: methods named after what a caller wants to do
//! (`set_absolute_time`, `start_real_time_streaming`, `download_file`) instead of raw
//! header/payload plumbing. Every method here is a thin composition of [`Session::send`] /
//! [`Session::send_and_await`] plus the refusal checks from §4.8.

use crate::config::ClientConfig;
use crate::error::ImuError;
use crate::registry::{self, DeviceInfo, FsFile, Packet, SensorState, Status};
use crate::session::clock::{ClockEstimate, ClockHandle};
use crate::session::{filetransfer, Session};
use std::sync::Arc;
use std::time::Duration;

/// Which transport a [`Device`] is talking over, surfaced for diagnostics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Ble,
    Usb,
    File,
}

/// A connected IMU, wrapping a [`Session`] with the device's identity and an optional clock
/// round-trip task.
pub struct Device {
    session: Arc<Session>,
    transport_kind: TransportKind,
    info: DeviceInfo,
    clock: Option<ClockHandle>,
    clock_task: Option<tokio::task::JoinHandle<()>>,
}

impl Device {
    /// Sends `CmdGetDeviceInfo`, waits for the reply, and optionally starts the clock
    /// round-trip task, per the config's `clock_roundtrip_enabled` flag.
    pub async fn init(
        session: Session,
        transport_kind: TransportKind,
    ) -> Result<Self, ImuError> {
        let config = session.config().clone();
        let session = Arc::new(session);

        let reply = session
            .send_and_await(
                &Packet::CmdGetDeviceInfo,
                &[registry::header::DATA_DEVICE_INFO],
                config.echo_timeout,
            )
            .await?;
        let info = match reply {
            Packet::DeviceInfo(info) => info,
            other => {
                return Err(ImuError::Other(format!(
                    "expected DeviceInfo, got {other:?}"
                )))
            }
        };

        let (clock, clock_task) = if config.clock_roundtrip_enabled {
            let (handle, task) = crate::session::clock::spawn(
                session.clone(),
                config.clock_roundtrip_interval,
                config.echo_timeout,
            );
            (Some(handle), Some(task))
        } else {
            (None, None)
        };

        Ok(Device {
            session,
            transport_kind,
            info,
            clock,
            clock_task,
        })
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn config(&self) -> &ClientConfig {
        self.session.config()
    }

    /// The most recent clock delay/offset estimate, or `None` if the round-trip task isn't
    /// running or hasn't completed an exchange yet.
    pub fn clock_estimate(&self) -> Option<ClockEstimate> {
        self.clock.as_ref().and_then(|handle| handle.latest())
    }

    /// Pulls the next packet the receive task didn't route to a pending waiter: unsolicited
    /// status pushes, real-time sensor data, and anything else not awaited synchronously.
    pub async fn next_packet(&self) -> Option<Packet> {
        self.session.next_packet().await
    }

    /// Sets the device's absolute wall-clock time.
    pub async fn set_absolute_time(&self, timestamp_ns: i64) -> Result<(), ImuError> {
        self.session
            .send_and_await(
                &Packet::SetAbsoluteTime { timestamp_ns },
                &[registry::header::DATA_ABSOLUTE_TIME],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    /// Reads the device's cached operating state and battery level.
    pub async fn get_status(&self) -> Result<Status, ImuError> {
        let reply = self
            .session
            .send_and_await(
                &Packet::GetStatus,
                &[registry::header::DATA_STATUS],
                self.config().echo_timeout,
            )
            .await?;
        match reply {
            Packet::Status(status) => Ok(status),
            other => Err(ImuError::Other(format!("expected Status, got {other:?}"))),
        }
    }

    /// Starts on-device recording, refusing client-side if the cached state already says
    /// `Recording`.
    pub async fn start_recording(&self) -> Result<(), ImuError> {
        self.session.check_start_allowed(SensorState::Recording)?;
        self.session
            .send_and_await(
                &Packet::StartRecording,
                &[registry::header::ACK_START_RECORDING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn stop_recording(&self) -> Result<(), ImuError> {
        self.session
            .send_and_await(
                &Packet::StopRecording,
                &[registry::header::ACK_STOP_RECORDING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    /// Starts on-device streaming to the internal send buffer, refusing client-side if the
    /// cached state already says `Streaming`.
    pub async fn start_streaming(&self) -> Result<(), ImuError> {
        self.session.check_start_allowed(SensorState::Streaming)?;
        self.session
            .send_and_await(
                &Packet::StartStreaming,
                &[registry::header::ACK_START_STREAMING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn stop_streaming(&self) -> Result<(), ImuError> {
        self.session
            .send_and_await(
                &Packet::StopStreaming,
                &[registry::header::ACK_STOP_STREAMING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    /// Starts the real-time BLE/USB sub-channel at `rate_hz`, or the configured default rate
    /// when `rate_hz == 0`.
    pub async fn start_real_time_streaming(&self, rate_hz: u16) -> Result<(), ImuError> {
        let rate_hz = if rate_hz == 0 {
            self.config().default_real_time_rate_hz
        } else {
            rate_hz
        };
        self.session
            .send_and_await(
                &Packet::StartRealTimeStreaming { rate_hz },
                &[registry::header::ACK_START_REAL_TIME_STREAMING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn stop_real_time_streaming(&self) -> Result<(), ImuError> {
        self.session
            .send_and_await(
                &Packet::StopRealTimeStreaming,
                &[registry::header::ACK_STOP_REAL_TIME_STREAMING],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn set_led(&self, r: u8, g: u8, b: u8) -> Result<(), ImuError> {
        self.session
            .send_and_await(
                &Packet::SetLed { r, g, b },
                &[registry::header::ACK_SET_LED],
                self.config().echo_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<FsFile>, ImuError> {
        filetransfer::list_files(&self.session, self.config().fs_listing_timeout).await
    }

    /// Downloads `filename`. Governed by `download_idle_timeout` (a progress-based watchdog
    /// reset on every received chunk) rather than a single fixed deadline for the whole
    /// transfer, so a slow but still-progressing download doesn't time out early.
    pub async fn download_file(
        &self,
        filename: &str,
        range: Option<(u32, u32)>,
    ) -> Result<Vec<u8>, ImuError> {
        filetransfer::download(
            &self.session,
            filename,
            range,
            self.config().download_idle_timeout,
            self.config().echo_timeout,
        )
        .await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<(), ImuError> {
        filetransfer::delete_file(&self.session, filename, self.config().echo_timeout).await
    }

    pub async fn format_filesystem(&self) -> Result<(), ImuError> {
        filetransfer::format(&self.session, self.config().echo_timeout).await
    }

    /// Closes the session and stops the clock round-trip task if one was running.
    pub async fn disconnect(self) {
        if let Some(task) = self.clock_task {
            task.abort();
            let _ = task.await;
        }
        self.session.disconnect_shared().await;
    }
}
