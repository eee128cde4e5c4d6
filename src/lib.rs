//! # imu-rs
//!
//! A host-side client library for a wearable IMU that speaks a fixed-size binary frame
//! protocol over BLE or USB CDC-ACM. Connect with [`connect::connect`], obtain a
//! [`device::Device`], and drive recording, real-time streaming, and file transfer through
//! its methods.
//!
//! ```no_run
//! use imu_rs::config::ClientConfig;
//! use imu_rs::connect::{connect, ConnectTarget};
//! use imu_rs::device::{Device, TransportKind};
//!
//! # async fn run() -> Result<(), imu_rs::error::ImuError> {
//! let targets = [ConnectTarget::Usb];
//! let mut sessions = connect(&targets, None, ClientConfig::default()).await?;
//! let session = sessions.remove(0);
//! let device = Device::init(session, TransportKind::Usb).await?;
//! device.set_absolute_time(0).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connect;
pub mod constants;
pub mod device;
pub mod error;
pub mod fixedpoint;
pub mod frame;
pub mod instrumentation;
pub mod logging;
pub mod registry;
pub mod sample;
pub mod scanner;
pub mod session;
pub mod transport;
pub mod unpacker;

pub use device::Device;
pub use error::ImuError;
pub use registry::Packet;
pub use sample::SensorSample;
pub use session::Session;
