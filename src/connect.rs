//! # Connect Dispatcher
//!
//! Resolves a list of connection targets concurrently and returns fully connected
//! [`Session`]s in input order. If any target fails after others already connected, every
//! session opened so far is closed before the error is surfaced, per §4.7.

use crate::config::ClientConfig;
use crate::error::ImuError;
use crate::session::Session;
use crate::transport::ble::BleTransport;
use crate::transport::file::FileTransport;
use crate::transport::usb::UsbTransport;
use crate::transport::Transport;
use std::path::Path;

/// One requested connection target.
#[derive(Debug, Clone)]
pub enum ConnectTarget {
    /// A specific BLE device address, as surfaced by [`crate::scanner::scan`].
    Ble(String),
    /// The single USB-attached device. Only one `Usb` target may appear in a `connect` call.
    Usb,
    /// A recorded binary file, replayed through [`FileTransport`].
    File(std::path::PathBuf),
}

/// Concurrently opens every target, returning sessions in the same order as `targets`. On
/// any failure, every session that already connected is disconnected before the error
/// returns, so callers never have to clean up a partial fleet themselves.
pub async fn connect(
    targets: &[ConnectTarget],
    adapter: Option<&bluest::Adapter>,
    config: ClientConfig,
) -> Result<Vec<Session>, ImuError> {
    let futures = targets
        .iter()
        .map(|target| connect_one(target, adapter, config.clone()));
    let mut attempts = futures_util::future::join_all(futures).await;

    if let Some(first_err_index) = attempts.iter().position(|r| r.is_err()) {
        for attempt in attempts.iter_mut().take(first_err_index) {
            if let Ok(session) = attempt {
                session.disconnect().await;
            }
        }
        return Err(attempts
            .into_iter()
            .nth(first_err_index)
            .unwrap()
            .unwrap_err());
    }

    Ok(attempts.into_iter().map(|r| r.unwrap()).collect())
}

async fn connect_one(
    target: &ConnectTarget,
    adapter: Option<&bluest::Adapter>,
    config: ClientConfig,
) -> Result<Session, ImuError> {
    let transport: Box<dyn Transport> = match target {
        ConnectTarget::Ble(address) => {
            let adapter = adapter.ok_or_else(|| {
                ImuError::Other("a BLE target requires an Adapter to be supplied".into())
            })?;
            let device = find_device_by_address(adapter, address).await?;
            Box::new(BleTransport::connect(adapter, device).await?)
        }
        ConnectTarget::Usb => Box::new(UsbTransport::connect("/dev/ttyACM0", 115_200).await?),
        ConnectTarget::File(path) => Box::new(open_file_transport(path).await?),
    };

    Session::new(transport, config).await
}

async fn find_device_by_address(
    adapter: &bluest::Adapter,
    address: &str,
) -> Result<bluest::Device, ImuError> {
    use futures_util::StreamExt;
    let mut scan = crate::scanner::scan(adapter, &[]).await?;
    while let Some(advertisement) = scan.next().await {
        if advertisement.address == address {
            return Ok(advertisement.device);
        }
    }
    Err(ImuError::Transport(format!(
        "no BLE device with address {address} found while scanning"
    )))
}

async fn open_file_transport(path: &Path) -> Result<FileTransport, ImuError> {
    FileTransport::open(path).await
}
