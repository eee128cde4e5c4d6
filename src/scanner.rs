//! # Scanner
//!
//! Discovers devices advertising the IMU service UUID, optionally filtered by name prefix,
//! and deduplicates repeated advertisements by address within one scan session.

use crate::constants::BLE_SERVICE_UUID;
use crate::error::ImuError;
use bluest::Uuid;
use futures_util::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;

/// One discovered advertisement.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub device: bluest::Device,
}

/// Scans for devices advertising [`BLE_SERVICE_UUID`], yielding each distinct address once.
///
/// `name_prefixes`: if non-empty, only advertisements whose name starts with one of these
/// prefixes are yielded (typical prefix: `"IMU_"`).
pub async fn scan(
    adapter: &bluest::Adapter,
    name_prefixes: &[String],
) -> Result<Pin<Box<dyn Stream<Item = Advertisement> + Send + '_>>, ImuError> {
    let service_uuid =
        Uuid::parse_str(BLE_SERVICE_UUID).expect("BLE_SERVICE_UUID is a valid UUID literal");
    let raw = adapter
        .scan(&[service_uuid])
        .await
        .map_err(|e| ImuError::Transport(format!("BLE scan failed to start: {e}")))?;

    let prefixes = name_prefixes.to_vec();
    let mut seen = HashSet::new();

    let stream = raw.filter_map(move |discovered| {
        let address = format!("{:?}", discovered.device.id());
        let name = discovered.device.name().ok();
        let rssi = discovered.rssi;
        let device = discovered.device.clone();
        let already_seen = !seen.insert(address.clone());

        let matches = already_seen == false
            && (prefixes.is_empty()
                || name
                    .as_deref()
                    .map(|n| prefixes.iter().any(|p| n.starts_with(p.as_str())))
                    .unwrap_or(false));

        async move {
            matches.then_some(Advertisement {
                address,
                name,
                rssi,
                device,
            })
        }
    });

    Ok(Box::pin(stream))
}
