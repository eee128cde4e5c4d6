//! # File Transfer
//!
//! Implements the two filesystem sub-protocols layered on top of [`Session`]: listing the
//! files recorded on the device, and downloading one by byte range, per §4.9.

use crate::error::ImuError;
use crate::registry::{self, FsBytes, FsFile, FsGetBytes, Packet};
use crate::session::Session;
use std::time::Duration;

/// How long to wait after the last byte arrives before sending `CmdFsStopGetBytes`, per the
/// grace-period behavior in §4.9.
const STOP_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Lists every file recorded on the device, in device index order.
pub async fn list_files(session: &Session, timeout: Duration) -> Result<Vec<FsFile>, ImuError> {
    let count_packet = session
        .send_and_await(
            &Packet::FsListFiles,
            &[registry::header::DATA_FS_FILE_COUNT],
            timeout,
        )
        .await?;
    let count = match count_packet {
        Packet::FsFileCount(count) => count,
        other => {
            return Err(ImuError::Other(format!(
                "expected FsFileCount, got {other:?}"
            )))
        }
    };

    let mut files = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let file_packet = session
            .send_and_await_reply_only(&[registry::header::DATA_FS_FILE], timeout)
            .await?;
        match file_packet {
            Packet::FsFile(file) => files.push(file),
            other => {
                return Err(ImuError::Other(format!(
                    "expected FsFile, got {other:?}"
                )))
            }
        }
    }
    Ok(files)
}

/// Downloads `filename`, optionally restricted to `[start_pos, end_pos)`. Pass `None` for
/// `range` to request the whole file (the device returns its size via the first chunk's
/// implicit end when `end_pos == 0`, per §4.9).
///
/// Re-requests from the last confirmed offset if a gap is detected in the incoming stream.
/// `idle_timeout` bounds the wait for each *next* chunk (a progress-based watchdog, reset on
/// every chunk received) rather than the transfer as a whole, so a slow but still-progressing
/// download never times out on its own. Once the transfer is judged complete, `STOP_GRACE_PERIOD`
/// passes and then `CmdFsStopGetBytes` is sent, awaited with the unrelated `stop_timeout`
/// (a simple echo, not part of the download's progress watchdog).
pub async fn download(
    session: &Session,
    filename: &str,
    range: Option<(u32, u32)>,
    idle_timeout: Duration,
    stop_timeout: Duration,
) -> Result<Vec<u8>, ImuError> {
    let (start_pos, end_pos) = range.unwrap_or((0, 0));
    let mut assembled: Vec<u8> = Vec::new();
    let mut next_offset = start_pos;

    request_bytes(session, filename, next_offset, end_pos).await?;

    loop {
        match recv_fs_bytes(session, idle_timeout).await {
            Ok(bytes) => {
                if bytes.offset != next_offset {
                    // Gap or overlap: re-request starting from the last confirmed offset.
                    request_bytes(session, filename, next_offset, end_pos).await?;
                    continue;
                }
                next_offset += bytes.data.len() as u32;
                assembled.extend_from_slice(&bytes.data);
                if bytes.data.is_empty() || (end_pos != 0 && next_offset >= end_pos) {
                    break;
                }
            }
            Err(ImuError::Timeout { .. }) => break,
            Err(err) => return Err(err),
        }
    }

    // Give the device a moment to flush any bytes already in flight before it sees the stop.
    tokio::time::sleep(STOP_GRACE_PERIOD).await;
    stop_transfer(session, stop_timeout).await?;
    Ok(assembled)
}

async fn request_bytes(
    session: &Session,
    filename: &str,
    start_pos: u32,
    end_pos: u32,
) -> Result<(), ImuError> {
    session
        .send(&Packet::FsGetBytes(FsGetBytes {
            filename: filename.to_string(),
            start_pos,
            end_pos,
        }))
        .await
}

async fn recv_fs_bytes(session: &Session, timeout: Duration) -> Result<FsBytes, ImuError> {
    let packet = session
        .send_and_await_reply_only(&[registry::header::DATA_FS_BYTES], timeout)
        .await?;
    match packet {
        Packet::FsBytes(bytes) => Ok(bytes),
        other => Err(ImuError::Other(format!(
            "expected FsBytes, got {other:?}"
        ))),
    }
}

async fn stop_transfer(session: &Session, timeout: Duration) -> Result<(), ImuError> {
    session
        .send_and_await(
            &Packet::FsStopGetBytes,
            &[registry::header::ACK_FS_STOP_GET_BYTES],
            timeout,
        )
        .await?;
    Ok(())
}

/// Deletes a file from the device's filesystem.
pub async fn delete_file(session: &Session, filename: &str, timeout: Duration) -> Result<(), ImuError> {
    session
        .send_and_await(
            &Packet::FsDeleteFile {
                filename: filename.to_string(),
            },
            &[registry::header::ACK_FS_DELETE_FILE],
            timeout,
        )
        .await?;
    Ok(())
}

/// Erases the device's filesystem entirely.
pub async fn format(session: &Session, timeout: Duration) -> Result<(), ImuError> {
    session
        .send_and_await(&Packet::FsFormat, &[registry::header::ACK_FS_FORMAT], timeout)
        .await?;
    Ok(())
}

