//! Integration tests for the file-listing and download sub-protocols, driven against a
//! scripted transport that answers each request the way a live device would.

mod support;

use imu_rs::config::ClientConfig;
use imu_rs::registry::{header, FsBytes, FsFile, Packet};
use imu_rs::session::{filetransfer, Session};
use std::time::Duration;
use support::ScriptedTransport;

async fn session_with(script: Vec<(u16, Vec<Packet>)>) -> Session {
    let transport = Box::new(ScriptedTransport::new(script));
    Session::new(transport, ClientConfig::default()).await.unwrap()
}

#[tokio::test]
async fn list_files_collects_the_declared_count_in_index_order() {
    let session = session_with(vec![(
        header::CMD_FS_LIST_FILES,
        vec![
            Packet::FsFileCount(2),
            Packet::FsFile(FsFile {
                index: 0,
                filename: "session_000.bin".into(),
                size_bytes: 1024,
            }),
            Packet::FsFile(FsFile {
                index: 1,
                filename: "session_001.bin".into(),
                size_bytes: 2048,
            }),
        ],
    )])
    .await;

    let files = filetransfer::list_files(&session, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].filename, "session_000.bin");
    assert_eq!(files[1].size_bytes, 2048);
}

#[tokio::test]
async fn download_assembles_sequential_chunks_and_stops_at_end_of_file() {
    let session = session_with(vec![
        (
            header::CMD_FS_GET_BYTES,
            vec![
                Packet::FsBytes(FsBytes {
                    offset: 0,
                    data: vec![1, 2, 3, 4],
                }),
                Packet::FsBytes(FsBytes {
                    offset: 4,
                    data: vec![5, 6],
                }),
                Packet::FsBytes(FsBytes {
                    offset: 6,
                    data: Vec::new(),
                }),
            ],
        ),
        (
            header::CMD_FS_STOP_GET_BYTES,
            vec![Packet::AckFsStopGetBytes],
        ),
    ])
    .await;

    let downloaded = filetransfer::download(
        &session,
        "session_000.bin",
        None,
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(downloaded, vec![1, 2, 3, 4, 5, 6]);
}
