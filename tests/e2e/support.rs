//! Shared helpers for spinning up a sender/receiver pair over real loopback
//! TCP sockets.

use std::path::{Path, PathBuf};

use p2pxfer_core::Config;
use p2pxfer_transfer::{Receiver, Sender};

pub async fn start_sender(file: &Path, transfer_id: &str) -> Sender {
    Sender::start(0, file, transfer_id.to_string(), Config::from_env())
        .await
        .expect("sender start")
}

pub async fn run_round_trip(
    input: &[u8],
    chunk_size: u32,
) -> (PathBuf, PathBuf, tempfile::TempDir, tempfile::TempDir) {
    let send_dir = tempfile::tempdir().unwrap();
    let recv_dir = tempfile::tempdir().unwrap();

    let input_path = send_dir.path().join("input.bin");
    std::fs::write(&input_path, input).unwrap();

    let mut config = Config::from_env();
    config.chunk_size = chunk_size;

    let sender = Sender::start(0, &input_path, "transfer-rt".to_string(), config)
        .await
        .expect("sender start");
    let port = sender.actual_port();

    let sender_task = tokio::spawn(async move { sender.serve_one().await });

    let receiver = Receiver::new(Config::from_env());
    let output_path = receiver
        .run("127.0.0.1", port, recv_dir.path(), None)
        .await
        .expect("receiver run");

    sender_task.await.unwrap().expect("sender serve_one");

    (input_path, output_path, send_dir, recv_dir)
}
