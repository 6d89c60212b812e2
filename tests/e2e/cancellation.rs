use std::time::Duration;

use p2pxfer_core::Config;
use p2pxfer_transfer::{Receiver, Sender};

#[tokio::test]
async fn cancel_mid_transfer_removes_partial_file_and_allows_retry() {
    let send_dir = tempfile::tempdir().unwrap();
    let recv_dir = tempfile::tempdir().unwrap();
    let input_path = send_dir.path().join("input.bin");
    let data: Vec<u8> = (0..2_000_000u32).map(|i| (i % 256) as u8).collect();
    std::fs::write(&input_path, &data).unwrap();

    let mut config = Config::from_env();
    config.chunk_size = 4096;

    let sender = Sender::start(0, &input_path, "transfer-cancel".to_string(), config.clone())
        .await
        .unwrap();
    let port = sender.actual_port();
    let _sender_task = tokio::spawn(async move {
        let _ = sender.serve_one().await;
    });

    let receiver = std::sync::Arc::new(Receiver::new(config.clone()));
    let receiver_for_run = std::sync::Arc::clone(&receiver);
    let output_dir = recv_dir.path().to_path_buf();
    let run_task = tokio::spawn(async move {
        receiver_for_run.run("127.0.0.1", port, &output_dir, None).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    receiver.cancel();

    let result = run_task.await.unwrap();
    assert!(result.is_err(), "cancelled transfer must return an error");

    let partial_path = recv_dir.path().join("input.bin");
    assert!(!partial_path.exists(), "partial output must be deleted on cancel");

    // A fresh transfer against the same directory succeeds.
    let sender2 = Sender::start(0, &input_path, "transfer-cancel-2".to_string(), config.clone())
        .await
        .unwrap();
    let port2 = sender2.actual_port();
    let sender2_task = tokio::spawn(async move { sender2.serve_one().await });

    let receiver2 = Receiver::new(config);
    let output_path = receiver2
        .run("127.0.0.1", port2, recv_dir.path(), None)
        .await
        .expect("retry transfer should succeed");

    sender2_task.await.unwrap().unwrap();
    assert_eq!(std::fs::read(output_path).unwrap(), data);
}
