use p2pxfer_core::Config;
use p2pxfer_transfer::{Receiver, Sender, TransferError};

#[tokio::test]
async fn transfer_id_mismatch_fails_before_any_chunk_request() {
    let send_dir = tempfile::tempdir().unwrap();
    let recv_dir = tempfile::tempdir().unwrap();
    let input_path = send_dir.path().join("input.bin");
    std::fs::write(&input_path, b"some file contents").unwrap();

    let config = Config::from_env();
    let sender = Sender::start(0, &input_path, "actual-id".to_string(), config.clone())
        .await
        .unwrap();
    let port = sender.actual_port();
    let sender_task = tokio::spawn(async move { sender.serve_one().await });

    let receiver = Receiver::new(config);
    let result = receiver
        .run(
            "127.0.0.1",
            port,
            recv_dir.path(),
            Some("expected-id".to_string()),
        )
        .await;

    assert!(matches!(result, Err(TransferError::Protocol(_))));
    assert!(!recv_dir.path().join("input.bin").exists());

    // The sender side observes the connection close without ever seeing a
    // chunk request; it's fine for serve_one to end in any outcome here
    // since the receiver never reaches the chunk-request loop.
    let _ = sender_task.await;
}
