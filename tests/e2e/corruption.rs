//! A TCP relay that flips one bit of the first chunk-response frame in
//! transit, exercising the bit-flip-mid-stream scenario without any hook
//! into the sender itself.

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use p2pxfer_core::wire;
use p2pxfer_core::Config;
use p2pxfer_transfer::frame_io::read_frame;
use p2pxfer_transfer::{Receiver, Sender};

#[tokio::test]
async fn bit_flip_in_one_chunk_frame_is_recovered_by_re_request() {
    let send_dir = tempfile::tempdir().unwrap();
    let recv_dir = tempfile::tempdir().unwrap();
    let input_path = send_dir.path().join("input.bin");
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 256) as u8).collect();
    std::fs::write(&input_path, &data).unwrap();

    let mut config = Config::from_env();
    config.chunk_size = 32 * 1024;

    let sender = Sender::start(0, &input_path, "transfer-corrupt".to_string(), config.clone())
        .await
        .unwrap();
    let sender_port = sender.actual_port();
    let sender_task = tokio::spawn(async move { sender.serve_one().await });

    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_port = relay_listener.local_addr().unwrap().port();

    let relay_task = tokio::spawn(async move {
        let (downstream, _) = relay_listener.accept().await.unwrap();
        let upstream = TcpStream::connect(("127.0.0.1", sender_port)).await.unwrap();
        relay(downstream, upstream).await;
    });

    let receiver = Receiver::new(config);
    let output_path = receiver
        .run("127.0.0.1", relay_port, recv_dir.path(), None)
        .await
        .expect("receiver should recover from one corrupted frame");

    sender_task.await.unwrap().expect("sender serve_one");
    let _ = relay_task.await;

    assert_eq!(std::fs::read(output_path).unwrap(), data);
}

/// Forward `downstream` (receiver side) <-> `upstream` (sender side),
/// corrupting one bit of the third framed message from the sender (frame 0
/// is the sender's public key, frame 1 is the manifest, frame 2 is the
/// first chunk response).
async fn relay(downstream: TcpStream, upstream: TcpStream) {
    let (down_read, down_write) = downstream.into_split();
    let (up_read, up_write) = upstream.into_split();

    let upstream_to_downstream = tokio::spawn(corrupt_nth_frame(up_read, down_write, 2));
    let downstream_to_upstream = tokio::spawn(passthrough(down_read, up_write));

    let _ = tokio::join!(upstream_to_downstream, downstream_to_upstream);
}

async fn corrupt_nth_frame(
    mut reader: tokio::net::tcp::OwnedReadHalf,
    mut writer: tokio::net::tcp::OwnedWriteHalf,
    target_index: usize,
) {
    let mut index = 0usize;
    loop {
        let mut payload = match read_frame(&mut reader).await {
            Ok(p) => p,
            Err(_) => return,
        };

        if index == target_index && !payload.is_empty() {
            let last = payload.len() - 1;
            payload[last] ^= 0x01;
        }
        index += 1;

        let Ok(frame) = wire::encode_frame(&payload) else { return };
        if writer.write_all(&frame).await.is_err() {
            return;
        }
    }
}

async fn passthrough(
    mut reader: tokio::net::tcp::OwnedReadHalf,
    mut writer: tokio::net::tcp::OwnedWriteHalf,
) {
    let _ = tokio::io::copy(&mut reader, &mut writer).await;
}
