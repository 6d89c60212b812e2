use crate::support::run_round_trip;

#[tokio::test]
async fn empty_file_round_trips() {
    let (_, output_path, _send_dir, _recv_dir) = run_round_trip(&[], 262_144).await;
    let data = std::fs::read(&output_path).unwrap();
    assert!(data.is_empty());
    assert_eq!(
        hex::encode(sha256_of(&data)),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
    );
}

#[tokio::test]
async fn one_byte_file_round_trips() {
    let (_, output_path, _send_dir, _recv_dir) = run_round_trip(&[0x42], 1).await;
    let data = std::fs::read(&output_path).unwrap();
    assert_eq!(data, vec![0x42]);
    assert_eq!(
        hex::encode(sha256_of(&data)),
        "df7e70e5021544f4834bbee64a9e3789febc4be81470df629cad6ddb03320a5"
    );
}

#[tokio::test]
async fn boundary_sizes_round_trip() {
    let chunk_size = 256u32;
    for n in [
        chunk_size as usize - 1,
        chunk_size as usize,
        chunk_size as usize + 1,
        3 * chunk_size as usize,
    ] {
        let data: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let (_, output_path, _send_dir, _recv_dir) = run_round_trip(&data, chunk_size).await;
        let out = std::fs::read(&output_path).unwrap();
        assert_eq!(out, data, "mismatch for n={n}");
    }
}

#[tokio::test]
async fn multi_chunk_file_round_trips_with_parallel_workers() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
    let (_, output_path, _send_dir, _recv_dir) = run_round_trip(&data, 777).await;
    let out = std::fs::read(&output_path).unwrap();
    assert_eq!(out, data);
}

fn sha256_of(data: &[u8]) -> [u8; 32] {
    p2pxfer_core::crypto::sha256(data)
}
