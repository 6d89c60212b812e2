//! Receiver core: connect, drive the handshake and manifest reception,
//! pipeline chunk requests, assemble, verify, and finalize.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use p2pxfer_core::crypto::Keypair;
use p2pxfer_core::error::ProtocolError;
use p2pxfer_core::manifest::Manifest;
use p2pxfer_core::wire::{self, COMPLETION_SENTINEL};
use p2pxfer_core::Config;
use p2pxfer_engine::chunk_engine::{ChunkEngine, StoreOutcome};
use p2pxfer_engine::progress::{ProgressSnapshot, ProgressTracker};

use crate::error::TransferError;
use crate::frame_io::read_frame;
use crate::handshake::receiver_handshake;
use crate::session::TransferState;

pub struct Receiver {
    config: Config,
    manifest: StdMutex<Option<Manifest>>,
    progress: StdMutex<Option<Arc<ProgressTracker>>>,
    state: StdMutex<TransferState>,
    is_active: Arc<AtomicBool>,
    cancel_tx: broadcast::Sender<()>,
}

impl Receiver {
    pub fn new(config: Config) -> Self {
        let (cancel_tx, _) = broadcast::channel(1);
        Self {
            config,
            manifest: StdMutex::new(None),
            progress: StdMutex::new(None),
            state: StdMutex::new(TransferState::Idle),
            is_active: Arc::new(AtomicBool::new(true)),
            cancel_tx,
        }
    }

    pub fn manifest(&self) -> Option<Manifest> {
        self.manifest.lock().expect("manifest mutex poisoned").clone()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        match &*self.progress.lock().expect("progress mutex poisoned") {
            Some(p) => p.sample(),
            None => ProgressSnapshot {
                bytes_done: 0,
                total_bytes: 0,
                percent: 0.0,
                speed_bps: 0.0,
                eta_ms: None,
                chunks_done: 0,
                chunks_total: 0,
                file_name: String::new(),
            },
        }
    }

    pub fn state(&self) -> TransferState {
        *self.state.lock().expect("state mutex poisoned")
    }

    fn set_state(&self, s: TransferState) {
        *self.state.lock().expect("state mutex poisoned") = s;
    }

    pub fn cancel(&self) {
        self.is_active.store(false, Ordering::SeqCst);
        let _ = self.cancel_tx.send(());
        self.set_state(TransferState::Cancelled);
    }

    /// Connect to `(ip, port)`, perform the handshake, receive and validate
    /// the manifest, then assemble the file into `output_dir`.
    pub async fn run(
        &self,
        ip: &str,
        port: u16,
        output_dir: &Path,
        expected_transfer_id: Option<String>,
    ) -> Result<PathBuf, TransferError> {
        self.set_state(TransferState::Connecting);
        let stream = tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect((ip, port)),
        )
        .await
        .map_err(|_| TransferError::Timeout)??;

        let (mut read_half, mut write_half) = stream.into_split();

        self.set_state(TransferState::Handshaking);
        let keypair = Keypair::generate();
        let session = tokio::time::timeout(
            Duration::from_secs(30),
            receiver_handshake(
                &mut read_half,
                &mut write_half,
                &keypair,
                self.config.aead_info_string.as_bytes(),
            ),
        )
        .await
        .map_err(|_| TransferError::Timeout)??;

        self.set_state(TransferState::ReceivingManifest);
        let manifest_frame = read_frame(&mut read_half).await?;
        let manifest_plain = session.open(&manifest_frame)?;
        let manifest = Manifest::from_wire(&manifest_plain)?;

        if let Some(expected) = &expected_transfer_id {
            if expected != &manifest.transfer_id {
                return Err(ProtocolError::TransferIdMismatch {
                    expected: expected.clone(),
                    actual: manifest.transfer_id.clone(),
                }
                .into());
            }
        }

        *self.manifest.lock().expect("manifest mutex poisoned") = Some(manifest.clone());

        let tracker = Arc::new(ProgressTracker::new(
            manifest.file_name.clone(),
            manifest.file_size,
            manifest.chunk_count,
        ));
        *self.progress.lock().expect("progress mutex poisoned") = Some(Arc::clone(&tracker));

        let engine = Arc::new(ChunkEngine::create(manifest, output_dir)?);

        self.set_state(TransferState::Transferring);
        let session = Arc::new(session);

        let requester = tokio::spawn(run_requester(
            write_half,
            Arc::clone(&engine),
            self.config.request_batch_size,
            self.cancel_tx.subscribe(),
        ));
        let receiver_loop = tokio::spawn(run_receiver_loop(
            read_half,
            Arc::clone(&engine),
            Arc::clone(&session),
            Arc::clone(&tracker),
            self.cancel_tx.subscribe(),
        ));

        let requester_result = requester
            .await
            .unwrap_or_else(|e| Err(join_error(e)));
        let receiver_result = receiver_loop
            .await
            .unwrap_or_else(|e| Err(join_error(e)));
        let result = requester_result.and(receiver_result);

        match result {
            Ok(()) if !self.is_active.load(Ordering::SeqCst) => {
                engine.delete_partial();
                self.set_state(TransferState::Cancelled);
                Err(TransferError::Cancelled)
            }
            Err(e) => {
                engine.delete_partial();
                if self.is_active.load(Ordering::SeqCst) {
                    self.set_state(TransferState::Failed);
                } else {
                    self.set_state(TransferState::Cancelled);
                }
                Err(e)
            }
            Ok(()) => {
                self.set_state(TransferState::Assembling);
                match engine.finalize() {
                    Ok(()) => {
                        self.set_state(TransferState::Completed);
                        Ok(engine.output_path().to_path_buf())
                    }
                    Err(e) => {
                        self.set_state(TransferState::Failed);
                        Err(e.into())
                    }
                }
            }
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// Periodically requests missing chunks in batches, stopping once the
/// engine reports completion by writing the completion sentinel.
async fn run_requester(
    mut writer: OwnedWriteHalf,
    engine: Arc<ChunkEngine>,
    batch_size: u32,
    mut cancel_rx: broadcast::Receiver<()>,
) -> Result<(), TransferError> {
    let mut interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            biased;
            _ = cancel_rx.recv() => return Err(TransferError::Cancelled),
            _ = interval.tick() => {}
        }

        if engine.is_complete() {
            writer.write_all(&wire::encode_request(COMPLETION_SENTINEL)).await?;
            writer.shutdown().await.ok();
            return Ok(());
        }

        let missing = engine.missing_chunks();
        for index in missing.into_iter().take(batch_size as usize) {
            writer
                .write_all(&wire::encode_request(index as i32))
                .await?;
        }
    }
}

/// Reads framed chunk responses, decrypts and verifies each, and stores it
/// via the chunk engine. A digest mismatch or decrypt failure is logged and
/// left for the requester to re-request; it is never fatal on its own.
async fn run_receiver_loop(
    mut reader: OwnedReadHalf,
    engine: Arc<ChunkEngine>,
    session: Arc<crate::session::AeadSession>,
    tracker: Arc<ProgressTracker>,
    mut cancel_rx: broadcast::Receiver<()>,
) -> Result<(), TransferError> {
    loop {
        if engine.is_complete() {
            return Ok(());
        }

        let frame = tokio::select! {
            biased;
            _ = cancel_rx.recv() => return Err(TransferError::Cancelled),
            r = read_frame(&mut reader) => r,
        };

        let frame = match frame {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && engine.is_complete() => {
                return Ok(())
            }
            Err(e) => return Err(e.into()),
        };

        if frame.len() < 4 {
            tracing::warn!("chunk response frame shorter than index header, dropping");
            continue;
        }
        let (index_bytes, encrypted) = frame.split_at(4);
        let index = wire::decode_chunk_index(index_bytes.try_into().expect("split_at(4)"));

        let plaintext = match session.open(encrypted) {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(index, "AEAD decrypt failed for chunk frame, dropping");
                continue;
            }
        };

        match engine.store_chunk(index, &plaintext) {
            StoreOutcome::Stored => tracker.record_chunk(plaintext.len() as u64),
            StoreOutcome::Duplicate => {}
            StoreOutcome::Rejected => {
                tracing::warn!(index, "chunk rejected, will be re-requested")
            }
        }
    }
}
