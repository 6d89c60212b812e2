//! Sender core: listen, accept one peer, serve the manifest, then serve
//! chunk requests with a bounded-parallelism worker pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};

use p2pxfer_core::crypto::Keypair;
use p2pxfer_core::manifest::Manifest;
use p2pxfer_core::wire::{self, COMPLETION_SENTINEL};
use p2pxfer_core::Config;
use p2pxfer_engine::progress::{ProgressSnapshot, ProgressTracker};

use crate::error::TransferError;
use crate::frame_io::write_frame;
use crate::handshake::sender_handshake;
use crate::session::{AeadSession, TransferState};

pub struct Sender {
    config: Config,
    manifest: Manifest,
    file_path: PathBuf,
    keypair: Keypair,
    listener: TcpListener,
    actual_port: u16,
    state: StdMutex<TransferState>,
    is_active: Arc<AtomicBool>,
    cancel_tx: broadcast::Sender<()>,
    progress: Arc<ProgressTracker>,
}

impl Sender {
    /// Bind a listener on `port` (0 = OS-assigned) and compute the manifest
    /// from `file_path`. Returns the endpoint ready to accept a single peer.
    pub async fn start(
        port: u16,
        file_path: &Path,
        transfer_id: String,
        config: Config,
    ) -> Result<Self, TransferError> {
        let manifest = Manifest::from_file(file_path, config.chunk_size, transfer_id)?;
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let actual_port = listener.local_addr()?.port();
        let (cancel_tx, _) = broadcast::channel(1);

        let progress = Arc::new(ProgressTracker::new(
            manifest.file_name.clone(),
            manifest.file_size,
            manifest.chunk_count,
        ));

        tracing::info!(port = actual_port, file = ?file_path, "sender bound, manifest ready");

        Ok(Self {
            config,
            manifest,
            file_path: file_path.to_path_buf(),
            keypair: Keypair::generate(),
            listener,
            actual_port,
            state: StdMutex::new(TransferState::WaitingForPeer),
            is_active: Arc::new(AtomicBool::new(true)),
            cancel_tx,
            progress,
        })
    }

    pub fn actual_port(&self) -> u16 {
        self.actual_port
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.sample()
    }

    pub fn state(&self) -> TransferState {
        *self.state.lock().expect("sender state mutex poisoned")
    }

    fn set_state(&self, s: TransferState) {
        *self.state.lock().expect("sender state mutex poisoned") = s;
    }

    /// Close the stream, stop accepting further I/O, and zero key material.
    /// Idempotent.
    pub fn cancel(&self) {
        self.is_active.store(false, Ordering::SeqCst);
        let _ = self.cancel_tx.send(());
        self.set_state(TransferState::Cancelled);
    }

    /// Accept exactly one peer, run the handshake, send the manifest, then
    /// serve chunk requests until the completion sentinel or an I/O error.
    pub async fn serve_one(&self) -> Result<(), TransferError> {
        self.set_state(TransferState::WaitingForPeer);
        let (stream, peer_addr) = self.listener.accept().await?;
        tracing::info!(%peer_addr, "peer connected");

        let (mut read_half, mut write_half) = stream.into_split();

        self.set_state(TransferState::Handshaking);
        let session = tokio::time::timeout(
            Duration::from_secs(30),
            sender_handshake(
                &mut read_half,
                &mut write_half,
                &self.keypair,
                self.config.aead_info_string.as_bytes(),
            ),
        )
        .await
        .map_err(|_| TransferError::Timeout)??;

        self.set_state(TransferState::ExchangingManifest);
        let manifest_wire = self.manifest.to_wire()?;
        write_frame(&mut write_half, &session.seal(&manifest_wire)).await?;

        self.set_state(TransferState::Transferring);
        let result = self.run_chunk_service(read_half, write_half, session).await;

        match &result {
            Ok(()) => self.set_state(TransferState::Completed),
            Err(_) if !self.is_active.load(Ordering::SeqCst) => {
                self.set_state(TransferState::Cancelled)
            }
            Err(_) => self.set_state(TransferState::Failed),
        }
        result
    }

    async fn run_chunk_service(
        &self,
        read_half: OwnedReadHalf,
        write_half: OwnedWriteHalf,
        session: AeadSession,
    ) -> Result<(), TransferError> {
        let file = Arc::new(std::fs::File::open(&self.file_path)?);
        let manifest = Arc::new(self.manifest.clone());
        let session = Arc::new(session);
        let writer = Arc::new(AsyncMutex::new(write_half));

        let (work_tx, work_rx) = mpsc::channel::<u32>(64);
        let work_rx = Arc::new(AsyncMutex::new(work_rx));

        let worker_count = self.config.max_parallel_chunks.max(1);
        let mut workers = Vec::with_capacity(worker_count as usize);
        for _ in 0..worker_count {
            let file = Arc::clone(&file);
            let manifest = Arc::clone(&manifest);
            let session = Arc::clone(&session);
            let writer = Arc::clone(&writer);
            let work_rx = Arc::clone(&work_rx);
            let cancel_rx = self.cancel_tx.subscribe();

            workers.push(tokio::spawn(chunk_worker(
                file, manifest, session, writer, work_rx, cancel_rx,
            )));
        }

        let request_result = self
            .read_requests(read_half, work_tx, self.cancel_tx.subscribe())
            .await;

        for worker in workers {
            worker
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??;
        }

        request_result
    }

    async fn read_requests(
        &self,
        mut reader: OwnedReadHalf,
        work_tx: mpsc::Sender<u32>,
        mut cancel_rx: broadcast::Receiver<()>,
    ) -> Result<(), TransferError> {
        let read_timeout = Duration::from_millis(self.config.socket_read_timeout_ms);
        let inactivity_budget = Duration::from_secs(30);
        let mut last_activity = Instant::now();

        loop {
            let mut buf = [0u8; 4];
            let read = tokio::select! {
                biased;
                _ = cancel_rx.recv() => return Err(TransferError::Cancelled),
                r = tokio::time::timeout(read_timeout, reader.read_exact(&mut buf)) => r,
            };

            match read {
                Ok(Ok(_)) => {
                    last_activity = Instant::now();
                    let index = wire::decode_request(buf);
                    if index == COMPLETION_SENTINEL {
                        tracing::debug!("completion sentinel received");
                        drop(work_tx);
                        return Ok(());
                    }
                    if index < 0 || index as u32 >= self.manifest.chunk_count {
                        tracing::debug!(index, "chunk index out of range, ignoring request");
                        continue;
                    }
                    if work_tx.send(index as u32).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(p2pxfer_core::error::ProtocolError::UnexpectedEof.into());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => {
                    if last_activity.elapsed() >= inactivity_budget {
                        return Err(TransferError::Timeout);
                    }
                }
            }
        }
    }
}

/// One worker of the bounded-parallelism chunk-service pool: pulls an index
/// from the shared queue, reads it from disk with a positioned read,
/// encrypts it, and writes the framed response behind the shared writer
/// lock. Exits cleanly when the queue closes or cancellation fires.
async fn chunk_worker(
    file: Arc<std::fs::File>,
    manifest: Arc<Manifest>,
    session: Arc<AeadSession>,
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    work_rx: Arc<AsyncMutex<mpsc::Receiver<u32>>>,
    mut cancel_rx: broadcast::Receiver<()>,
) -> Result<(), TransferError> {
    loop {
        let index = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                biased;
                _ = cancel_rx.recv() => None,
                v = rx.recv() => v,
            }
        };
        let Some(index) = index else { return Ok(()) };

        let (offset, size) = manifest.chunk_address(index);
        let file = Arc::clone(&file);
        let chunk: Vec<u8> = tokio::task::spawn_blocking(move || {
            read_chunk_at(&file, offset, size as usize)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??;

        let sealed = session.seal(&chunk);
        let mut payload = Vec::with_capacity(4 + sealed.len());
        payload.extend_from_slice(&wire::encode_chunk_index(index));
        payload.extend_from_slice(&sealed);

        let frame = wire::encode_frame(&payload)?;
        let mut w = writer.lock().await;
        w.write_all(&frame).await?;
        tracing::debug!(index, "chunk sent");
    }
}

fn read_chunk_at(file: &std::fs::File, offset: u64, size: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(&mut buf, offset)?;
    }
    #[cfg(not(unix))]
    {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
    }
    Ok(buf)
}
