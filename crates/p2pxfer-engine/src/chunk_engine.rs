//! Receiver-side chunk reassembly: a thread-safe bitmap of received chunks
//! backed by a pre-sized output file, with integrity gates on every write.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use p2pxfer_core::crypto::sha256;
use p2pxfer_core::manifest::Manifest;

use crate::error::IntegrityError;

/// Outcome of [`ChunkEngine::store_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Duplicate,
    Rejected,
}

struct Inner {
    file: File,
    bitmap: Vec<bool>,
}

/// Owns the output file handle and the bitmap of received chunks exclusively.
/// Safe to call `store_chunk` from multiple worker tasks concurrently.
pub struct ChunkEngine {
    manifest: Manifest,
    output_path: PathBuf,
    inner: Mutex<Inner>,
    received_count: AtomicU32,
}

impl ChunkEngine {
    /// Create the output file at `output_dir/manifest.file_name`, pre-sized
    /// to the manifest's total size (sparse where the filesystem supports
    /// it), with every chunk initially missing.
    pub fn create(manifest: Manifest, output_dir: &Path) -> std::io::Result<Self> {
        let output_path = output_dir.join(&manifest.file_name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&output_path)?;
        file.set_len(manifest.file_size)?;

        let n = manifest.chunk_count as usize;
        Ok(Self {
            manifest,
            output_path,
            inner: Mutex::new(Inner {
                file,
                bitmap: vec![false; n],
            }),
            received_count: AtomicU32::new(0),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn chunk_count(&self) -> u32 {
        self.manifest.chunk_count
    }

    pub fn received_count(&self) -> u32 {
        self.received_count.load(Ordering::Acquire)
    }

    /// Verify `bytes` against the manifest for `index`, and on success write
    /// it to the chunk's byte offset and flip the bitmap bit.
    pub fn store_chunk(&self, index: u32, bytes: &[u8]) -> StoreOutcome {
        if index >= self.manifest.chunk_count {
            tracing::debug!(index, "chunk index out of range, rejecting");
            return StoreOutcome::Rejected;
        }

        let (offset, expected_size) = self.manifest.chunk_address(index);
        if bytes.len() as u32 != expected_size {
            tracing::debug!(
                index,
                got = bytes.len(),
                expected = expected_size,
                "chunk size mismatch, rejecting"
            );
            return StoreOutcome::Rejected;
        }

        let expected_digest = &self.manifest.chunk_hashes[index as usize];
        let actual_digest = hex::encode(sha256(bytes));
        if &actual_digest != expected_digest {
            tracing::warn!(index, "chunk digest mismatch, rejecting");
            return StoreOutcome::Rejected;
        }

        let mut inner = self.inner.lock().expect("chunk engine mutex poisoned");
        if inner.bitmap[index as usize] {
            return StoreOutcome::Duplicate;
        }

        if let Err(e) = write_at(&mut inner.file, offset, bytes) {
            tracing::warn!(index, error = %e, "failed to write chunk to disk, rejecting");
            return StoreOutcome::Rejected;
        }

        inner.bitmap[index as usize] = true;
        drop(inner);
        self.received_count.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(index, "chunk stored");
        StoreOutcome::Stored
    }

    /// Snapshot of indices not yet received. Acceptable to observe a stale
    /// snapshot under concurrent `store_chunk` calls.
    pub fn missing_chunks(&self) -> Vec<u32> {
        let inner = self.inner.lock().expect("chunk engine mutex poisoned");
        inner
            .bitmap
            .iter()
            .enumerate()
            .filter(|(_, received)| !**received)
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.received_count() == self.manifest.chunk_count
    }

    /// Requires `is_complete()`. Flushes and re-reads the file, verifying the
    /// whole-file digest. Deletes the file and fails on mismatch; otherwise
    /// applies the manifest's original modification timestamp if present.
    pub fn finalize(&self) -> Result<(), IntegrityError> {
        assert!(self.is_complete(), "finalize called before all chunks received");

        {
            let mut inner = self.inner.lock().expect("chunk engine mutex poisoned");
            inner.file.flush().map_err(IntegrityError::Io)?;
        }

        let actual = hex::encode(whole_file_digest(&self.output_path).map_err(IntegrityError::Io)?);
        if actual != self.manifest.file_hash {
            tracing::warn!(
                expected = %self.manifest.file_hash,
                actual = %actual,
                "whole-file digest mismatch, deleting partial output"
            );
            let _ = std::fs::remove_file(&self.output_path);
            return Err(IntegrityError::FileDigest);
        }

        if let Some(ms) = self.manifest.last_modified {
            apply_mtime(&self.output_path, ms);
        }

        tracing::info!(path = ?self.output_path, "transfer finalized");
        Ok(())
    }

    /// Delete the partial output file. Used by cancellation cleanup.
    pub fn delete_partial(&self) {
        let _ = std::fs::remove_file(&self.output_path);
    }
}

fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.write_all_at(bytes, offset)
    }
    #[cfg(not(unix))]
    {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)
    }
}

fn whole_file_digest(path: &Path) -> std::io::Result<[u8; 32]> {
    // A mmap avoids a second full-file copy into a read buffer; for very
    // large transfers this keeps finalize's memory footprint flat.
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(sha256(b""));
    }
    let map = unsafe { memmap2::Mmap::map(&file)? };
    Ok(sha256(&map[..]))
}

fn apply_mtime(path: &Path, epoch_ms: u64) {
    let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_millis(epoch_ms);
    let result = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(mtime));
    if let Err(e) = result {
        tracing::debug!(error = %e, "could not apply original modification time");
    }
}
