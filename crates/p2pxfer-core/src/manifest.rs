//! The file manifest: content-addressed metadata identifying a file for
//! transfer, computed once by the sender and reconstructed by the receiver.

use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::crypto::{sha256, Hasher};
use crate::error::ManifestError;

/// Hard cap on the serialized manifest size, bounding receiver memory before
/// any field has been validated.
pub const MAX_SERIALIZED_LEN: usize = 1024 * 1024;

/// Default chunk size in bytes, per the configuration defaults.
pub const DEFAULT_CHUNK_SIZE: u32 = 262_144;

/// Self-describing manifest record, exchanged as the plaintext under the
/// first encrypted frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u32,
    pub chunk_count: u32,
    /// Ordered 64-char lowercase hex digests, one per chunk.
    pub chunk_hashes: Vec<String>,
    /// 64-char lowercase hex whole-file digest.
    pub file_hash: String,
    pub mime_type: Option<String>,
    pub last_modified: Option<u64>,
    pub transfer_id: String,
}

/// `chunk_count = ceil(size / chunk_size)`, with the empty-file convention
/// that an empty file has zero chunks rather than one synthetic chunk — the
/// open question in the design notes resolved in favor of a genuinely empty
/// transfer loop over a sentinel chunk.
pub fn chunk_count_for(file_size: u64, chunk_size: u32) -> u32 {
    if file_size == 0 {
        return 0;
    }
    let chunk_size = chunk_size as u64;
    (((file_size + chunk_size - 1) / chunk_size) as u32).max(1)
}

/// Byte offset and size of chunk `index` within a file of `file_size` bytes
/// chunked at `chunk_size`. Panics if `index >= chunk_count_for(file_size,
/// chunk_size)` — callers are expected to range-check first.
pub fn chunk_address(file_size: u64, chunk_size: u32, index: u32) -> (u64, u32) {
    let n = chunk_count_for(file_size, chunk_size);
    assert!(index < n, "chunk index {index} out of range (count {n})");
    let offset = index as u64 * chunk_size as u64;
    let size = if index + 1 < n {
        chunk_size
    } else {
        (file_size - offset) as u32
    };
    (offset, size)
}

impl Manifest {
    /// Build a manifest by streaming `path` in `chunk_size`-byte blocks,
    /// recording each chunk's digest alongside the running whole-file digest.
    pub fn from_file(
        path: &Path,
        chunk_size: u32,
        transfer_id: String,
    ) -> Result<Self, ManifestError> {
        let mut file = std::fs::File::open(path)
            .map_err(|e| ManifestError::Malformed(format!("cannot open {path:?}: {e}")))?;
        let metadata = file
            .metadata()
            .map_err(|e| ManifestError::Malformed(format!("cannot stat {path:?}: {e}")))?;
        let file_size = metadata.len();

        let n = chunk_count_for(file_size, chunk_size);
        let mut chunk_hashes = Vec::with_capacity(n as usize);
        let mut whole = Hasher::new();
        let mut buf = vec![0u8; chunk_size as usize];
        let mut remaining = file_size;

        for _ in 0..n {
            let this_len = remaining.min(chunk_size as u64) as usize;
            file.read_exact(&mut buf[..this_len])
                .map_err(|e| ManifestError::Malformed(format!("read error: {e}")))?;
            whole.update(&buf[..this_len]);
            chunk_hashes.push(hex::encode(sha256(&buf[..this_len])));
            remaining -= this_len as u64;
        }

        let file_hash = hex::encode(whole.finalize());

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ManifestError::Malformed("path has no file name".into()))?;

        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);

        Ok(Manifest {
            mime_type: infer_mime_type(&file_name),
            file_name,
            file_size,
            chunk_size,
            chunk_count: n,
            chunk_hashes,
            file_hash,
            last_modified,
            transfer_id,
        })
    }

    pub fn chunk_address(&self, index: u32) -> (u64, u32) {
        chunk_address(self.file_size, self.chunk_size, index)
    }

    /// Serialize to the self-describing JSON form sent as manifest plaintext.
    pub fn to_wire(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec(self)
            .map_err(|e| ManifestError::Malformed(format!("serialize failed: {e}")))
    }

    /// Parse and validate a manifest received over the wire.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, ManifestError> {
        if bytes.len() > MAX_SERIALIZED_LEN {
            return Err(ManifestError::Malformed(format!(
                "serialized manifest {} bytes exceeds cap {}",
                bytes.len(),
                MAX_SERIALIZED_LEN
            )));
        }

        let m: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| ManifestError::Malformed(format!("deserialize failed: {e}")))?;

        m.validate()?;
        Ok(m)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.transfer_id.is_empty() {
            return Err(ManifestError::Malformed("transfer_id is empty".into()));
        }
        if self.file_name.is_empty() {
            return Err(ManifestError::Malformed("file_name is empty".into()));
        }

        let expected_count = chunk_count_for(self.file_size, self.chunk_size);
        if self.chunk_count != expected_count {
            return Err(ManifestError::Malformed(format!(
                "chunk_count {} does not match ceil(size/chunk_size) = {}",
                self.chunk_count, expected_count
            )));
        }

        if self.chunk_hashes.len() != self.chunk_count as usize {
            return Err(ManifestError::Malformed(format!(
                "chunk_hashes length {} does not match chunk_count {}",
                self.chunk_hashes.len(),
                self.chunk_count
            )));
        }

        for (i, h) in self.chunk_hashes.iter().enumerate() {
            if h.len() != 64 || !h.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ManifestError::Malformed(format!(
                    "chunk_hashes[{i}] is not 64 hex chars"
                )));
            }
        }

        if self.file_hash.len() != 64 || !self.file_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ManifestError::Malformed("file_hash is not 64 hex chars".into()));
        }

        Ok(())
    }
}

/// Best-effort MIME type guess from a file extension. Informational only;
/// never affects a wire invariant.
fn infer_mime_type(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => return None,
    };
    Some(mime.to_string())
}
