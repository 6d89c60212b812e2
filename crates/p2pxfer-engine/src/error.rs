use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("whole-file digest mismatch at finalize")]
    FileDigest,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
