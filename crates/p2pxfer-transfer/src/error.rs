//! The single error type returned at the public `Sender`/`Receiver` boundary,
//! unifying the per-component error enums behind one `Result`.

use thiserror::Error;

use p2pxfer_core::error::{CryptoError, HandshakeError, ManifestError, ProtocolError};
use p2pxfer_engine::error::IntegrityError;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,
}
