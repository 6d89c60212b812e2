//! The error taxonomy from the wire-protocol error table.
//!
//! Each enum below corresponds to one row (or one family of rows) in the
//! error handling design. Fatal/non-fatal policy lives with the callers that
//! interpret these: a frame-too-large error tears the session down, while a
//! rejected chunk (wrong size or digest) does not reach this taxonomy at all
//! and is just retried by the receiver's requester.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid peer public key (not on curve, identity, or low-order)")]
    InvalidPeerKey,

    #[error("AEAD authentication failed")]
    AuthFailed,

    #[error("ciphertext shorter than iv + tag overhead")]
    CiphertextTooShort,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("invalid peer public key")]
    InvalidPeerKey,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame length {0} exceeds maximum {1}")]
    FrameTooLarge(u32, u32),

    #[error("connection closed before completion sentinel")]
    UnexpectedEof,

    #[error("expected transfer id {expected:?}, manifest carries {actual}")]
    TransferIdMismatch { expected: String, actual: String },
}
