//! Session-scoped state: the transfer state machine and the encrypted
//! channel wrapper built from a handshake-derived AEAD key.

use p2pxfer_core::crypto::{decrypt, encrypt, AeadKey};
use p2pxfer_core::error::CryptoError;

/// Per-endpoint transfer state. Transitions are linear forward; any terminal
/// failure or cancellation releases resources and zeroes key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Starting,
    WaitingForPeer,
    Connecting,
    Handshaking,
    ExchangingManifest,
    ReceivingManifest,
    Transferring,
    Assembling,
    Completed,
    Failed,
    Cancelled,
}

/// The encrypted channel established by the handshake. Read-only after
/// creation; the backing key zeroizes when this value drops.
pub struct AeadSession {
    key: AeadKey,
}

impl AeadSession {
    pub fn new(key: AeadKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext`, returning `iv(12) || ciphertext || tag(16)`.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        encrypt(&self.key, plaintext)
    }

    /// Decrypt a frame produced by [`AeadSession::seal`].
    pub fn open(&self, framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        decrypt(&self.key, framed)
    }
}
