//! Cryptographic primitives for p2pxfer.
//!
//! Provides three things:
//!   1. SHA-256 hashing — per-chunk and whole-file digests
//!   2. Ephemeral X25519 ECDH — key agreement, no long-term identity
//!   3. HKDF-SHA-256 + AES-256-GCM — session key derivation and AEAD framing
//!
//! Keypairs and derived AEAD keys zeroize their backing memory on drop.
//! There is no unsafe code in this module.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// IV length for AES-256-GCM, per the wire format (§4.4, §6).
pub const IV_LEN: usize = 12;
/// AEAD authentication tag length, appended to the ciphertext.
pub const TAG_LEN: usize = 16;

// ── SHA-256 ───────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental SHA-256 hasher for payloads that arrive in pieces (used while
/// streaming a file to build the whole-file digest alongside per-chunk ones).
pub struct Hasher(Sha256);

impl Hasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Keypair & ECDH ────────────────────────────────────────────────────────────

/// An ephemeral X25519 keypair, generated fresh per transfer session.
///
/// X25519 is the curve the spec calls for — "a NIST P-256-equivalent or
/// equally strong curve supporting ECDH" — chosen here for its built-in
/// rejection of low-order and identity points during scalar multiplication.
/// The private scalar zeroizes on drop; it is never copied out of this type.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    private: Zeroizing<[u8; 32]>,
    #[zeroize(skip)]
    pub public: [u8; 32],
}

impl Keypair {
    /// Generate a new random ephemeral keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(secret.to_bytes()),
            public: *public.as_bytes(),
        }
    }

    /// Raw public key bytes, sent plaintext on the wire (§4.4 message 1/2).
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public
    }
}

/// The all-zero point is the canonical low-order point that x25519-dalek's
/// Montgomery-ladder multiplication collapses every low-order input to.
/// Rejecting it here is the one explicit check the spec calls for beyond
/// what the underlying scalar multiplication already guarantees.
const LOW_ORDER_RESULT: [u8; 32] = [0u8; 32];

/// Perform ECDH between our private key and the peer's public key.
///
/// Fails with `CryptoError::InvalidPeerKey` if the resulting shared secret
/// is the all-zero low-order point (the peer sent the identity or a
/// low-order public key).
pub fn ecdh(keypair: &Keypair, peer_public: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let secret = StaticSecret::from(*keypair.private);
    let peer_pk = PublicKey::from(*peer_public);
    let shared = secret.diffie_hellman(&peer_pk);

    if shared.as_bytes() == &LOW_ORDER_RESULT {
        return Err(CryptoError::InvalidPeerKey);
    }

    Ok(Zeroizing::new(*shared.as_bytes()))
}

// ── HKDF-SHA-256 ──────────────────────────────────────────────────────────────

/// Derive `out_len` bytes from `ikm` using HKDF-SHA-256 with an empty salt.
///
/// An empty salt is deliberate: the ECDH shared secret is already
/// high-entropy and unique per session, so a random salt buys nothing.
pub fn hkdf_derive(ikm: &[u8], info: &[u8], out_len: usize) -> Zeroizing<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = Zeroizing::new(vec![0u8; out_len]);
    hk.expand(info, &mut out)
        .expect("HKDF output length is within the documented maximum");
    out
}

// ── AES-256-GCM AEAD ──────────────────────────────────────────────────────────

/// A 32-byte AES-256-GCM key. Zeroizes on drop; the only way key material
/// outlives a handshake or a transfer session.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AeadKey(Zeroizing<[u8; 32]>);

impl AeadKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_derived(derived: Zeroizing<Vec<u8>>) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&derived[..32]);
        let key = Self::new(bytes);
        drop(derived);
        key
    }
}

/// Encrypt `plaintext` under `key`, returning `iv(12) || ciphertext || tag(16)`.
///
/// A fresh random IV is drawn from a CSPRNG on every call — the contract
/// violation the spec warns about (same key+IV, different plaintext) is
/// prevented by construction, never by caller discipline.
pub fn encrypt(key: &AeadKey, plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0[..]));

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .expect("AES-256-GCM encryption does not fail for in-memory buffers");

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt `iv || ciphertext || tag` produced by [`encrypt`].
///
/// Fails with `CryptoError::AuthFailed` on any tag mismatch, and
/// `CryptoError::CiphertextTooShort` if the frame is shorter than the
/// minimum iv+tag overhead.
pub fn decrypt(key: &AeadKey, framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if framed.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::CiphertextTooShort);
    }

    let (iv, ciphertext) = framed.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0[..]));
    let nonce = Nonce::from_slice(iv);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| CryptoError::AuthFailed)
}
