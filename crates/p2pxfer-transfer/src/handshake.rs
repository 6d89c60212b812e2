//! Ephemeral key exchange and session-key derivation.
//!
//! Both endpoints generate a fresh keypair, exchange public keys in
//! plaintext length-prefixed frames, and each independently derives the same
//! AEAD key from the ECDH shared secret. No long-term identity is involved;
//! trust is bootstrapped by the out-of-band channel that delivered the
//! sender's address to the receiver.

use tokio::io::{AsyncRead, AsyncWrite};

use p2pxfer_core::crypto::{ecdh, hkdf_derive, AeadKey, Keypair};
use p2pxfer_core::error::HandshakeError;

use crate::frame_io::{read_frame, write_frame};
use crate::session::AeadSession;

/// Sender side: write our public key first, then read the peer's.
pub async fn sender_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    keypair: &Keypair,
    info: &[u8],
) -> Result<AeadSession, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &keypair.public_bytes()).await?;
    let peer_public = read_peer_public_key(reader).await?;
    derive_session(keypair, &peer_public, info)
}

/// Receiver side: read the sender's public key first, then write our own.
pub async fn receiver_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    keypair: &Keypair,
    info: &[u8],
) -> Result<AeadSession, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let peer_public = read_peer_public_key(reader).await?;
    write_frame(writer, &keypair.public_bytes()).await?;
    derive_session(keypair, &peer_public, info)
}

async fn read_peer_public_key<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<[u8; 32], HandshakeError> {
    let frame = read_frame(reader).await?;
    frame
        .try_into()
        .map_err(|_| HandshakeError::InvalidPeerKey)
}

fn derive_session(
    keypair: &Keypair,
    peer_public: &[u8; 32],
    info: &[u8],
) -> Result<AeadSession, HandshakeError> {
    let shared = ecdh(keypair, peer_public).map_err(|_| HandshakeError::InvalidPeerKey)?;
    let key_bytes = hkdf_derive(&shared, info, 32);
    drop(shared);
    Ok(AeadSession::new(AeadKey::from_derived(key_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split};

    #[tokio::test]
    async fn sender_and_receiver_derive_the_same_session_key() {
        let (mut sender_r, mut receiver_w) = duplex(4096);
        let (mut receiver_r, mut sender_w) = duplex(4096);

        let sender_kp = Keypair::generate();
        let receiver_kp = Keypair::generate();

        let info = b"P2P-FileShare-AES";
        let sender_fut = sender_handshake(&mut sender_r, &mut sender_w, &sender_kp, info);
        let receiver_fut =
            receiver_handshake(&mut receiver_r, &mut receiver_w, &receiver_kp, info);

        let (sender_session, receiver_session) = tokio::join!(sender_fut, receiver_fut);
        let sender_session = sender_session.unwrap();
        let receiver_session = receiver_session.unwrap();

        let framed = sender_session.seal(b"agreed key check");
        let opened = receiver_session.open(&framed).unwrap();
        assert_eq!(opened, b"agreed key check");
    }

    #[tokio::test]
    async fn handshake_rejects_identity_peer_key() {
        let (ours, mut theirs) = duplex(4096);
        write_frame(&mut theirs, &[0u8; 32]).await.unwrap();
        let (mut our_reader, mut our_writer) = split(ours);
        let keypair = Keypair::generate();
        let result =
            receiver_handshake(&mut our_reader, &mut our_writer, &keypair, b"info").await;
        assert!(matches!(result, Err(HandshakeError::InvalidPeerKey)));
    }
}
