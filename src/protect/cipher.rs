//! Per-track authenticated payload encryption.
//!
//! # Wire Format
//! ```text
//! [nonce: 12 bytes] [ciphertext + poly1305 tag]
//! ```
//!
//! # Design Decisions
//! - ChaCha20-Poly1305 for confidentiality and integrity in one pass;
//!   a corrupt chunk or a wrong-track key fails authentication instead
//!   of decrypting to garbage
//! - Fresh random nonce per encryption, carried with the ciphertext
//! - Track keys are derived per call from the root secret and the track
//!   id; derived key material is never stored or logged

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::ProtectError;

/// Nonce length for ChaCha20-Poly1305.
const NONCE_LEN: usize = 12;

/// Domain separation for track key derivation.
const TRACK_KEY_CONTEXT: &str = "streamgate v1 track payload key";

/// Encrypts and decrypts audio chunks keyed by track identity.
pub struct PayloadCipher {
    root_secret: [u8; 32],
}

impl PayloadCipher {
    pub fn new(root_secret: [u8; 32]) -> Self {
        Self { root_secret }
    }

    /// Derive the symmetric key for a track.
    ///
    /// Deterministic, so any instance holding the root secret can
    /// decrypt; collision-resistant, so ciphertext stays bound to the
    /// track it was encrypted for.
    fn track_key(&self, track_id: &str) -> [u8; 32] {
        let mut material = Vec::with_capacity(32 + track_id.len());
        material.extend_from_slice(&self.root_secret);
        material.extend_from_slice(track_id.as_bytes());
        blake3::derive_key(TRACK_KEY_CONTEXT, &material)
    }

    /// Encrypt a chunk under the track's derived key.
    pub fn encrypt(&self, track_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, ProtectError> {
        let key = self.track_key(track_id);
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| ProtectError::DecryptionFailure)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| ProtectError::DecryptionFailure)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a chunk previously encrypted for `track_id`.
    ///
    /// Fails with `DecryptionFailure` when the ciphertext is corrupt or
    /// was encrypted for a different track.
    pub fn decrypt(&self, track_id: &str, data: &[u8]) -> Result<Vec<u8>, ProtectError> {
        if data.len() <= NONCE_LEN {
            return Err(ProtectError::DecryptionFailure);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

        let key = self.track_key(track_id);
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| ProtectError::DecryptionFailure)?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| ProtectError::DecryptionFailure)
    }
}
