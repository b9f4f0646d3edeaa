// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AES-256-GCM envelope for OAuth refresh tokens at rest.
//!
//! The key is handed in once at startup; a fresh random 96-bit nonce is drawn
//! for every encryption, and the 128-bit tag is stored next to the ciphertext.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Required key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key must be exactly {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("encryption key is not valid base64")]
    InvalidKeyEncoding,

    #[error("authentication tag did not verify")]
    Integrity,

    #[error("malformed sealed secret: {0}")]
    Decryption(String),

    #[error("encryption failed")]
    Encryption,
}

/// Ciphertext, nonce and tag of one encrypted secret. Always stored together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub auth_tag: Vec<u8>,
}

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedSecret")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce_len", &self.nonce.len())
            .field("auth_tag_len", &self.auth_tag.len())
            .finish()
    }
}

/// Symmetric authenticated encryption with a process-lifetime key.
#[derive(Clone)]
pub struct CryptoEnvelope {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl fmt::Debug for CryptoEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CryptoEnvelope { .. }")
    }
}

impl CryptoEnvelope {
    /// Build from raw key bytes. Anything but exactly 32 bytes is rejected.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Build from a base64-encoded key (the `ENCRYPTION_KEY_BASE64` format).
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidKeyEncoding)?;
        Self::new(&key)
    }

    /// Encrypt a secret under a freshly generated nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<SealedSecret, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| CryptoError::Encryption)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Encryption)?;

        Ok(SealedSecret {
            ciphertext: in_out,
            nonce: nonce.to_vec(),
            auth_tag: tag.as_ref().to_vec(),
        })
    }

    /// Decrypt and verify a sealed secret.
    ///
    /// A tag that does not verify (tampering, wrong key, wrong nonce) is
    /// [`CryptoError::Integrity`]; wrongly sized parts or non-UTF-8 plaintext
    /// is [`CryptoError::Decryption`].
    pub fn decrypt(&self, sealed: &SealedSecret) -> Result<String, CryptoError> {
        let nonce: [u8; NONCE_LEN] = sealed.nonce.as_slice().try_into().map_err(|_| {
            CryptoError::Decryption(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                sealed.nonce.len()
            ))
        })?;

        if sealed.auth_tag.len() != TAG_LEN {
            return Err(CryptoError::Decryption(format!(
                "auth tag must be {} bytes, got {}",
                TAG_LEN,
                sealed.auth_tag.len()
            )));
        }

        // ring expects the tag appended to the ciphertext.
        let mut in_out = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
        in_out.extend_from_slice(&sealed.ciphertext);
        in_out.extend_from_slice(&sealed.auth_tag);

        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Integrity)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}

/// Base64 (standard alphabet) serde adapter for byte fields.
mod b64 {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
