//! AES-256-GCM encryption for token material at rest.
//!
//! One process-wide key, provided base64-encoded through configuration.
//! Each value is encrypted with a fresh random nonce; the stored form is
//! `base64(nonce ‖ ciphertext)` so a credential row needs a single column
//! per token.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

/// Key length in bytes (256 bits).
const KEY_SIZE: usize = 32;

/// Nonce length in bytes (96 bits, standard for GCM).
const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key is not valid base64")]
    KeyEncoding,
    #[error("encryption key must be {KEY_SIZE} bytes, got {0}")]
    KeyLength(usize),
    #[error("encryption failed")]
    Encrypt,
    #[error("stored token is not valid base64")]
    TokenEncoding,
    #[error("stored token is too short to contain a nonce")]
    Truncated,
    #[error("decryption failed (wrong key or corrupted data)")]
    Decrypt,
    #[error("decrypted token is not valid UTF-8")]
    NotUtf8,
}

/// The process-wide token cipher.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyEncoding`] for invalid base64 or
    /// [`CryptoError::KeyLength`] when the decoded key is not 32 bytes.
    pub fn from_base64_key(key_base64: &str) -> Result<Self, CryptoError> {
        let key_bytes = BASE64
            .decode(key_base64)
            .map_err(|_| CryptoError::KeyEncoding)?;
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::KeyLength(key_bytes.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| CryptoError::Encrypt)?;
        Ok(Self { cipher })
    }

    /// Encrypts `plaintext` under a fresh random nonce and packs the result
    /// as `base64(nonce ‖ ciphertext)`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encrypt`] if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(packed))
    }

    /// Decrypts a value produced by [`TokenCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns a [`CryptoError`] if the value is malformed, was encrypted
    /// under a different key, or has been tampered with.
    pub fn decrypt(&self, packed_base64: &str) -> Result<String, CryptoError> {
        let packed = BASE64
            .decode(packed_base64)
            .map_err(|_| CryptoError::TokenEncoding)?;
        if packed.len() <= NONCE_SIZE {
            return Err(CryptoError::Truncated);
        }
        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::NotUtf8)
    }
}
