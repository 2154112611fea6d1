// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup envelope crypto: PBKDF2 key derivation and AES-256-GCM.
//!
//! The salt is fixed to keep the on-disk format stable across restarts and
//! reinstalls; the key material itself is 32 random bytes from config.
//! Envelope layout: `nonce (12 bytes) || ciphertext`.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac_array;
use sha2::{Digest, Sha256};

/// Fixed key-derivation salt (format compatibility)
const KDF_SALT: &[u8] = b"protekt_salt";
const PBKDF2_ITERATIONS: u32 = 100_000;
pub(crate) const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key is not valid hex")]
    BadKeyMaterial,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,

    #[error("ciphertext too short")]
    TooShort,
}

/// Derive the AES key from the hex key material in configuration.
pub(crate) fn derive_key(encryption_key_hex: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    let key_material = hex::decode(encryption_key_hex).map_err(|_| CryptoError::BadKeyMaterial)?;
    Ok(pbkdf2_hmac_array::<Sha256, KEY_SIZE>(
        &key_material,
        KDF_SALT,
        PBKDF2_ITERATIONS,
    ))
}

pub(crate) fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

pub(crate) fn decrypt(key: &[u8; KEY_SIZE], envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < NONCE_SIZE + 16 {
        return Err(CryptoError::TooShort);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decrypt)?;
    let nonce = Nonce::from_slice(&envelope[..NONCE_SIZE]);
    cipher
        .decrypt(nonce, &envelope[NONCE_SIZE..])
        .map_err(|_| CryptoError::Decrypt)
}

/// Streaming SHA-256 of a file, lowercase hex.
pub(crate) fn sha256_hex(path: &std::path::Path) -> std::io::Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
