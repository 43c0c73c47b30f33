//! Encrypted key-material records
//!
//! Handles encryption/decryption of key material using AES-256-GCM
//! with Argon2id key derivation. Password correctness is verified by the
//! GCM authentication tag; there is no separate password hash. Persistence
//! is the caller's responsibility.

use crate::config::EncryptionConfig;
use crate::errors::{KeyWardenError, Result};
use crate::security::SecureBytes;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Salt size for Argon2
const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

/// Argon2id work factors, persisted alongside each record so old records
/// stay decryptable after the defaults change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        (&EncryptionConfig::default()).into()
    }
}

impl From<&EncryptionConfig> for KdfParams {
    fn from(cfg: &EncryptionConfig) -> Self {
        Self {
            memory_kib: cfg.memory_kib,
            iterations: cfg.iterations,
            parallelism: cfg.parallelism,
        }
    }
}

/// Encrypted record format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Version of the encryption format
    pub version: u32,

    /// KDF work factors used for this record
    pub kdf: KdfParams,

    /// Salt for key derivation (base64)
    pub salt: String,

    /// Nonce for AES-GCM (base64)
    pub nonce: String,

    /// Ciphertext with embedded GCM tag (base64)
    pub ciphertext: String,
}

impl EncryptedRecord {
    /// Encrypt plaintext under a password-derived key
    pub fn encrypt(plaintext: &[u8], password: &str, kdf: KdfParams) -> Result<Self> {
        let mut salt_bytes = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt_bytes);

        let encryption_key = derive_key(password, &salt_bytes, &kdf)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&encryption_key)
            .map_err(|e| KeyWardenError::EncryptionFailed(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| KeyWardenError::EncryptionFailed(e.to_string()))?;

        Ok(Self {
            version: 1,
            kdf,
            salt: B64.encode(salt_bytes),
            nonce: B64.encode(nonce_bytes),
            ciphertext: B64.encode(&ciphertext),
        })
    }

    /// Decrypt the record. Fails with `DecryptionFailed` on a wrong password
    /// or a tampered record; the two are indistinguishable to the AEAD.
    pub fn decrypt(&self, password: &str) -> Result<SecureBytes> {
        let salt_bytes = B64
            .decode(&self.salt)
            .map_err(|e| KeyWardenError::DecryptionFailed(format!("Invalid salt: {}", e)))?;

        let decryption_key = derive_key(password, &salt_bytes, &self.kdf)?;

        let nonce_bytes = B64
            .decode(&self.nonce)
            .map_err(|e| KeyWardenError::DecryptionFailed(format!("Invalid nonce: {}", e)))?;

        let ciphertext = B64
            .decode(&self.ciphertext)
            .map_err(|e| KeyWardenError::DecryptionFailed(format!("Invalid ciphertext: {}", e)))?;

        let cipher = Aes256Gcm::new_from_slice(&decryption_key)
            .map_err(|e| KeyWardenError::DecryptionFailed(e.to_string()))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| {
                KeyWardenError::DecryptionFailed("authentication tag mismatch".to_string())
            })?;

        Ok(SecureBytes::new(plaintext))
    }
}

/// Derive an encryption key from a password using Argon2id
fn derive_key(password: &str, salt: &[u8], kdf: &KdfParams) -> Result<[u8; 32]> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| KeyWardenError::EncryptionFailed(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| KeyWardenError::EncryptionFailed(e.to_string()))?;

    Ok(output)
}
