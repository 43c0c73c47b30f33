//! Key source abstraction
//!
//! Polymorphic representation of where private-key material comes from:
//! - Mnemonic: BIP39 phrase, keys derived per BIP32/44 at use time
//! - PrivateKey: a single fixed secp256k1 scalar, path-independent
//! - Ledger: only the device-reported public key is held; signing
//!   round-trips the hardware collaborator
//!
//! A `KeySource` is the decrypted, in-memory form of a key store record and
//! never touches persistence itself.

use crate::errors::{KeyWardenError, Result};
use crate::hardware::HardwareSigner;
use crate::keys::Bip44Path;
use crate::security::{SecureBytes, SecureString};
use bip39::Mnemonic;
use cosmrs::bip32::XPrv;
use cosmrs::crypto::secp256k1::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Kind tag for a key source, stored unencrypted on its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySourceKind {
    Mnemonic,
    PrivateKey,
    Ledger,
}

impl KeySourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySourceKind::Mnemonic => "mnemonic",
            KeySourceKind::PrivateKey => "privateKey",
            KeySourceKind::Ledger => "ledger",
        }
    }
}

/// Decrypted key material
#[derive(Clone)]
pub enum KeySource {
    Mnemonic { phrase: SecureString },
    PrivateKey { key: SecureBytes },
    Ledger { public_key: Vec<u8> },
}

impl KeySource {
    pub fn kind(&self) -> KeySourceKind {
        match self {
            KeySource::Mnemonic { .. } => KeySourceKind::Mnemonic,
            KeySource::PrivateKey { .. } => KeySourceKind::PrivateKey,
            KeySource::Ledger { .. } => KeySourceKind::Ledger,
        }
    }

    /// Build from a BIP39 phrase, validating the checksum and word list
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let _: Mnemonic = phrase
            .parse()
            .map_err(|e| KeyWardenError::InvalidMnemonic(format!("{}", e)))?;
        Ok(KeySource::Mnemonic {
            phrase: SecureString::from(phrase),
        })
    }

    /// Build from a raw 32-byte secp256k1 scalar
    pub fn from_private_key(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(KeyWardenError::InvalidKeyFormat(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        SigningKey::from_slice(bytes)
            .map_err(|e| KeyWardenError::InvalidKeyFormat(e.to_string()))?;
        Ok(KeySource::PrivateKey {
            key: SecureBytes::from(bytes),
        })
    }

    /// Build from a device-reported compressed public key
    pub fn from_ledger_public_key(public_key: Vec<u8>) -> Result<Self> {
        cosmrs::tendermint::PublicKey::from_raw_secp256k1(&public_key).ok_or_else(|| {
            KeyWardenError::InvalidKeyFormat(
                "not a compressed secp256k1 public key".to_string(),
            )
        })?;
        Ok(KeySource::Ledger { public_key })
    }

    /// Compressed public key (33 bytes) for a derivation path.
    /// PrivateKey and Ledger sources accept the path for interface
    /// uniformity; it is validated but otherwise ignored.
    pub fn public_key(&self, path: &Bip44Path) -> Result<Vec<u8>> {
        match self {
            KeySource::Mnemonic { phrase } => {
                let signing_key = derive_signing_key(phrase, path)?;
                Ok(signing_key.public_key().to_bytes())
            }
            KeySource::PrivateKey { key } => {
                path.validate()?;
                let signing_key = SigningKey::from_slice(key.expose())
                    .map_err(|e| KeyWardenError::InvalidKeyFormat(e.to_string()))?;
                Ok(signing_key.public_key().to_bytes())
            }
            KeySource::Ledger { public_key } => {
                path.validate()?;
                Ok(public_key.clone())
            }
        }
    }

    /// Sign a message. Software sources sign locally (secp256k1 over
    /// SHA-256); a Ledger source round-trips the hardware collaborator and
    /// may block on a user gesture at the device.
    pub async fn sign(
        &self,
        path: &Bip44Path,
        message: &[u8],
        hardware: &dyn HardwareSigner,
    ) -> Result<Vec<u8>> {
        match self {
            KeySource::Mnemonic { phrase } => {
                let signing_key = derive_signing_key(phrase, path)?;
                sign_with(&signing_key, message)
            }
            KeySource::PrivateKey { key } => {
                path.validate()?;
                let signing_key = SigningKey::from_slice(key.expose())
                    .map_err(|e| KeyWardenError::InvalidKeyFormat(e.to_string()))?;
                sign_with(&signing_key, message)
            }
            KeySource::Ledger { .. } => hardware.sign(path, message).await,
        }
    }

    /// Plaintext payload that gets encrypted into the record ciphertext
    pub fn secret_bytes(&self) -> Vec<u8> {
        match self {
            KeySource::Mnemonic { phrase } => phrase.expose().as_bytes().to_vec(),
            KeySource::PrivateKey { key } => key.expose().to_vec(),
            KeySource::Ledger { public_key } => public_key.clone(),
        }
    }

    /// Rebuild a source from a decrypted record ciphertext
    pub fn from_plaintext(kind: KeySourceKind, plaintext: &[u8]) -> Result<Self> {
        match kind {
            KeySourceKind::Mnemonic => {
                let phrase = std::str::from_utf8(plaintext).map_err(|_| {
                    KeyWardenError::DecryptionFailed("mnemonic is not UTF-8".to_string())
                })?;
                Self::from_mnemonic(phrase)
            }
            KeySourceKind::PrivateKey => Self::from_private_key(plaintext),
            KeySourceKind::Ledger => Self::from_ledger_public_key(plaintext.to_vec()),
        }
    }

    /// Human-readable export: the phrase for a mnemonic source, hex for a
    /// raw private key, the public key hex for a ledger source
    pub fn export_string(&self) -> String {
        match self {
            KeySource::Mnemonic { phrase } => phrase.expose().to_string(),
            KeySource::PrivateKey { key } => key.to_hex(),
            KeySource::Ledger { public_key } => hex::encode(public_key),
        }
    }
}

/// Generate a fresh BIP39 mnemonic from OS entropy.
/// 24 words (256-bit) or 12 words (128-bit).
pub fn generate_mnemonic(word_count: usize) -> Result<SecureString> {
    let entropy_len = match word_count {
        12 => 16,
        24 => 32,
        n => {
            return Err(KeyWardenError::InvalidMnemonic(format!(
                "unsupported word count {}",
                n
            )))
        }
    };
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy[..entropy_len]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..entropy_len])
        .map_err(|e| KeyWardenError::InvalidMnemonic(format!("{}", e)))?;
    Ok(SecureString::from(mnemonic.to_string()))
}

/// HD-derive the signing key for a path from a mnemonic phrase
fn derive_signing_key(phrase: &SecureString, path: &Bip44Path) -> Result<SigningKey> {
    let mnemonic: Mnemonic = phrase
        .expose()
        .parse()
        .map_err(|e| KeyWardenError::InvalidMnemonic(format!("{}", e)))?;

    let seed = mnemonic.to_seed("");
    let derivation_path = path.to_derivation_path()?;

    let child_xprv = XPrv::derive_from_path(seed, &derivation_path)
        .map_err(|e| KeyWardenError::InvalidPath(e.to_string()))?;

    SigningKey::from_slice(&child_xprv.private_key().to_bytes())
        .map_err(|e| KeyWardenError::InvalidKeyFormat(e.to_string()))
}

fn sign_with(signing_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
    let signature = signing_key
        .sign(message)
        .map_err(|e| KeyWardenError::SigningFailed(e.to_string()))?;
    Ok(signature.to_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::NoHardware;

    fn test_path() -> Bip44Path {
        Bip44Path::new(118, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_generate_mnemonic_word_counts() {
        let phrase = generate_mnemonic(24).unwrap();
        assert_eq!(phrase.expose().split_whitespace().count(), 24);

        let phrase = generate_mnemonic(12).unwrap();
        assert_eq!(phrase.expose().split_whitespace().count(), 12);

        assert!(generate_mnemonic(15).is_err());
    }

    #[test]
    fn test_mnemonic_derivation_is_deterministic() {
        let phrase = generate_mnemonic(24).unwrap();
        let source = KeySource::from_mnemonic(phrase.expose()).unwrap();

        let a = source.public_key(&test_path()).unwrap();
        let b = source.public_key(&test_path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 33);
    }

    #[test]
    fn test_mnemonic_coin_type_changes_key() {
        let phrase = generate_mnemonic(24).unwrap();
        let source = KeySource::from_mnemonic(phrase.expose()).unwrap();

        let cosmos = source.public_key(&test_path()).unwrap();
        let other = source
            .public_key(&test_path().with_coin_type(60))
            .unwrap();
        assert_ne!(cosmos, other);
    }

    #[test]
    fn test_rejects_invalid_mnemonic() {
        assert!(matches!(
            KeySource::from_mnemonic("not a valid mnemonic phrase"),
            Err(KeyWardenError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_private_key_ignores_path_beyond_validation() {
        let source = KeySource::from_private_key(&[7u8; 32]).unwrap();

        let a = source.public_key(&test_path()).unwrap();
        let b = source.public_key(&test_path().with_coin_type(60)).unwrap();
        assert_eq!(a, b);

        let bad = Bip44Path {
            coin_type: 118,
            account: 0,
            change: 5,
            address_index: 0,
        };
        assert!(matches!(
            source.public_key(&bad),
            Err(KeyWardenError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_private_key_rejects_wrong_length() {
        assert!(KeySource::from_private_key(&[1u8; 31]).is_err());
    }

    #[tokio::test]
    async fn test_software_signing() {
        let source = KeySource::from_private_key(&[7u8; 32]).unwrap();
        let signature = source
            .sign(&test_path(), b"test message", &NoHardware)
            .await
            .unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[tokio::test]
    async fn test_ledger_sign_requires_device() {
        let source = KeySource::from_private_key(&[7u8; 32]).unwrap();
        let public_key = source.public_key(&test_path()).unwrap();
        let ledger = KeySource::from_ledger_public_key(public_key.clone()).unwrap();

        assert_eq!(ledger.public_key(&test_path()).unwrap(), public_key);
        assert!(matches!(
            ledger.sign(&test_path(), b"msg", &NoHardware).await,
            Err(KeyWardenError::DeviceNotConnected(_))
        ));
    }

    #[test]
    fn test_plaintext_round_trip() {
        let phrase = generate_mnemonic(12).unwrap();
        let source = KeySource::from_mnemonic(phrase.expose()).unwrap();

        let restored =
            KeySource::from_plaintext(KeySourceKind::Mnemonic, &source.secret_bytes()).unwrap();
        assert_eq!(restored.export_string(), phrase.expose());
    }
}
