//! Key store records
//!
//! One encrypted key-material record plus its plaintext envelope: kind tag,
//! display metadata, BIP44 path, and per-chain coin-type overrides. The
//! ciphertext is only decryptable with the record's password; everything
//! else is stored alongside in the clear.

use crate::crypto::{EncryptedRecord, KdfParams};
use crate::errors::{KeyWardenError, Result};
use crate::keys::{Bip44Path, KeySource, KeySourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Encrypted key store record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStoreRecord {
    /// Version of the record format
    pub version: u32,

    /// Source kind (mnemonic, privateKey, ledger)
    pub kind: KeySourceKind,

    /// Encrypted key material
    pub crypto: EncryptedRecord,

    /// Display metadata (e.g. name); never secret
    #[serde(default)]
    pub meta: HashMap<String, String>,

    /// Per-chain coin-type overrides (chain id -> coin type)
    #[serde(default)]
    pub coin_type_overrides: HashMap<String, u32>,

    /// BIP44 path registered at creation; the coin type level is replaced
    /// per chain at derivation time
    pub bip44: Bip44Path,

    /// Creation timestamp
    pub created_at: i64,
}

impl KeyStoreRecord {
    /// Encrypt a key source into a new record
    pub fn new(
        source: &KeySource,
        password: &str,
        bip44: Bip44Path,
        meta: HashMap<String, String>,
        kdf: KdfParams,
    ) -> Result<Self> {
        bip44.validate()?;
        let crypto = EncryptedRecord::encrypt(&source.secret_bytes(), password, kdf)?;

        Ok(Self {
            version: 1,
            kind: source.kind(),
            crypto,
            meta,
            coin_type_overrides: HashMap::new(),
            bip44,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Decrypt back into a key source
    pub fn decrypt_source(&self, password: &str) -> Result<KeySource> {
        let plaintext = self.crypto.decrypt(password)?;
        KeySource::from_plaintext(self.kind, plaintext.expose())
    }

    /// Explicit coin-type override for a chain, if one was pinned
    pub fn coin_type_for(&self, chain_id: &str) -> Option<u32> {
        self.coin_type_overrides.get(chain_id).copied()
    }

    /// Pin the coin type for a chain. Set-once: changing an existing pin
    /// would silently change the user's derived address for that chain.
    pub fn set_coin_type(&mut self, chain_id: &str, coin_type: u32) -> Result<()> {
        if self.coin_type_overrides.contains_key(chain_id) {
            return Err(KeyWardenError::CoinTypeAlreadySet(chain_id.to_string()));
        }
        crate::keys::path::validate_coin_type(coin_type)?;
        self.coin_type_overrides
            .insert(chain_id.to_string(), coin_type);
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.meta.get("name").map(String::as_str).unwrap_or("unnamed")
    }
}
