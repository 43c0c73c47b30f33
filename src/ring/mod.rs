//! Key ring state machine
//!
//! The single in-process owner of key-ring state: the persisted multi-key-
//! store collection, the session's decrypted key material, and the session
//! password that re-decrypts on key-store switches. Lifecycle:
//!
//! NotLoaded --restore--> Empty | Locked --unlock--> Unlocked --lock--> Locked
//!
//! Creating the first key moves Empty straight to Unlocked. Decrypted
//! material lives only while Unlocked and is zeroized on lock.

use crate::chain::ChainInfo;
use crate::config::Config;
use crate::crypto::{self, KdfParams};
use crate::errors::{KeyWardenError, Result};
use crate::keys::{Bip44Path, KeySource, KeySourceKind};
use crate::keystore::{KeyStoreInfo, KeyStoreRecord, KvStore, MultiKeyStore};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle state of the key ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyRingStatus {
    NotLoaded,
    Empty,
    Locked,
    Unlocked,
}

/// Derived, ephemeral key for one chain; never persisted
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub algo: String,
    pub pub_key: Vec<u8>,
    pub address: Vec<u8>,
    pub bech32_address: String,
    pub is_hardware: bool,
}

/// Process-wide key ring
pub struct KeyRing {
    status: KeyRingStatus,
    multi: MultiKeyStore,
    cached: Option<KeySource>,
    session_password: Option<SecretString>,
    kdf: KdfParams,
}

impl KeyRing {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            status: KeyRingStatus::NotLoaded,
            multi: MultiKeyStore::new(store, config.storage.collection_key.clone()),
            cached: None,
            session_password: None,
            kdf: (&config.encryption).into(),
        }
    }

    pub fn status(&self) -> KeyRingStatus {
        self.status
    }

    /// Kind of the selected key store; readable without unlocking since the
    /// kind tag is part of the plaintext envelope
    pub fn kind(&self) -> Option<KeySourceKind> {
        self.multi.selected_record().map(|r| r.kind)
    }

    pub fn store_info(&self) -> Vec<KeyStoreInfo> {
        self.multi.list()
    }

    pub fn save(&self) -> Result<()> {
        self.multi.save()
    }

    /// Read persisted state on first use; later calls are no-ops so
    /// concurrent first callers all converge on the same loaded state
    pub fn restore(&mut self) -> Result<KeyRingStatus> {
        if self.status == KeyRingStatus::NotLoaded {
            self.multi.load()?;
            self.status = if self.multi.is_empty() {
                KeyRingStatus::Empty
            } else {
                KeyRingStatus::Locked
            };
            info!("Key ring restored: {:?}", self.status);
        }
        Ok(self.status)
    }

    /// Verify the password by decrypting the selected record and cache the
    /// decrypted material for the session
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        if self.status == KeyRingStatus::NotLoaded {
            self.restore()?;
        }

        match self.status {
            KeyRingStatus::Empty => Err(KeyWardenError::NoKey),
            KeyRingStatus::Unlocked => Ok(()),
            KeyRingStatus::Locked => {
                let record = self.multi.selected_record().ok_or(KeyWardenError::NoKey)?;
                let source = record
                    .decrypt_source(password)
                    .map_err(KeyWardenError::as_password_proof)?;

                self.cached = Some(source);
                self.session_password = Some(SecretString::new(password.to_string()));
                self.status = KeyRingStatus::Unlocked;
                info!("Key ring unlocked");
                Ok(())
            }
            KeyRingStatus::NotLoaded => {
                Err(KeyWardenError::InvalidState("restore did not run".to_string()))
            }
        }
    }

    /// Discard session key material; always succeeds
    pub fn lock(&mut self) {
        if self.status == KeyRingStatus::Unlocked {
            // Dropping the source zeroizes its secret buffers
            self.cached = None;
            self.session_password = None;
            self.status = KeyRingStatus::Locked;
            info!("Key ring locked");
        }
    }

    /// Create the first key store; the ring must be empty and ends Unlocked
    pub fn create_key(
        &mut self,
        source: KeySource,
        password: &str,
        bip44: Bip44Path,
        meta: HashMap<String, String>,
    ) -> Result<()> {
        if self.status == KeyRingStatus::NotLoaded {
            self.restore()?;
        }
        if self.status != KeyRingStatus::Empty {
            return Err(KeyWardenError::InvalidState(
                "create requires an empty key ring; use add instead".to_string(),
            ));
        }

        let record = KeyStoreRecord::new(&source, password, bip44, meta, self.kdf.clone())?;
        self.multi.add(record)?;

        self.cached = Some(source);
        self.session_password = Some(SecretString::new(password.to_string()));
        self.status = KeyRingStatus::Unlocked;
        info!("Created first key store; key ring unlocked");
        Ok(())
    }

    /// Add another key store under the session password; requires Unlocked
    pub fn add_key(
        &mut self,
        source: KeySource,
        bip44: Bip44Path,
        meta: HashMap<String, String>,
    ) -> Result<usize> {
        if self.status != KeyRingStatus::Unlocked {
            return Err(KeyWardenError::KeyRingNotUnlocked);
        }
        let password = self
            .session_password
            .as_ref()
            .ok_or(KeyWardenError::KeyRingNotUnlocked)?
            .expose_secret()
            .clone();

        let record = KeyStoreRecord::new(&source, &password, bip44, meta, self.kdf.clone())?;
        self.multi.add(record)
    }

    /// Delete a key store after a password proof. Deleting the selected
    /// store re-selects index 0; deleting the last store empties the ring.
    pub fn delete_key_store(&mut self, index: usize, password: &str) -> Result<()> {
        let was_selected = self.multi.selected_index() == index && !self.multi.is_empty();
        self.multi.delete(index, password)?;

        if self.multi.is_empty() {
            self.cached = None;
            self.session_password = None;
            self.status = KeyRingStatus::Empty;
            info!("Deleted last key store; key ring empty");
            return Ok(());
        }

        if was_selected && self.status == KeyRingStatus::Unlocked {
            // Re-decrypt the newly selected store for the session
            let session = self
                .session_password
                .as_ref()
                .ok_or(KeyWardenError::KeyRingNotUnlocked)?
                .expose_secret()
                .clone();
            match self
                .multi
                .selected_record()
                .ok_or(KeyWardenError::NoKey)?
                .decrypt_source(&session)
            {
                Ok(source) => self.cached = Some(source),
                Err(e) => {
                    // Session password does not open the re-selected store;
                    // fall back to Locked rather than hold stale material
                    self.lock();
                    return Err(e.as_password_proof());
                }
            }
        }
        Ok(())
    }

    /// Decrypt and render one store's secret after a password proof
    pub fn show_key_store(&self, index: usize, password: &str) -> Result<String> {
        let source = self.multi.export(index, password)?;
        Ok(source.export_string())
    }

    /// Switch the selected key store; requires Unlocked since the session
    /// password must re-decrypt the new selection
    pub fn change_selected(&mut self, index: usize) -> Result<()> {
        if self.status != KeyRingStatus::Unlocked {
            return Err(KeyWardenError::KeyRingNotUnlocked);
        }
        let old = self.multi.selected_index();
        self.multi.select(index)?;

        let session = self
            .session_password
            .as_ref()
            .ok_or(KeyWardenError::KeyRingNotUnlocked)?
            .expose_secret()
            .clone();

        match self
            .multi
            .selected_record()
            .ok_or(KeyWardenError::NoKey)?
            .decrypt_source(&session)
        {
            Ok(source) => {
                self.cached = Some(source);
                debug!("Active key store changed to {}", index);
                Ok(())
            }
            Err(e) => {
                // Roll the selection back; the switch never half-applies
                self.multi.select(old)?;
                Err(e.as_password_proof())
            }
        }
    }

    /// Pin a coin type for a chain on the selected store (set-once)
    pub fn set_key_store_coin_type(&mut self, chain_id: &str, coin_type: u32) -> Result<()> {
        if self.status == KeyRingStatus::NotLoaded {
            self.restore()?;
        }
        let record = self
            .multi
            .selected_record_mut()
            .ok_or(KeyWardenError::NoKey)?;
        record.set_coin_type(chain_id, coin_type)?;

        if let Err(e) = self.multi.save() {
            if let Some(record) = self.multi.selected_record_mut() {
                record.coin_type_overrides.remove(chain_id);
            }
            return Err(e);
        }
        info!("Coin type {} pinned for chain {}", coin_type, chain_id);
        Ok(())
    }

    pub fn is_coin_type_set(&self, chain_id: &str) -> Result<bool> {
        let record = self.multi.selected_record().ok_or(KeyWardenError::NoKey)?;
        Ok(record.coin_type_for(chain_id).is_some())
    }

    /// Resolve the derivation path for a chain: explicit per-chain override
    /// if pinned, else the chain's default coin type
    fn resolved_path(&self, chain: &ChainInfo) -> Result<Bip44Path> {
        let record = self.multi.selected_record().ok_or(KeyWardenError::NoKey)?;
        let coin_type = record
            .coin_type_for(&chain.chain_id)
            .unwrap_or(chain.default_coin_type);
        Ok(record.bip44.with_coin_type(coin_type))
    }

    /// Derive the active key for a chain; requires Unlocked
    pub fn get_key(&self, chain: &ChainInfo) -> Result<Key> {
        let source = self.unlocked_source()?;
        let path = self.resolved_path(chain)?;

        let pub_key = source.public_key(&path)?;
        let (address, bech32_address) =
            crypto::bech32::pubkey_to_address(&chain.bech32_prefix, &pub_key)?;

        Ok(Key {
            algo: "secp256k1".to_string(),
            pub_key,
            address,
            bech32_address,
            is_hardware: source.kind() == KeySourceKind::Ledger,
        })
    }

    /// Capture the signing context (decrypted source clone + resolved path)
    /// so an in-flight operation survives a later lock() untouched
    pub fn signing_context(&self, chain: &ChainInfo) -> Result<(KeySource, Bip44Path)> {
        let source = self.unlocked_source()?;
        let path = self.resolved_path(chain)?;
        Ok((source.clone(), path))
    }

    /// Derive address material for an explicit candidate path (coin-type
    /// selection flows); requires Unlocked
    pub fn derive_for_path(&self, chain: &ChainInfo, path: &Bip44Path) -> Result<Key> {
        let source = self.unlocked_source()?;
        let pub_key = source.public_key(path)?;
        let (address, bech32_address) =
            crypto::bech32::pubkey_to_address(&chain.bech32_prefix, &pub_key)?;

        Ok(Key {
            algo: "secp256k1".to_string(),
            pub_key,
            address,
            bech32_address,
            is_hardware: source.kind() == KeySourceKind::Ledger,
        })
    }

    fn unlocked_source(&self) -> Result<&KeySource> {
        if self.status != KeyRingStatus::Unlocked {
            return Err(KeyWardenError::KeyRingNotUnlocked);
        }
        self.cached.as_ref().ok_or(KeyWardenError::KeyRingNotUnlocked)
    }
}
