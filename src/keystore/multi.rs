//! Multi-key-store manager
//!
//! An ordered collection of independently encrypted key store records plus
//! the selected index, persisted together as one blob so every mutation is
//! a single all-or-nothing write. Destructive operations (delete, export)
//! prove ownership by decrypting the target record; there is no separate
//! stored password hash.

use crate::errors::{KeyWardenError, Result};
use crate::keys::{Bip44Path, KeySource, KeySourceKind};
use crate::keystore::persist::KvStore;
use crate::keystore::record::KeyStoreRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata view of one record; never exposes decrypted secrets
#[derive(Debug, Clone, Serialize)]
pub struct KeyStoreInfo {
    pub index: usize,
    pub kind: KeySourceKind,
    pub meta: HashMap<String, String>,
    pub bip44: Bip44Path,
    pub selected: bool,
}

/// On-disk shape: collection and selection persisted as a unit
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCollection {
    key_stores: Vec<KeyStoreRecord>,
    selected_index: usize,
}

/// Ordered collection of encrypted key stores with a selected index
pub struct MultiKeyStore {
    records: Vec<KeyStoreRecord>,
    selected: usize,
    store: Arc<dyn KvStore>,
    collection_key: String,
}

impl MultiKeyStore {
    pub fn new(store: Arc<dyn KvStore>, collection_key: String) -> Self {
        Self {
            records: Vec::new(),
            selected: 0,
            store,
            collection_key,
        }
    }

    /// Read the persisted collection, replacing in-memory state
    pub fn load(&mut self) -> Result<()> {
        let Some(blob) = self.store.get(&self.collection_key)? else {
            self.records = Vec::new();
            self.selected = 0;
            return Ok(());
        };

        let persisted: PersistedCollection = serde_json::from_slice(&blob)?;
        self.records = persisted.key_stores;
        // A stale index in a hand-edited blob falls back to the first record
        self.selected = if persisted.selected_index < self.records.len() {
            persisted.selected_index
        } else {
            0
        };

        debug!(
            "Loaded {} key stores (selected {})",
            self.records.len(),
            self.selected
        );
        Ok(())
    }

    /// Persist the full collection and selection index as one write
    pub fn save(&self) -> Result<()> {
        let persisted = PersistedCollection {
            key_stores: self.records.clone(),
            selected_index: self.selected,
        };
        let blob = serde_json::to_vec(&persisted)?;
        self.store.set(&self.collection_key, &blob)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn get(&self, index: usize) -> Result<&KeyStoreRecord> {
        self.records.get(index).ok_or(KeyWardenError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn selected_record(&self) -> Option<&KeyStoreRecord> {
        self.records.get(self.selected)
    }

    pub fn selected_record_mut(&mut self) -> Option<&mut KeyStoreRecord> {
        self.records.get_mut(self.selected)
    }

    /// Append a record and persist; returns its index
    pub fn add(&mut self, record: KeyStoreRecord) -> Result<usize> {
        self.records.push(record);
        if let Err(e) = self.save() {
            self.records.pop();
            return Err(e);
        }

        let index = self.records.len() - 1;
        info!("Added key store at index {}", index);
        Ok(index)
    }

    /// Delete a record after a password proof against that record.
    /// Deleting the selected record re-selects index 0.
    pub fn delete(&mut self, index: usize, password: &str) -> Result<()> {
        let record = self.get(index)?;
        record
            .crypto
            .decrypt(password)
            .map_err(KeyWardenError::as_password_proof)?;

        let removed = self.records.remove(index);
        let old_selected = self.selected;
        if index == old_selected {
            self.selected = 0;
        } else if index < old_selected {
            self.selected = old_selected - 1;
        }

        if let Err(e) = self.save() {
            self.records.insert(index, removed);
            self.selected = old_selected;
            return Err(e);
        }

        info!("Deleted key store at index {}", index);
        Ok(())
    }

    /// Change the selected index and persist
    pub fn select(&mut self, index: usize) -> Result<()> {
        self.get(index)?;
        let old = self.selected;
        self.selected = index;

        if let Err(e) = self.save() {
            self.selected = old;
            return Err(e);
        }

        debug!("Selected key store {}", index);
        Ok(())
    }

    /// Decrypt a record's key material after a password proof. This is the
    /// most sensitive path in the subsystem; callers render, the manager
    /// only verifies and decrypts.
    pub fn export(&self, index: usize, password: &str) -> Result<KeySource> {
        self.get(index)?
            .decrypt_source(password)
            .map_err(KeyWardenError::as_password_proof)
    }

    /// Ordered metadata view
    pub fn list(&self) -> Vec<KeyStoreInfo> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| KeyStoreInfo {
                index,
                kind: record.kind,
                meta: record.meta.clone(),
                bip44: record.bip44,
                selected: index == self.selected,
            })
            .collect()
    }
}
