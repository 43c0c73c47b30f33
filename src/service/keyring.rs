//! Approval-gated key-ring service
//!
//! The request/response surface the extension's message router calls into.
//! Operations reachable by third-party origins (enable, get_key,
//! request_sign, request_tx_config) run the origin-permission check before
//! anything else; sign requests additionally pass the bech32 address gate
//! before a pending request is created.

use crate::chain::ChainRegistry;
use crate::config::Config;
use crate::crypto;
use crate::errors::{KeyWardenError, Result};
use crate::hardware::HardwareSigner;
use crate::interaction::{
    InteractionHub, PendingRequestInfo, PermissionChecker, Prompter, RequestKind, RequestPayload,
    SignPayload, TxConfig,
};
use crate::keys::{Bip44Path, KeySource};
use crate::keystore::{KeyStoreInfo, KvStore};
use crate::ring::{Key, KeyRing, KeyRingStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// One candidate derivation path with its derived address, for the
/// coin-type selection flow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44Selectable {
    pub path: Bip44Path,
    pub bech32_address: String,
}

/// The key-ring subsystem's exposed surface
pub struct KeyRingService {
    ring: Mutex<KeyRing>,
    hub: InteractionHub,
    chains: Arc<dyn ChainRegistry>,
    permissions: Arc<dyn PermissionChecker>,
    hardware: Arc<dyn HardwareSigner>,
}

impl KeyRingService {
    pub fn new(
        store: Arc<dyn KvStore>,
        chains: Arc<dyn ChainRegistry>,
        permissions: Arc<dyn PermissionChecker>,
        hardware: Arc<dyn HardwareSigner>,
        prompter: Arc<dyn Prompter>,
        config: &Config,
    ) -> Self {
        Self {
            ring: Mutex::new(KeyRing::new(store, config)),
            hub: InteractionHub::new(prompter),
            chains,
            permissions,
            hardware,
        }
    }

    fn check_permission(&self, origin: &str, chain_id: &str) -> Result<()> {
        if !self.permissions.is_allowed(origin, chain_id) {
            return Err(KeyWardenError::OriginNotAllowed {
                origin: origin.to_string(),
                chain_id: chain_id.to_string(),
            });
        }
        Ok(())
    }

    // ---- lifecycle ----------------------------------------------------

    pub async fn restore(&self) -> Result<KeyRingStatus> {
        self.ring.lock().await.restore()
    }

    pub async fn save(&self) -> Result<()> {
        self.ring.lock().await.save()
    }

    pub async fn lock(&self) -> Result<KeyRingStatus> {
        let mut ring = self.ring.lock().await;
        ring.lock();
        Ok(ring.status())
    }

    /// Verify the password and unlock; also releases every caller suspended
    /// in an enable-unlock interaction
    pub async fn unlock(&self, password: &str) -> Result<KeyRingStatus> {
        {
            let mut ring = self.ring.lock().await;
            ring.unlock(password)?;
        }
        self.hub.approve_all(RequestKind::Unlock);
        Ok(KeyRingStatus::Unlocked)
    }

    /// Make the key ring usable for an origin on a chain. Restores on first
    /// use; suspends on an unlock interaction while Locked.
    pub async fn enable(&self, origin: &str, chain_id: &str) -> Result<KeyRingStatus> {
        let chain = self.chains.get_chain_info(chain_id)?;
        self.check_permission(origin, &chain.chain_id)?;

        let status = {
            let mut ring = self.ring.lock().await;
            ring.restore()?
        };

        match status {
            KeyRingStatus::Empty => Err(KeyWardenError::NoKey),
            KeyRingStatus::Unlocked => Ok(KeyRingStatus::Unlocked),
            KeyRingStatus::Locked => {
                self.hub
                    .wait_approve(origin, chain_id, RequestPayload::Unlock)
                    .await?;

                let ring = self.ring.lock().await;
                if ring.status() == KeyRingStatus::Unlocked {
                    Ok(KeyRingStatus::Unlocked)
                } else {
                    Err(KeyWardenError::KeyRingNotUnlocked)
                }
            }
            KeyRingStatus::NotLoaded => {
                Err(KeyWardenError::InvalidState("restore did not run".to_string()))
            }
        }
    }

    // ---- key-store management ----------------------------------------

    pub async fn create_mnemonic_key(
        &self,
        mnemonic: &str,
        password: &str,
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<KeyRingStatus> {
        let source = KeySource::from_mnemonic(mnemonic)?;
        let mut ring = self.ring.lock().await;
        ring.create_key(source, password, bip44, meta)?;
        Ok(ring.status())
    }

    pub async fn add_mnemonic_key(
        &self,
        mnemonic: &str,
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<Vec<KeyStoreInfo>> {
        let source = KeySource::from_mnemonic(mnemonic)?;
        let mut ring = self.ring.lock().await;
        ring.add_key(source, bip44, meta)?;
        Ok(ring.store_info())
    }

    pub async fn create_private_key(
        &self,
        private_key: &[u8],
        password: &str,
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<KeyRingStatus> {
        let source = KeySource::from_private_key(private_key)?;
        let mut ring = self.ring.lock().await;
        ring.create_key(source, password, bip44, meta)?;
        Ok(ring.status())
    }

    pub async fn add_private_key(
        &self,
        private_key: &[u8],
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<Vec<KeyStoreInfo>> {
        let source = KeySource::from_private_key(private_key)?;
        let mut ring = self.ring.lock().await;
        ring.add_key(source, bip44, meta)?;
        Ok(ring.store_info())
    }

    /// Create a ledger-backed key store. The device round trip happens
    /// first; only the reported public key is stored (encrypted).
    pub async fn create_ledger_key(
        &self,
        password: &str,
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<KeyRingStatus> {
        let public_key = self.hardware.get_public_key(&bip44).await?;
        let source = KeySource::from_ledger_public_key(public_key)?;

        let mut ring = self.ring.lock().await;
        ring.create_key(source, password, bip44, meta)?;
        Ok(ring.status())
    }

    pub async fn add_ledger_key(
        &self,
        meta: HashMap<String, String>,
        bip44: Bip44Path,
    ) -> Result<Vec<KeyStoreInfo>> {
        let public_key = self.hardware.get_public_key(&bip44).await?;
        let source = KeySource::from_ledger_public_key(public_key)?;

        let mut ring = self.ring.lock().await;
        ring.add_key(source, bip44, meta)?;
        Ok(ring.store_info())
    }

    pub async fn delete_key_store(&self, index: usize, password: &str) -> Result<KeyRingStatus> {
        let mut ring = self.ring.lock().await;
        ring.delete_key_store(index, password)?;
        Ok(ring.status())
    }

    /// Decrypt and return one store's secret material ("show keyring");
    /// requires a fresh password proof
    pub async fn show_key_store(&self, index: usize, password: &str) -> Result<String> {
        self.ring.lock().await.show_key_store(index, password)
    }

    pub async fn get_key_ring_kind(&self) -> String {
        self.ring
            .lock()
            .await
            .kind()
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    pub async fn get_multi_key_store_info(&self) -> Vec<KeyStoreInfo> {
        self.ring.lock().await.store_info()
    }

    pub async fn change_key_store(&self, index: usize) -> Result<Vec<KeyStoreInfo>> {
        let mut ring = self.ring.lock().await;
        ring.change_selected(index)?;
        Ok(ring.store_info())
    }

    pub async fn set_key_store_coin_type(&self, chain_id: &str, coin_type: u32) -> Result<()> {
        // The chain must exist before its coin type can be pinned
        self.chains.get_chain_info(chain_id)?;
        self.ring
            .lock()
            .await
            .set_key_store_coin_type(chain_id, coin_type)
    }

    /// Derived addresses for candidate paths, so the user can pick which
    /// coin type a chain should use. Empty once a coin type is pinned.
    pub async fn get_bip44_selectables(
        &self,
        chain_id: &str,
        paths: &[Bip44Path],
    ) -> Result<Vec<Bip44Selectable>> {
        let chain = self.chains.get_chain_info(chain_id)?;
        let ring = self.ring.lock().await;

        if ring.is_coin_type_set(chain_id)? {
            return Ok(Vec::new());
        }

        paths
            .iter()
            .map(|path| {
                let key = ring.derive_for_path(&chain, path)?;
                Ok(Bip44Selectable {
                    path: *path,
                    bech32_address: key.bech32_address,
                })
            })
            .collect()
    }

    // ---- keys and signing --------------------------------------------

    pub async fn get_key(&self, origin: &str, chain_id: &str) -> Result<Key> {
        let chain = self.chains.get_chain_info(chain_id)?;
        self.check_permission(origin, chain_id)?;
        self.ring.lock().await.get_key(&chain)
    }

    /// Sign a message for an origin. The permission check and the signer
    /// address gate both run before a pending request exists; the signing
    /// context is captured before the approval suspension so a concurrent
    /// lock() cannot corrupt an in-flight request.
    pub async fn request_sign(
        &self,
        origin: &str,
        chain_id: &str,
        signer: &str,
        message: &[u8],
        skip_approve: bool,
    ) -> Result<Vec<u8>> {
        let chain = self.chains.get_chain_info(chain_id)?;
        self.check_permission(origin, chain_id)?;

        let (source, path) = {
            let ring = self.ring.lock().await;
            let key = ring.get_key(&chain)?;
            crypto::bech32::check_bech32_address(&key.bech32_address, signer)?;
            ring.signing_context(&chain)?
        };

        let message = if skip_approve {
            message.to_vec()
        } else {
            let payload = RequestPayload::Sign(SignPayload {
                chain_id: chain_id.to_string(),
                signer: signer.to_string(),
                message: message.to_vec(),
            });
            match self.hub.wait_approve(origin, chain_id, payload).await? {
                RequestPayload::Sign(approved) => approved.message,
                _ => {
                    return Err(KeyWardenError::InvalidState(
                        "approval resolved with a mismatched payload".to_string(),
                    ))
                }
            }
        };

        let signature = source.sign(&path, &message, self.hardware.as_ref()).await?;
        info!("Signed message for {} on {}", origin, chain_id);
        Ok(signature)
    }

    pub async fn get_requested_message(&self, id: u64) -> Result<PendingRequestInfo> {
        let info = self.hub.get(id)?;
        if info.payload.kind() != RequestKind::Sign {
            return Err(KeyWardenError::UnknownRequest(id));
        }
        Ok(info)
    }

    pub async fn approve_sign(&self, id: u64) -> Result<()> {
        self.hub.approve(id, RequestKind::Sign, None)
    }

    pub async fn reject_sign(&self, id: u64) -> Result<()> {
        self.hub.reject(id, RequestKind::Sign)
    }

    /// Ask the user to confirm (and possibly edit) transaction fee/config
    /// parameters
    pub async fn request_tx_config(
        &self,
        origin: &str,
        chain_id: &str,
        config: TxConfig,
        skip_approve: bool,
    ) -> Result<TxConfig> {
        self.chains.get_chain_info(chain_id)?;
        self.check_permission(origin, chain_id)?;

        if skip_approve {
            return Ok(config);
        }

        match self
            .hub
            .wait_approve(origin, chain_id, RequestPayload::TxConfig(config))
            .await?
        {
            RequestPayload::TxConfig(approved) => Ok(approved),
            _ => Err(KeyWardenError::InvalidState(
                "approval resolved with a mismatched payload".to_string(),
            )),
        }
    }

    pub async fn get_requested_tx_config(&self, id: u64) -> Result<TxConfig> {
        let info = self.hub.get(id)?;
        match info.payload {
            RequestPayload::TxConfig(config) => Ok(config),
            _ => Err(KeyWardenError::UnknownRequest(id)),
        }
    }

    pub async fn approve_tx_config(&self, id: u64, edited: Option<TxConfig>) -> Result<()> {
        self.hub
            .approve(id, RequestKind::TxConfig, edited.map(RequestPayload::TxConfig))
    }

    pub async fn reject_tx_config(&self, id: u64) -> Result<()> {
        self.hub.reject(id, RequestKind::TxConfig)
    }

    /// All in-flight approval requests, for the extension's approval UI
    pub fn pending_requests(&self) -> Vec<PendingRequestInfo> {
        self.hub.pending_requests()
    }
}
