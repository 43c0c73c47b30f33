//! Hardware signer collaborator
//!
//! Ledger-backed key stores never hold private material; public-key
//! retrieval and signing round-trip an external device transport provided
//! by the embedding process. Both calls may require a user gesture on the
//! physical device, so both are async and carry device-specific failure
//! modes (`DeviceNotConnected`, `UserRejectedOnDevice`).

use crate::errors::{KeyWardenError, Result};
use crate::keys::Bip44Path;
use async_trait::async_trait;

/// External hardware-device transport
#[async_trait]
pub trait HardwareSigner: Send + Sync {
    /// Retrieve the compressed public key at a derivation path
    async fn get_public_key(&self, path: &Bip44Path) -> Result<Vec<u8>>;

    /// Sign a message with the key at a derivation path
    async fn sign(&self, path: &Bip44Path, message: &[u8]) -> Result<Vec<u8>>;
}

/// Default collaborator for deployments with no device transport wired in.
/// Every call reports the device as not connected.
pub struct NoHardware;

#[async_trait]
impl HardwareSigner for NoHardware {
    async fn get_public_key(&self, _path: &Bip44Path) -> Result<Vec<u8>> {
        Err(KeyWardenError::DeviceNotConnected(
            "no hardware transport configured".to_string(),
        ))
    }

    async fn sign(&self, _path: &Bip44Path, _message: &[u8]) -> Result<Vec<u8>> {
        Err(KeyWardenError::DeviceNotConnected(
            "no hardware transport configured".to_string(),
        ))
    }
}
