//! keywarden - key-ring subsystem for a browser-extension Cosmos wallet
//!
//! Stores, derives, unlocks, and uses private key material
//! (mnemonic-derived, raw-private-key, or hardware-ledger-backed) to sign
//! messages, mediating every signing operation through an asynchronous
//! user-approval flow and a per-origin permission check.
//!
//! # Security
//!
//! - Key material is encrypted at rest using AES-256-GCM with Argon2id key
//!   derivation; password correctness and data accessibility are one check
//! - Decrypted material lives only while the ring is unlocked and is zeroed
//!   on lock and on drop
//! - Every third-party signing request passes an origin-permission check and
//!   a bech32 signer-address gate before it is ever recorded
//!
//! # Usage
//!
//! The embedding extension wires the collaborators and drives the service:
//!
//! ```no_run
//! use keywarden::chain::{ChainInfo, StaticChainRegistry};
//! use keywarden::config::Config;
//! use keywarden::hardware::NoHardware;
//! use keywarden::interaction::{AllowAll, NoPrompt};
//! use keywarden::keystore::MemoryKvStore;
//! use keywarden::service::KeyRingService;
//! use std::sync::Arc;
//!
//! # async fn run() -> keywarden::errors::Result<()> {
//! let chains = StaticChainRegistry::with_chains(vec![ChainInfo {
//!     chain_id: "cosmoshub-4".to_string(),
//!     bech32_prefix: "cosmos".to_string(),
//!     default_coin_type: 118,
//!     features: vec![],
//! }]);
//!
//! let service = KeyRingService::new(
//!     Arc::new(MemoryKvStore::new()),
//!     Arc::new(chains),
//!     Arc::new(AllowAll),
//!     Arc::new(NoHardware),
//!     Arc::new(NoPrompt),
//!     &Config::default(),
//! );
//!
//! service.restore().await?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod hardware;
pub mod interaction;
pub mod keys;
pub mod keystore;
pub mod ring;
pub mod security;
pub mod service;

pub use errors::{KeyWardenError, Result};
pub use ring::{Key, KeyRing, KeyRingStatus};
pub use service::KeyRingService;
