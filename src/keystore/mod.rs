//! Key storage and management
//!
//! This module provides:
//! - Encrypted key store records with plaintext metadata envelopes
//! - The ordered multi-key-store collection with a selected index
//! - The persistence collaborator interface and its implementations

pub mod multi;
pub mod persist;
pub mod record;

pub use multi::{KeyStoreInfo, MultiKeyStore};
pub use persist::{FileKvStore, KvStore, MemoryKvStore};
pub use record::KeyStoreRecord;
