//! Configuration management for keywarden
//!
//! Supports loading configuration from:
//! - Environment variables (KEYWARDEN_*)
//! - Config file supplied by the embedding process
//! - Built-in defaults

use crate::errors::{KeyWardenError, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persistence configuration
    pub storage: StorageConfig,

    /// Encryption-at-rest configuration
    pub encryption: EncryptionConfig,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key under which the multi-key-store blob is persisted
    pub collection_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection_key: "key-ring/multi-key-store".to_string(),
        }
    }
}

/// Argon2id work factors applied to newly created key stores.
/// Existing records keep the parameters persisted inside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Iteration count
    pub iterations: u32,

    /// Parallelism (lanes)
    pub parallelism: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Start with defaults
        builder = builder.add_source(config::Config::try_from(&Config::default()).unwrap());

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Load from environment (KEYWARDEN_ENCRYPTION__ITERATIONS, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("KEYWARDEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| KeyWardenError::ConfigError(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| KeyWardenError::ConfigError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.collection_key.is_empty() {
            return Err(KeyWardenError::ConfigError(
                "storage.collection_key must not be empty".to_string(),
            ));
        }

        let enc = &self.encryption;
        if enc.iterations == 0 || enc.parallelism == 0 {
            return Err(KeyWardenError::ConfigError(
                "encryption iterations and parallelism must be non-zero".to_string(),
            ));
        }

        // Argon2 requires at least 8 KiB of memory per lane
        if enc.memory_kib < 8 * enc.parallelism {
            return Err(KeyWardenError::ConfigError(format!(
                "encryption.memory_kib {} too small for {} lanes",
                enc.memory_kib, enc.parallelism
            )));
        }

        Ok(())
    }
}
