//! Chain registry collaborator
//!
//! The key ring never hard-codes chain parameters; it asks a registry for
//! the bech32 prefix and default coin type of a chain id. An unknown chain
//! is fatal to any operation referencing it.

use crate::errors::{KeyWardenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chain parameters the key ring needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: String,
    pub bech32_prefix: String,
    pub default_coin_type: u32,
    #[serde(default)]
    pub features: Vec<String>,
}

/// External chain-registry service
pub trait ChainRegistry: Send + Sync {
    fn get_chain_info(&self, chain_id: &str) -> Result<ChainInfo>;
}

/// Fixed in-process registry table
#[derive(Default)]
pub struct StaticChainRegistry {
    chains: HashMap<String, ChainInfo>,
}

impl StaticChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chains(chains: Vec<ChainInfo>) -> Self {
        let mut registry = Self::new();
        for chain in chains {
            registry.insert(chain);
        }
        registry
    }

    pub fn insert(&mut self, chain: ChainInfo) {
        self.chains.insert(chain.chain_id.clone(), chain);
    }
}

impl ChainRegistry for StaticChainRegistry {
    fn get_chain_info(&self, chain_id: &str) -> Result<ChainInfo> {
        self.chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| KeyWardenError::UnknownChain(chain_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let registry = StaticChainRegistry::with_chains(vec![ChainInfo {
            chain_id: "cosmoshub-4".to_string(),
            bech32_prefix: "cosmos".to_string(),
            default_coin_type: 118,
            features: vec![],
        }]);

        let info = registry.get_chain_info("cosmoshub-4").unwrap();
        assert_eq!(info.bech32_prefix, "cosmos");

        assert!(matches!(
            registry.get_chain_info("nope-1"),
            Err(KeyWardenError::UnknownChain(_))
        ));
    }
}
