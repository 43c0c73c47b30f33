//! BIP44 derivation paths
//!
//! A validated m/44'/coinType'/account'/change/addressIndex path. Paths are
//! checked at construction and again at use; a non-canonical path is an
//! error, never silently corrected.

use crate::errors::{KeyWardenError, Result};
use cosmrs::bip32::DerivationPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardened-derivation boundary. BIP44 hardens the first three levels, so
/// raw component values must stay below it.
const HARDENED: u32 = 0x8000_0000;

/// Check a bare coin-type value, as supplied to a per-chain override
pub fn validate_coin_type(coin_type: u32) -> Result<()> {
    if coin_type >= HARDENED {
        return Err(KeyWardenError::InvalidPath(format!(
            "coin type {} exceeds the hardened boundary",
            coin_type
        )));
    }
    Ok(())
}

/// A BIP44 path below the purpose level (purpose is always 44')
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bip44Path {
    pub coin_type: u32,
    pub account: u32,
    pub change: u32,
    pub address_index: u32,
}

impl Bip44Path {
    pub fn new(coin_type: u32, account: u32, change: u32, address_index: u32) -> Result<Self> {
        let path = Self {
            coin_type,
            account,
            change,
            address_index,
        };
        path.validate()?;
        Ok(path)
    }

    /// Check BIP44 canonical structure
    pub fn validate(&self) -> Result<()> {
        if self.change > 1 {
            return Err(KeyWardenError::InvalidPath(format!(
                "change must be 0 or 1, got {}",
                self.change
            )));
        }
        for (name, value) in [
            ("coin type", self.coin_type),
            ("account", self.account),
            ("address index", self.address_index),
        ] {
            if value >= HARDENED {
                return Err(KeyWardenError::InvalidPath(format!(
                    "{} {} exceeds the hardened boundary",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Same path with the coin type swapped; used when a per-chain override
    /// or a chain default replaces the creation-time coin type
    pub fn with_coin_type(mut self, coin_type: u32) -> Self {
        self.coin_type = coin_type;
        self
    }

    /// Render as a bip32 derivation path
    pub fn to_derivation_path(&self) -> Result<DerivationPath> {
        self.validate()?;
        self.to_string()
            .parse()
            .map_err(|e| KeyWardenError::InvalidPath(format!("{}", e)))
    }
}

impl Default for Bip44Path {
    fn default() -> Self {
        // Cosmos Hub coin type; chains override through the registry
        Self {
            coin_type: 118,
            account: 0,
            change: 0,
            address_index: 0,
        }
    }
}

impl fmt::Display for Bip44Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/44'/{}'/{}'/{}/{}",
            self.coin_type, self.account, self.change, self.address_index
        )
    }
}
