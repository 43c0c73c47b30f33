//! Secure handling of key material in memory
//!
//! This module provides:
//! - Memory zeroization to securely erase decrypted secrets
//! - Wrappers for mnemonic phrases and raw private keys

pub mod zeroize;

pub use zeroize::{SecureBytes, SecureString};
