//! Bech32 account-address derivation and validation
//!
//! Deterministic address computation from a compressed secp256k1 public key
//! and a chain-specific human-readable prefix, plus the pre-signing
//! address-match gate. The gate is a security check: a caller-supplied
//! signer address that does not match the ring's derived address must stop
//! the signing request before it is ever recorded.

use crate::errors::{KeyWardenError, Result};
use cosmrs::AccountId;

/// Encode raw account-address bytes under a bech32 prefix
pub fn encode(prefix: &str, address: &[u8]) -> Result<String> {
    let account = AccountId::new(prefix, address)
        .map_err(|e| KeyWardenError::InvalidKeyFormat(format!("bech32 encode: {}", e)))?;
    Ok(account.to_string())
}

/// Decode a bech32 address into its prefix and raw bytes.
/// Checksum failures surface as `InvalidKeyFormat`.
pub fn decode(address: &str) -> Result<(String, Vec<u8>)> {
    let account: AccountId = address
        .parse()
        .map_err(|e| KeyWardenError::InvalidKeyFormat(format!("bech32 decode: {}", e)))?;
    Ok((account.prefix().to_string(), account.to_bytes()))
}

/// Derive (raw address bytes, bech32 address) from a compressed secp256k1
/// public key. The raw form is RIPEMD160(SHA256(pubkey)).
pub fn pubkey_to_address(prefix: &str, public_key: &[u8]) -> Result<(Vec<u8>, String)> {
    let tm_key = cosmrs::tendermint::PublicKey::from_raw_secp256k1(public_key).ok_or_else(
        || KeyWardenError::InvalidKeyFormat("not a compressed secp256k1 public key".to_string()),
    )?;

    let account = cosmrs::crypto::PublicKey::from(tm_key)
        .account_id(prefix)
        .map_err(|e| KeyWardenError::InvalidKeyFormat(format!("address derivation: {}", e)))?;

    Ok((account.to_bytes(), account.to_string()))
}

/// Verify that a caller-supplied signer address matches the address the key
/// ring derived. Undecodable input is treated as a mismatch; the signing
/// request must not proceed either way.
pub fn check_bech32_address(expected: &str, supplied: &str) -> Result<()> {
    let mismatch = || KeyWardenError::AddressMismatch {
        expected: expected.to_string(),
        actual: supplied.to_string(),
    };

    let account: AccountId = supplied.parse().map_err(|_| mismatch())?;
    if account.to_string() != expected {
        return Err(mismatch());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmrs::crypto::secp256k1::SigningKey;

    fn test_pubkey() -> Vec<u8> {
        SigningKey::from_slice(&[7u8; 32])
            .unwrap()
            .public_key()
            .to_bytes()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let bytes: Vec<u8> = (0..20).collect();
        let encoded = encode("cosmos", &bytes).unwrap();
        assert!(encoded.starts_with("cosmos1"));

        let (prefix, decoded) = decode(&encoded).unwrap();
        assert_eq!(prefix, "cosmos");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let bytes: Vec<u8> = (0..20).collect();
        let mut encoded = encode("cosmos", &bytes).unwrap();
        encoded.pop();
        encoded.push('q');
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn test_pubkey_to_address_matches_signing_key_derivation() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let expected = key.public_key().account_id("cosmos").unwrap();

        let (raw, bech32) = pubkey_to_address("cosmos", &test_pubkey()).unwrap();
        assert_eq!(bech32, expected.to_string());
        assert_eq!(raw, expected.to_bytes());
        assert_eq!(raw.len(), 20);
    }

    #[test]
    fn test_check_address_accepts_match() {
        let (_, bech32) = pubkey_to_address("cosmos", &test_pubkey()).unwrap();
        assert!(check_bech32_address(&bech32, &bech32).is_ok());
    }

    #[test]
    fn test_check_address_rejects_mismatch_and_garbage() {
        let (_, bech32) = pubkey_to_address("cosmos", &test_pubkey()).unwrap();
        let other = encode("cosmos", &[9u8; 20]).unwrap();

        assert!(matches!(
            check_bech32_address(&bech32, &other),
            Err(KeyWardenError::AddressMismatch { .. })
        ));
        assert!(matches!(
            check_bech32_address(&bech32, "not-an-address"),
            Err(KeyWardenError::AddressMismatch { .. })
        ));
    }
}
