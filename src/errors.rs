//! Error types for keywarden

use thiserror::Error;

/// Main error type for key-ring operations
#[derive(Error, Debug)]
pub enum KeyWardenError {
    // Password and encryption errors
    #[error("Wrong password")]
    WrongPassword,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // Key ring state errors
    #[error("Key ring is not unlocked")]
    KeyRingNotUnlocked,

    #[error("Key ring is empty")]
    NoKey,

    #[error("Key store index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Coin type is already set for chain {0}")]
    CoinTypeAlreadySet(String),

    #[error("Invalid key ring state: {0}")]
    InvalidState(String),

    // Key material errors
    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    // Address and chain errors
    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    // Approval flow errors
    #[error("Request rejected by user")]
    UserRejected,

    #[error("Unknown request id: {0}")]
    UnknownRequest(u64),

    #[error("Origin {origin} is not permitted on chain {chain_id}")]
    OriginNotAllowed { origin: String, chain_id: String },

    // Hardware signer errors
    #[error("Hardware device not connected: {0}")]
    DeviceNotConnected(String),

    #[error("Request rejected on hardware device")]
    UserRejectedOnDevice,

    // Storage errors
    #[error("Storage error: {0}")]
    StorageError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl KeyWardenError {
    /// Reinterpret a decryption failure as a failed password proof.
    /// Operations whose semantic is "prove you know the password" (unlock,
    /// delete, export, key-store switch) use this; the AEAD itself cannot
    /// tell a wrong password from a tampered record.
    pub(crate) fn as_password_proof(self) -> Self {
        match self {
            KeyWardenError::DecryptionFailed(_) => KeyWardenError::WrongPassword,
            other => other,
        }
    }
}

impl From<std::io::Error> for KeyWardenError {
    fn from(err: std::io::Error) -> Self {
        KeyWardenError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for KeyWardenError {
    fn from(err: serde_json::Error) -> Self {
        KeyWardenError::StorageError(format!("JSON error: {}", err))
    }
}

impl From<hex::FromHexError> for KeyWardenError {
    fn from(err: hex::FromHexError) -> Self {
        KeyWardenError::InvalidKeyFormat(format!("Hex decode error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, KeyWardenError>;
