//! Error types for QPG operations.

use thiserror::Error;

/// Result type alias for QPG operations.
pub type Result<T> = std::result::Result<T, QpgError>;

/// Main error type for QPG operations.
///
/// Every failure path carries a stable kind plus a free-text detail. The
/// detail never contains passphrases or private key bytes.
#[derive(Error, Debug)]
pub enum QpgError {
    /// Malformed armor or message framing
    #[error("Format error: {0}")]
    Format(String),

    /// User ID does not match the `Name <email>` shape
    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    /// Passphrase does not meet the minimum policy
    #[error("Weak passphrase: {0}")]
    WeakPassphrase(String),

    /// Plaintext for encryption or signing was empty
    #[error("Empty message: {0}")]
    EmptyMessage(String),

    /// Encryption was requested with no recipients
    #[error("No recipients: {0}")]
    NoRecipients(String),

    /// Wrong passphrase or tampered sealed key material
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Key ID not present in the key store
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Signer's public key is unknown
    #[error("Signer not found: {0}")]
    SignerNotFound(String),

    /// No key wrap entry for the requested private key
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Authenticated decryption of a message body failed
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Signature bytes could not be parsed
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// KEM ciphertext bytes could not be reconstructed
    #[error("Decapsulation error: {0}")]
    Decapsulation(String),

    /// Persistent storage backend is unavailable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Storage backend operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Key construction or reconstruction errors
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Background task errors
    #[error("Task error: {0}")]
    Task(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QpgError {
    /// Creates a new format error.
    pub fn format<T: ToString>(msg: T) -> Self {
        Self::Format(msg.to_string())
    }

    /// Creates a new invalid user ID error.
    pub fn invalid_user_id<T: ToString>(msg: T) -> Self {
        Self::InvalidUserId(msg.to_string())
    }

    /// Creates a new weak passphrase error.
    pub fn weak_passphrase<T: ToString>(msg: T) -> Self {
        Self::WeakPassphrase(msg.to_string())
    }

    /// Creates a new authentication error.
    pub fn authentication<T: ToString>(msg: T) -> Self {
        Self::Authentication(msg.to_string())
    }

    /// Creates a new key-not-found error.
    pub fn key_not_found<T: ToString>(msg: T) -> Self {
        Self::KeyNotFound(msg.to_string())
    }

    /// Creates a new integrity error.
    pub fn integrity<T: ToString>(msg: T) -> Self {
        Self::Integrity(msg.to_string())
    }

    /// Creates a new malformed signature error.
    pub fn malformed_signature<T: ToString>(msg: T) -> Self {
        Self::MalformedSignature(msg.to_string())
    }

    /// Creates a new decapsulation error.
    pub fn decapsulation<T: ToString>(msg: T) -> Self {
        Self::Decapsulation(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new cryptographic error.
    pub fn crypto<T: ToString>(msg: T) -> Self {
        Self::Crypto(msg.to_string())
    }

    /// Creates a new key error.
    pub fn key<T: ToString>(msg: T) -> Self {
        Self::Key(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }
}
