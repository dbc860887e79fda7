//! # QPG - Quantum-resistant Privacy Guard
//!
//! A post-quantum message engine with OpenPGP-style armored framing.
//! Messages are encrypted, signed and verified with NIST-standardized
//! lattice algorithms, and every artifact crossing the system boundary
//! is armored ASCII text.
//!
//! ## Features
//!
//! - **Post-Quantum Security**: ML-DSA-87 signatures and ML-KEM-1024
//!   encapsulation, the highest NIST security category
//! - **Hybrid Encryption**: each message body is encrypted once under a
//!   session key, wrapped per recipient through a KEM encapsulation
//! - **Armored Framing**: RFC 4880-style BEGIN/END blocks with CRC-24
//!   checksums, plus two-part clear-signed framing
//! - **Sealed Private Keys**: private key material at rest is protected
//!   with Argon2id and AES-256-GCM under the owner's passphrase
//!
//! ## Cryptographic Algorithms
//!
//! - **Digital Signatures**: ML-DSA-87 (NIST FIPS 204)
//! - **Key Encapsulation**: ML-KEM-1024 (NIST FIPS 203)
//! - **Symmetric Encryption**: AES-256-GCM
//! - **Hashing / KDF**: SHA3-256 and Argon2id
//!
//! ## Examples
//!
//! ### Key Generation and Encryption
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qpg::engine::{EncryptParams, GenerateKeyParams, MessageEngine};
//! use qpg::keystore::KeyStore;
//!
//! # #[tokio::main]
//! # async fn main() -> qpg::Result<()> {
//! let engine = MessageEngine::new(Arc::new(KeyStore::open("./keys_db")));
//!
//! let pair = engine
//!     .generate_key_pair(GenerateKeyParams {
//!         user_id: "Alice <alice@example.com>".to_string(),
//!         passphrase: "correct-horse-battery".to_string(),
//!     })
//!     .await?;
//!
//! let armored = engine
//!     .encrypt_message(EncryptParams {
//!         recipient_key_ids: vec![pair.key_id],
//!         plaintext: b"Secret post-quantum message".to_vec(),
//!     })
//!     .await?;
//! assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));
//! # Ok(())
//! # }
//! ```

pub mod armor;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod storage;
pub mod validation;

pub use error::{QpgError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
