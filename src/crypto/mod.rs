//! Post-quantum cryptographic primitives for QPG.
//!
//! The primitive layer wraps NIST-standardized lattice algorithms:
//!
//! - **ML-DSA-87**: Module-Lattice-Based Digital Signature Algorithm
//!   (Dilithium-class, FIPS 204)
//! - **ML-KEM-1024**: Module-Lattice-Based Key-Encapsulation Mechanism
//!   (Kyber-class, FIPS 203)
//! - **AES-256-GCM**: authenticated symmetric encryption of message bodies
//!   and key material at rest
//! - **SHA3-256**: hashing for fingerprints, key IDs and key derivation
//!
//! Primitive failures are terminal for the calling operation; nothing in
//! this layer is retried.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

use crate::error::{QpgError, Result};

pub mod hybrid;
pub mod keys;
pub mod passphrase;
pub mod signature;

pub use hybrid::{EncryptedMessage, RecipientKeyWrap};
pub use keys::{KeyPair, PrivateKeyBundle, PublicKeyBundle, PublicKeyRecord};
pub use passphrase::{Passphrase, SealedPrivateKey};
pub use signature::SignatureBlock;

/// The algorithm pair bound to a key pair.
///
/// Each key pair binds exactly one signature keypair and one KEM keypair
/// under a shared identifier; there is no algorithm negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// ML-DSA-87 signatures combined with ML-KEM-1024 encapsulation
    MlDsa87MlKem1024,
}

impl Algorithm {
    /// Returns the algorithm name as presented in armor headers.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::MlDsa87MlKem1024 => "ML-DSA-87+ML-KEM-1024",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SHA3-256 hash of arbitrary data.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A collision-resistant digest of the public key material.
///
/// Computed over the algorithm tag and both public keys; used for
/// out-of-band verification and as the source of the key ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint for a signature/KEM public key pair.
    pub fn compute(algorithm: Algorithm, sign_public: &[u8], kem_public: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update([algorithm as u8]);
        hasher.update(sign_public);
        hasher.update(kem_public);
        Self(hasher.finalize().into())
    }

    /// Returns the raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the short key ID: the last 8 bytes of the fingerprint,
    /// standard PGP practice.
    pub fn key_id(&self) -> KeyId {
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.0[24..32]);
        KeyId(u64::from_be_bytes(tail))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Stable key identifier, derived deterministically from the fingerprint.
///
/// Displayed and parsed as 16 uppercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub u64);

impl KeyId {
    /// Constant-time equality, to avoid leaking which stored key matched.
    pub fn ct_eq(&self, other: &KeyId) -> bool {
        self.0.to_be_bytes().ct_eq(&other.0.to_be_bytes()).into()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for KeyId {
    type Err = QpgError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 16 {
            return Err(QpgError::key(format!(
                "Key ID must be 16 hex characters, got {}",
                s.len()
            )));
        }
        u64::from_str_radix(s, 16)
            .map(KeyId)
            .map_err(|_| QpgError::key(format!("Key ID '{}' is not valid hex", s)))
    }
}

/// Current Unix timestamp in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_name() {
        assert_eq!(
            Algorithm::MlDsa87MlKem1024.name(),
            "ML-DSA-87+ML-KEM-1024"
        );
    }

    #[test]
    fn test_hash_data_deterministic() {
        let a = hash_data(b"test data");
        let b = hash_data(b"test data");
        assert_eq!(a, b);
        assert_ne!(a, hash_data(b"test datb"));
    }

    #[test]
    fn test_fingerprint_and_key_id() {
        let fp = Fingerprint::compute(Algorithm::MlDsa87MlKem1024, b"sign", b"kem");
        let fp2 = Fingerprint::compute(Algorithm::MlDsa87MlKem1024, b"sign", b"kem");
        assert_eq!(fp, fp2);
        assert_eq!(fp.key_id(), fp2.key_id());

        let other = Fingerprint::compute(Algorithm::MlDsa87MlKem1024, b"sign", b"kem2");
        assert_ne!(fp, other);

        assert_eq!(fp.to_string().len(), 64);
        assert_eq!(fp.key_id().to_string().len(), 16);
    }

    #[test]
    fn test_key_id_display_parse_roundtrip() {
        let id = KeyId(0x0123_4567_89AB_CDEF);
        let text = id.to_string();
        assert_eq!(text, "0123456789ABCDEF");
        assert_eq!(text.parse::<KeyId>().unwrap(), id);

        assert!("short".parse::<KeyId>().is_err());
        assert!("ZZZZZZZZZZZZZZZZ".parse::<KeyId>().is_err());
    }

    #[test]
    fn test_key_id_constant_time_eq() {
        let a = KeyId(42);
        let b = KeyId(42);
        let c = KeyId(43);
        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
    }
}
