//! Passphrase-based protection of private key material.
//!
//! Private keys at rest are sealed with AES-256-GCM under a key derived
//! from the owner's passphrase with Argon2id. Every seal uses a fresh
//! random salt and nonce; unsealing with the wrong passphrase fails the
//! AEAD tag check (a constant-time comparison inside the cipher), so a
//! tampered record and a wrong passphrase are indistinguishable.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::KeyId;
use crate::error::{QpgError, Result};

/// Salt size for Argon2id (128 bits)
const SALT_SIZE: usize = 16;

/// AES-GCM nonce size
const NONCE_SIZE: usize = 12;

/// Minimum passphrase length. Shorter passphrases are rejected before any
/// key material is generated or touched.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Argon2id work factor: 19 MiB memory, 2 passes, single lane.
///
/// This is the currently recommended interactive-login cost and the
/// memory-hard equivalent of a six-figure PBKDF2 iteration count.
const ARGON2_PARAMS: argon2::Params = match argon2::Params::new(19 * 1024, 2, 1, Some(32)) {
    Ok(params) => params,
    Err(_) => panic!("Invalid Argon2 parameters"),
};

/// A passphrase, zeroized on drop and never logged.
#[derive(Clone)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wraps a passphrase string, enforcing the minimum length policy.
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        let passphrase = passphrase.into();
        if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(QpgError::weak_passphrase(format!(
                "Passphrase must be at least {} characters",
                MIN_PASSPHRASE_LEN
            )));
        }
        Ok(Self(passphrase))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Drop for Passphrase {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

/// Private key material sealed under a passphrase-derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedPrivateKey {
    /// The owning key pair
    pub key_id: KeyId,
    /// Argon2id salt, fresh per sealing operation
    salt: [u8; SALT_SIZE],
    /// AES-GCM nonce, fresh per sealing operation
    nonce: [u8; NONCE_SIZE],
    /// AES-256-GCM ciphertext (includes the authentication tag)
    ciphertext: Vec<u8>,
}

impl SealedPrivateKey {
    /// Seals private key bytes under a passphrase.
    pub fn seal(key_id: KeyId, plaintext: &[u8], passphrase: &Passphrase) -> Result<Self> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let mut derived = derive_key(passphrase, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        derived.zeroize();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| QpgError::crypto("Failed to seal private key"))?;

        Ok(Self {
            key_id,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Unseals the private key bytes.
    ///
    /// Fails with an authentication error when the passphrase is wrong or
    /// the record has been tampered with; the two cases are deliberately
    /// not distinguished.
    pub fn unseal(&self, passphrase: &Passphrase) -> Result<Vec<u8>> {
        let mut derived = derive_key(passphrase, &self.salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        derived.zeroize();

        cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref())
            .map_err(|_| {
                QpgError::authentication(
                    "Could not unseal private key: wrong passphrase or tampered record",
                )
            })
    }

    /// Size of the sealed ciphertext in bytes.
    pub fn sealed_size(&self) -> usize {
        self.ciphertext.len()
    }
}

/// Derives a 256-bit key from a passphrase with Argon2id.
///
/// Deterministic for a fixed passphrase and salt.
fn derive_key(passphrase: &Passphrase, salt: &[u8; SALT_SIZE]) -> Result<[u8; 32]> {
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ARGON2_PARAMS,
    );

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut output)
        .map_err(|e| QpgError::crypto(format!("Key derivation failed: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passphrase(s: &str) -> Passphrase {
        Passphrase::new(s).unwrap()
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let p = passphrase("correct-horse-battery");
        let secret = b"private key material for testing";

        let sealed = SealedPrivateKey::seal(KeyId(7), secret, &p).unwrap();
        assert_eq!(sealed.key_id, KeyId(7));

        let opened = sealed.unseal(&p).unwrap();
        assert_eq!(opened, secret);
    }

    #[test]
    fn test_wrong_passphrase_is_authentication_error() {
        let sealed =
            SealedPrivateKey::seal(KeyId(1), b"secret", &passphrase("correct-horse")).unwrap();

        let err = sealed.unseal(&passphrase("wrong-horse!")).unwrap_err();
        assert!(matches!(err, QpgError::Authentication(_)));
    }

    #[test]
    fn test_tampered_record_is_authentication_error() {
        let p = passphrase("correct-horse");
        let mut sealed = SealedPrivateKey::seal(KeyId(1), b"secret", &p).unwrap();
        if let Some(byte) = sealed.ciphertext.first_mut() {
            *byte = byte.wrapping_add(1);
        }

        let err = sealed.unseal(&p).unwrap_err();
        assert!(matches!(err, QpgError::Authentication(_)));
    }

    #[test]
    fn test_weak_passphrase_rejected() {
        let err = Passphrase::new("short").unwrap_err();
        assert!(matches!(err, QpgError::WeakPassphrase(_)));
        assert!(Passphrase::new("").is_err());
        assert!(Passphrase::new("exactly8").is_ok());
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_seal() {
        let p = passphrase("same-passphrase");
        let a = SealedPrivateKey::seal(KeyId(1), b"same data", &p).unwrap();
        let b = SealedPrivateKey::seal(KeyId(1), b"same data", &p).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(a.unseal(&p).unwrap(), b.unseal(&p).unwrap());
    }

    #[test]
    fn test_debug_never_prints_contents() {
        let p = passphrase("super-secret-value");
        let debug = format!("{:?}", p);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_sealed_record_serde_roundtrip() {
        let p = passphrase("correct-horse");
        let sealed = SealedPrivateKey::seal(KeyId(9), b"bytes", &p).unwrap();

        let encoded = bincode::serialize(&sealed).unwrap();
        let decoded: SealedPrivateKey = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.unseal(&p).unwrap(), b"bytes");
    }
}
