//! ML-DSA-87 detached signatures.
//!
//! Signing is hash-then-sign: the message is digested with SHA3-256 and
//! the digest is signed, so signature size is independent of message
//! size. A signature block records which key produced it; verification
//! against a different key is an ordinary `false`, not an error.

use pqcrypto_mldsa::mldsa87;
use pqcrypto_traits::sign::DetachedSignature as _;
use serde::{Deserialize, Serialize};

use crate::armor::{self, ArmorKind};
use crate::crypto::{hash_data, unix_now, Algorithm, KeyId, PrivateKeyBundle, PublicKeyBundle};
use crate::error::{QpgError, Result};

/// A detached signature over a message digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Algorithm that produced the signature
    pub algorithm: Algorithm,
    /// ID of the signing key
    pub key_id: KeyId,
    /// Raw ML-DSA-87 detached signature bytes
    pub signature: Vec<u8>,
    /// Signing time (Unix seconds)
    pub created: u64,
}

impl SignatureBlock {
    /// Signs a message with the given private key.
    pub fn sign(private: &PrivateKeyBundle, message: &[u8]) -> Result<Self> {
        let secret = private.mldsa_secret()?;
        let digest = hash_data(message);
        let signature = mldsa87::detached_sign(&digest, &secret);

        Ok(Self {
            algorithm: private.algorithm,
            key_id: private.key_id(),
            signature: signature.as_bytes().to_vec(),
            created: unix_now(),
        })
    }

    /// Verifies this signature against a message and a public key.
    ///
    /// Returns `Ok(false)` when the signature was produced by a different
    /// key or does not match the message. Errors only when the signature
    /// bytes themselves cannot be parsed.
    pub fn verify(&self, public: &PublicKeyBundle, message: &[u8]) -> Result<bool> {
        let detached = mldsa87::DetachedSignature::from_bytes(&self.signature)
            .map_err(|_| QpgError::malformed_signature("Signature bytes are not a valid ML-DSA-87 signature"))?;

        if self.algorithm != public.algorithm || !self.key_id.ct_eq(&public.key_id()) {
            return Ok(false);
        }

        let verifying = public.mldsa_public()?;
        let digest = hash_data(message);
        Ok(mldsa87::verify_detached_signature(&detached, &digest, &verifying).is_ok())
    }

    /// Serializes the block into an armored SIGNATURE.
    pub fn to_armored(&self) -> Result<String> {
        let body = bincode::serialize(self)
            .map_err(|e| QpgError::serialization(format!("Failed to serialize signature: {}", e)))?;
        Ok(armor::encode(
            ArmorKind::Signature,
            &[
                ("Version".to_string(), format!("QPG {}", crate::VERSION)),
                ("Hash".to_string(), "SHA3-256".to_string()),
            ],
            &body,
        ))
    }

    /// Parses an armored SIGNATURE back into a block.
    pub fn from_armored(armored: &str) -> Result<Self> {
        let block = armor::decode(armored)?;
        if block.kind != ArmorKind::Signature {
            return Err(QpgError::format(format!(
                "Expected a signature block, got {}",
                block.kind
            )));
        }
        Self::from_body(&block.body)
    }

    /// Parses a raw serialized signature body, as carried inside
    /// clear-signed framing.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        bincode::deserialize(body)
            .map_err(|e| QpgError::malformed_signature(format!("Malformed signature block: {}", e)))
    }

    /// Serializes the block body without armor framing.
    pub fn to_body(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| QpgError::serialization(format!("Failed to serialize signature: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn key_bundles(user: &str) -> (PublicKeyBundle, PrivateKeyBundle) {
        let pair = KeyPair::generate(user).unwrap();
        (
            PublicKeyBundle::from_armored(&pair.public_key_armored).unwrap(),
            PrivateKeyBundle::from_armored(&pair.private_key_armored).unwrap(),
        )
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (public, private) = key_bundles("Alice <alice@example.com>");
        let message = b"message to sign";

        let sig = SignatureBlock::sign(&private, message).unwrap();
        assert_eq!(sig.key_id, public.key_id());
        assert!(sig.verify(&public, message).unwrap());
    }

    #[test]
    fn test_modified_message_fails() {
        let (public, private) = key_bundles("Alice <alice@example.com>");

        let sig = SignatureBlock::sign(&private, b"original").unwrap();
        assert!(!sig.verify(&public, b"modified").unwrap());
    }

    #[test]
    fn test_wrong_key_is_false_not_error() {
        let (_, alice_private) = key_bundles("Alice <alice@example.com>");
        let (bob_public, _) = key_bundles("Bob <bob@example.com>");

        let sig = SignatureBlock::sign(&alice_private, b"message").unwrap();
        assert!(!sig.verify(&bob_public, b"message").unwrap());
    }

    #[test]
    fn test_garbage_signature_bytes_error() {
        let (public, private) = key_bundles("Alice <alice@example.com>");

        let mut sig = SignatureBlock::sign(&private, b"message").unwrap();
        sig.signature.truncate(10);

        let err = sig.verify(&public, b"message").unwrap_err();
        assert!(matches!(err, QpgError::MalformedSignature(_)));
    }

    #[test]
    fn test_corrupted_signature_same_size_is_false() {
        let (public, private) = key_bundles("Alice <alice@example.com>");

        let mut sig = SignatureBlock::sign(&private, b"message").unwrap();
        sig.signature[0] ^= 0xFF;
        assert!(!sig.verify(&public, b"message").unwrap());
    }

    #[test]
    fn test_armored_roundtrip() {
        let (public, private) = key_bundles("Alice <alice@example.com>");

        let sig = SignatureBlock::sign(&private, b"message").unwrap();
        let armored = sig.to_armored().unwrap();
        assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----"));
        assert!(armored.contains("Hash: SHA3-256"));

        let parsed = SignatureBlock::from_armored(&armored).unwrap();
        assert!(parsed.verify(&public, b"message").unwrap());
    }
}
