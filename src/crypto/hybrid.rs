//! Hybrid encryption: ML-KEM-1024 key encapsulation plus AES-256-GCM.
//!
//! The plaintext is encrypted exactly once under a random 256-bit session
//! key. For each recipient, an ML-KEM-1024 encapsulation against their
//! public key yields a shared secret; a SHA3-256 derivation of that
//! secret wraps the session key under AES-256-GCM. Any single recipient
//! can recover the session key from their own wrap entry.
//!
//! ML-KEM decapsulation uses implicit rejection: a well-formed but wrong
//! ciphertext yields a pseudorandom secret rather than an error, and the
//! failure surfaces later as an AEAD authentication failure. This layer
//! preserves that property and never reports which step rejected.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use pqcrypto_mlkem::mlkem1024;
use pqcrypto_traits::kem::{Ciphertext as _, SharedSecret as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::armor::{self, ArmorKind};
use crate::crypto::{hash_data, unix_now, Algorithm, KeyId, PrivateKeyBundle, PublicKeyBundle};
use crate::error::{QpgError, Result};

/// AES-GCM nonce size
const NONCE_SIZE: usize = 12;

/// One recipient's wrapped copy of the session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientKeyWrap {
    /// ID of the recipient's key pair
    pub key_id: KeyId,
    /// ML-KEM-1024 ciphertext carrying the shared secret
    pub encapsulated_key: Vec<u8>,
    /// Nonce for the session key wrap
    pub wrap_nonce: [u8; NONCE_SIZE],
    /// Session key encrypted under the derived wrap key
    pub wrapped_session_key: Vec<u8>,
}

/// A message encrypted to one or more recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// Algorithm pair used for all recipients
    pub algorithm: Algorithm,
    /// One wrap entry per recipient, in caller order
    pub recipients: Vec<RecipientKeyWrap>,
    /// Nonce for the message body
    pub nonce: [u8; NONCE_SIZE],
    /// AES-256-GCM ciphertext of the plaintext
    pub body: Vec<u8>,
    /// Encryption time (Unix seconds)
    pub created: u64,
}

impl EncryptedMessage {
    /// Encrypts a plaintext to every listed recipient.
    ///
    /// The body is encrypted once; each recipient gets an independent
    /// encapsulation and session key wrap. Duplicate recipients are
    /// harmless and yield duplicate wrap entries.
    pub fn encrypt(recipients: &[PublicKeyBundle], plaintext: &[u8]) -> Result<Self> {
        if recipients.is_empty() {
            return Err(QpgError::NoRecipients(
                "Encryption requires at least one recipient".to_string(),
            ));
        }

        let mut session_key = [0u8; 32];
        OsRng.fill_bytes(&mut session_key);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&session_key));
        let body = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| QpgError::crypto("Failed to encrypt message body"))?;

        let mut wraps = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let result = wrap_session_key(recipient, &session_key);
            match result {
                Ok(wrap) => wraps.push(wrap),
                Err(e) => {
                    session_key.zeroize();
                    return Err(e);
                }
            }
        }
        session_key.zeroize();

        Ok(Self {
            algorithm: Algorithm::MlDsa87MlKem1024,
            recipients: wraps,
            nonce,
            body,
            created: unix_now(),
        })
    }

    /// Decrypts the message with one recipient's private key.
    ///
    /// Fails with a recipient error when no wrap entry matches the key,
    /// and with an integrity error when the body or the wrap fails
    /// authentication. A wrong key with a matching ID is indistinguishable
    /// from a tampered message.
    pub fn decrypt(&self, private: &PrivateKeyBundle) -> Result<Vec<u8>> {
        let key_id = private.key_id();
        let wrap = self
            .recipients
            .iter()
            .find(|w| w.key_id.ct_eq(&key_id))
            .ok_or_else(|| {
                QpgError::RecipientNotFound(format!(
                    "Message carries no key wrap for key {}",
                    key_id
                ))
            })?;

        let mut session_key = unwrap_session_key(private, wrap)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&session_key));
        session_key.zeroize();

        cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.body.as_ref())
            .map_err(|_| QpgError::integrity("Message body failed authentication"))
    }

    /// Serializes the message into an armored MESSAGE block with one
    /// `Recipient-Key-Id` header per recipient.
    pub fn to_armored(&self) -> Result<String> {
        let body = bincode::serialize(self)
            .map_err(|e| QpgError::serialization(format!("Failed to serialize message: {}", e)))?;

        let mut headers = vec![("Version".to_string(), format!("QPG {}", crate::VERSION))];
        for wrap in &self.recipients {
            headers.push(("Recipient-Key-Id".to_string(), wrap.key_id.to_string()));
        }
        Ok(armor::encode(ArmorKind::Message, &headers, &body))
    }

    /// Parses an armored MESSAGE block back into a message.
    pub fn from_armored(armored: &str) -> Result<Self> {
        let block = armor::decode(armored)?;
        if block.kind != ArmorKind::Message {
            return Err(QpgError::format(format!(
                "Expected a message block, got {}",
                block.kind
            )));
        }
        bincode::deserialize(&block.body)
            .map_err(|e| QpgError::format(format!("Malformed encrypted message: {}", e)))
    }
}

fn wrap_session_key(recipient: &PublicKeyBundle, session_key: &[u8; 32]) -> Result<RecipientKeyWrap> {
    let kem_public = recipient.mlkem_public()?;
    let (shared, encapsulated) = mlkem1024::encapsulate(&kem_public);

    let mut wrap_key = hash_data(shared.as_bytes());
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrap_key));
    wrap_key.zeroize();

    let mut wrap_nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut wrap_nonce);

    let wrapped = cipher
        .encrypt(Nonce::from_slice(&wrap_nonce), session_key.as_ref())
        .map_err(|_| QpgError::crypto("Failed to wrap session key"))?;

    Ok(RecipientKeyWrap {
        key_id: recipient.key_id(),
        encapsulated_key: encapsulated.as_bytes().to_vec(),
        wrap_nonce,
        wrapped_session_key: wrapped,
    })
}

fn unwrap_session_key(private: &PrivateKeyBundle, wrap: &RecipientKeyWrap) -> Result<[u8; 32]> {
    let kem_secret = private.mlkem_secret()?;
    let ciphertext = mlkem1024::Ciphertext::from_bytes(&wrap.encapsulated_key)
        .map_err(|_| QpgError::decapsulation("Encapsulated key has an invalid size"))?;

    // Implicit rejection: a wrong but well-formed ciphertext yields a
    // pseudorandom secret here and fails the AEAD check below.
    let shared = mlkem1024::decapsulate(&ciphertext, &kem_secret);

    let mut wrap_key = hash_data(shared.as_bytes());
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&wrap_key));
    wrap_key.zeroize();

    let opened = cipher
        .decrypt(
            Nonce::from_slice(&wrap.wrap_nonce),
            wrap.wrapped_session_key.as_ref(),
        )
        .map_err(|_| QpgError::integrity("Session key wrap failed authentication"))?;

    let mut session_key = [0u8; 32];
    if opened.len() != session_key.len() {
        return Err(QpgError::integrity("Session key has an invalid size"));
    }
    session_key.copy_from_slice(&opened);
    Ok(session_key)
}
