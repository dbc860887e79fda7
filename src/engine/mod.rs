//! The message engine: the public operation surface of QPG.
//!
//! Every operation is a short-lived, stateless pipeline: validate inputs,
//! resolve keys through the key store, run the primitives, frame the
//! result as armored text. Operations share nothing but the key store;
//! concurrent calls on different key IDs are fully independent.
//!
//! Key generation, signing, encapsulation and passphrase derivation each
//! take hundreds of milliseconds, so every primitive-touching stage runs
//! on the blocking worker pool rather than the async scheduler threads.
//! Unsealed private key material lives only for the duration of a single
//! operation and is never cached.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::armor;
use crate::crypto::{
    EncryptedMessage, KeyId, KeyPair, Passphrase, PublicKeyBundle, PublicKeyRecord, SignatureBlock,
};
use crate::error::{QpgError, Result};
use crate::keystore::{KeyStore, StorageStats};
use crate::validation::Validator;

/// Parameters for key pair generation.
#[derive(Clone)]
pub struct GenerateKeyParams {
    /// Owner identity, `Name <email>`
    pub user_id: String,
    /// Passphrase protecting the private half, minimum 8 characters
    pub passphrase: String,
}

impl std::fmt::Debug for GenerateKeyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateKeyParams")
            .field("user_id", &self.user_id)
            .field("passphrase", &"***")
            .finish()
    }
}

/// Parameters for message encryption.
#[derive(Debug, Clone)]
pub struct EncryptParams {
    /// Recipient key IDs; must be non-empty
    pub recipient_key_ids: Vec<KeyId>,
    /// Plaintext to encrypt; must be non-empty
    pub plaintext: Vec<u8>,
}

/// Parameters for message decryption.
#[derive(Clone)]
pub struct DecryptParams {
    /// The recipient key to decrypt with
    pub private_key_id: KeyId,
    /// Passphrase unsealing that key
    pub passphrase: String,
    /// Armored MESSAGE block
    pub ciphertext: String,
}

impl std::fmt::Debug for DecryptParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptParams")
            .field("private_key_id", &self.private_key_id)
            .field("passphrase", &"***")
            .finish()
    }
}

/// Parameters for signing, clear-signed or detached.
#[derive(Clone)]
pub struct SignParams {
    /// The signing key
    pub private_key_id: KeyId,
    /// Passphrase unsealing that key
    pub passphrase: String,
    /// Message text, signed byte-exact with no normalization
    pub message: String,
}

impl std::fmt::Debug for SignParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignParams")
            .field("private_key_id", &self.private_key_id)
            .field("passphrase", &"***")
            .finish()
    }
}

/// Parameters for signature verification.
#[derive(Debug, Clone)]
pub struct VerifyParams {
    /// The claimed signer
    pub signer_key_id: KeyId,
    /// Message text the signature covers
    pub message: String,
    /// Armored SIGNATURE block
    pub signature: String,
}

/// The outcome of a verification.
///
/// A well-formed but non-matching signature is a `false` outcome with a
/// reason, never an error; errors are reserved for structural problems
/// and unknown signers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// Whether the signature is valid for the message and signer
    pub is_valid: bool,
    /// Human-readable explanation of the outcome
    pub reason: String,
}

/// The engine owning a key store and exposing the six public operations.
#[derive(Debug)]
pub struct MessageEngine {
    keystore: Arc<KeyStore>,
    ready: bool,
}

impl MessageEngine {
    /// Creates an engine over an explicitly owned key store.
    ///
    /// Runs a cheap primitive self-check; `is_ready` reports its result.
    pub fn new(keystore: Arc<KeyStore>) -> Self {
        let ready = primitive_self_check();
        info!(
            degraded = keystore.is_degraded(),
            ready, "Message engine initialized"
        );
        Self { keystore, ready }
    }

    /// Whether the primitive layer is initialized and operations can be
    /// served.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Generates a key pair, seals its private half under the passphrase
    /// and persists both records.
    ///
    /// Validation failures happen before any key material is generated.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn generate_key_pair(&self, params: GenerateKeyParams) -> Result<KeyPair> {
        Validator::validate_user_id(&params.user_id)?;
        let passphrase = Passphrase::new(params.passphrase)?;

        let keystore = Arc::clone(&self.keystore);
        let user_id = params.user_id;
        let pair = run_blocking(move || {
            let pair = KeyPair::generate(&user_id)?;
            keystore.insert(&pair, &passphrase)?;
            Ok(pair)
        })
        .await?;

        info!(key_id = %pair.key_id, "Generated key pair");
        Ok(pair)
    }

    /// Encrypts a plaintext to every listed recipient and frames it as an
    /// armored MESSAGE block with one `Recipient-Key-Id` header per
    /// recipient.
    #[instrument(skip(self, params), fields(recipients = params.recipient_key_ids.len()))]
    pub async fn encrypt_message(&self, params: EncryptParams) -> Result<String> {
        if params.recipient_key_ids.is_empty() {
            return Err(QpgError::NoRecipients(
                "Encryption requires at least one recipient".to_string(),
            ));
        }
        Validator::validate_plaintext(&params.plaintext)?;

        let mut recipients = Vec::with_capacity(params.recipient_key_ids.len());
        for key_id in &params.recipient_key_ids {
            let record = self.keystore.get_public_key(*key_id)?;
            recipients.push(PublicKeyBundle::from_armored(&record.public_key_armored)?);
        }
        debug!("Resolved all recipient keys");

        let plaintext = params.plaintext;
        let armored = run_blocking(move || {
            let message = EncryptedMessage::encrypt(&recipients, &plaintext)?;
            message.to_armored()
        })
        .await?;

        info!("Encrypted message");
        Ok(armored)
    }

    /// Decrypts an armored MESSAGE block with one recipient's private
    /// key.
    #[instrument(skip(self, params), fields(key_id = %params.private_key_id))]
    pub async fn decrypt_message(&self, params: DecryptParams) -> Result<Vec<u8>> {
        Validator::validate_armor_input(&params.ciphertext)?;
        let message = EncryptedMessage::from_armored(&params.ciphertext)?;

        // Reject before the expensive unseal when the message was never
        // addressed to this key.
        let key_id = params.private_key_id;
        if !message.recipients.iter().any(|w| w.key_id.ct_eq(&key_id)) {
            return Err(QpgError::RecipientNotFound(format!(
                "Message carries no key wrap for key {}",
                key_id
            )));
        }

        let passphrase = Passphrase::new(params.passphrase)?;
        let keystore = Arc::clone(&self.keystore);
        let plaintext = run_blocking(move || {
            let private = keystore.retrieve_private_key(key_id, &passphrase)?;
            message.decrypt(&private)
        })
        .await?;

        info!("Decrypted message");
        Ok(plaintext)
    }

    /// Signs a message and frames it as a clear-signed block: the literal
    /// text followed by an armored SIGNATURE.
    #[instrument(skip(self, params), fields(key_id = %params.private_key_id))]
    pub async fn sign_message(&self, params: SignParams) -> Result<String> {
        let signature = self.make_signature(params.clone()).await?;

        let signed = armor::compose_clear_signed(
            &params.message,
            "SHA3-256",
            &signature_headers(),
            &signature.to_body()?,
        );
        info!("Created clear-signed message");
        Ok(signed)
    }

    /// Signs a message and returns the armored detached SIGNATURE alone.
    #[instrument(skip(self, params), fields(key_id = %params.private_key_id))]
    pub async fn create_detached_signature(&self, params: SignParams) -> Result<String> {
        let signature = self.make_signature(params).await?;
        let armored = signature.to_armored()?;
        info!("Created detached signature");
        Ok(armored)
    }

    /// Verifies an armored detached signature against a message and a
    /// claimed signer.
    ///
    /// Returns a structured outcome; an unknown signer or malformed
    /// framing is an error, a non-matching signature is not.
    #[instrument(skip(self, params), fields(signer = %params.signer_key_id))]
    pub async fn verify_message(&self, params: VerifyParams) -> Result<VerifyOutcome> {
        Validator::validate_armor_input(&params.signature)?;
        let signature = SignatureBlock::from_armored(&params.signature)?;
        self.verify_block(params.signer_key_id, params.message.as_bytes(), &signature)
            .await
    }

    /// Verifies a clear-signed message against a claimed signer.
    ///
    /// Splits the two-part framing, then verifies the embedded signature
    /// over the literal message text.
    #[instrument(skip(self, signed), fields(signer = %signer_key_id))]
    pub async fn verify_clear_signed(
        &self,
        signer_key_id: KeyId,
        signed: &str,
    ) -> Result<(String, VerifyOutcome)> {
        Validator::validate_armor_input(signed)?;
        let (message, sig_block) = armor::split_clear_signed(signed)?;
        let signature = SignatureBlock::from_body(&sig_block.body)?;

        let outcome = self
            .verify_block(signer_key_id, message.as_bytes(), &signature)
            .await?;
        Ok((message, outcome))
    }

    /// Lists all stored public key records in insertion order.
    pub fn list_public_keys(&self) -> Result<Vec<PublicKeyRecord>> {
        self.keystore.list_public_keys()
    }

    /// Current key store usage statistics.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.keystore.stats()
    }

    async fn make_signature(&self, params: SignParams) -> Result<SignatureBlock> {
        Validator::validate_plaintext(params.message.as_bytes())?;
        let passphrase = Passphrase::new(params.passphrase)?;

        let keystore = Arc::clone(&self.keystore);
        let key_id = params.private_key_id;
        run_blocking(move || {
            let private = keystore
                .retrieve_private_key(key_id, &passphrase)
                .map_err(|e| match e {
                    QpgError::KeyNotFound(detail) => QpgError::SignerNotFound(detail),
                    other => other,
                })?;
            SignatureBlock::sign(&private, params.message.as_bytes())
        })
        .await
    }

    async fn verify_block(
        &self,
        signer_key_id: KeyId,
        message: &[u8],
        signature: &SignatureBlock,
    ) -> Result<VerifyOutcome> {
        let record = self
            .keystore
            .get_public_key(signer_key_id)
            .map_err(|e| match e {
                QpgError::KeyNotFound(detail) => QpgError::SignerNotFound(detail),
                other => other,
            })?;
        let public = PublicKeyBundle::from_armored(&record.public_key_armored)?;

        if !signature.key_id.ct_eq(&signer_key_id) {
            return Ok(VerifyOutcome {
                is_valid: false,
                reason: format!(
                    "Signature was created by key {}, not {}",
                    signature.key_id, signer_key_id
                ),
            });
        }

        let signature = signature.clone();
        let message = message.to_vec();
        let is_valid =
            run_blocking(move || signature.verify(&public, &message)).await?;

        Ok(if is_valid {
            VerifyOutcome {
                is_valid: true,
                reason: "Signature is valid".to_string(),
            }
        } else {
            VerifyOutcome {
                is_valid: false,
                reason: "Signature does not match the message".to_string(),
            }
        })
    }
}

/// Verifies the hashing and constant-time comparison primitives against
/// known answers.
fn primitive_self_check() -> bool {
    let digest = crate::crypto::hash_data(b"");
    // SHA3-256 of the empty string.
    let expected: [u8; 8] = [0xA7, 0xFF, 0xC6, 0xF8, 0xBF, 0x1E, 0xD7, 0x66];
    if digest[..8] != expected {
        return false;
    }
    KeyId(1).ct_eq(&KeyId(1)) && !KeyId(1).ct_eq(&KeyId(2))
}

fn signature_headers() -> Vec<(String, String)> {
    vec![("Version".to_string(), format!("QPG {}", crate::VERSION))]
}

/// Runs a CPU-bound closure on the blocking worker pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QpgError::Task(format!("Blocking task failed: {}", e)))?
}
