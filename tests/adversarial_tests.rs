//! Tests against hostile inputs: tampered armor, spliced blocks, wrong
//! keys and malformed signatures.

use std::sync::Arc;

use qpg::armor::{self, ArmorKind};
use qpg::crypto::{EncryptedMessage, KeyPair, PrivateKeyBundle, PublicKeyBundle, SignatureBlock};
use qpg::engine::{DecryptParams, GenerateKeyParams, MessageEngine, VerifyParams};
use qpg::keystore::KeyStore;
use qpg::QpgError;

fn key_bundles(user: &str) -> (KeyPair, PublicKeyBundle, PrivateKeyBundle) {
    let pair = KeyPair::generate(user).unwrap();
    let public = PublicKeyBundle::from_armored(&pair.public_key_armored).unwrap();
    let private = PrivateKeyBundle::from_armored(&pair.private_key_armored).unwrap();
    (pair, public, private)
}

#[test]
fn test_flipped_body_byte_fails_checksum() {
    let armored = armor::encode(ArmorKind::Message, &[], &[0x42u8; 128]);

    // Flip one character in each body line in turn; every variant must
    // fail to decode.
    let lines: Vec<&str> = armored.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("-----") || line.starts_with('=') || line.is_empty() {
            continue;
        }
        let mut mutated = lines.clone();
        let flipped = if line.starts_with('A') {
            format!("B{}", &line[1..])
        } else {
            format!("A{}", &line[1..])
        };
        mutated[i] = &flipped;
        let text = mutated.join("\n");
        assert!(armor::decode(&text).is_err(), "line {} survived a flip", i);
    }
}

#[test]
fn test_spliced_end_marker_rejected() {
    let armored = armor::encode(ArmorKind::PublicKey, &[], b"key material");
    let spliced = armored.replace(
        "-----END PGP PUBLIC KEY BLOCK-----",
        "-----END PGP PRIVATE KEY BLOCK-----",
    );
    assert!(armor::decode(&spliced).is_err());
}

#[test]
fn test_message_body_replayed_as_key_block() {
    let (_, public, _) = key_bundles("Alice <alice@example.com>");
    let message = EncryptedMessage::encrypt(&[public], b"payload").unwrap();
    let body = {
        let armored = message.to_armored().unwrap();
        armor::decode(&armored).unwrap().body
    };

    // Re-armor the encrypted message body as a public key block; the key
    // parser must reject it.
    let forged = armor::encode(ArmorKind::PublicKey, &[], &body);
    assert!(PublicKeyBundle::from_armored(&forged).is_err());
}

#[test]
fn test_signature_transplanted_between_messages() {
    let (_, public, private) = key_bundles("Alice <alice@example.com>");

    let sig_for_a = SignatureBlock::sign(&private, b"message a").unwrap();
    assert!(!sig_for_a.verify(&public, b"message b").unwrap());
}

#[test]
fn test_wrap_entry_swapped_between_recipients() {
    let (_, alice_pub, alice_priv) = key_bundles("Alice <alice@example.com>");
    let (_, bob_pub, _) = key_bundles("Bob <bob@example.com>");

    let mut msg = EncryptedMessage::encrypt(&[alice_pub], b"for alice").unwrap();
    let bob_msg = EncryptedMessage::encrypt(&[bob_pub], b"for bob").unwrap();

    // Graft Bob's wrap entry under Alice's key ID.
    msg.recipients[0].encapsulated_key = bob_msg.recipients[0].encapsulated_key.clone();
    msg.recipients[0].wrapped_session_key = bob_msg.recipients[0].wrapped_session_key.clone();
    msg.recipients[0].wrap_nonce = bob_msg.recipients[0].wrap_nonce;

    let err = msg.decrypt(&alice_priv).unwrap_err();
    assert!(matches!(err, QpgError::Integrity(_)));
}

#[test]
fn test_headers_do_not_grant_access() {
    let (_, alice_pub, _) = key_bundles("Alice <alice@example.com>");
    let (_, _, carol_priv) = key_bundles("Carol <carol@example.com>");
    let carol_id = carol_priv.key_id();

    let msg = EncryptedMessage::encrypt(&[alice_pub], b"for alice").unwrap();
    let armored = msg.to_armored().unwrap();

    // Forge a Recipient-Key-Id header naming Carol; the wrap entries are
    // authoritative, so decryption must still fail.
    let forged = armored.replace(
        "Recipient-Key-Id:",
        &format!("Recipient-Key-Id: {}\nRecipient-Key-Id:", carol_id),
    );
    let reparsed = EncryptedMessage::from_armored(&forged).unwrap();
    let err = reparsed.decrypt(&carol_priv).unwrap_err();
    assert!(matches!(err, QpgError::RecipientNotFound(_)));
}

#[tokio::test]
async fn test_truncated_ciphertext_reports_format() {
    let store = Arc::new(KeyStore::in_memory());
    let engine = MessageEngine::new(Arc::clone(&store));
    let pair = engine
        .generate_key_pair(GenerateKeyParams {
            user_id: "Alice <alice@example.com>".to_string(),
            passphrase: "correct-horse-battery".to_string(),
        })
        .await
        .unwrap();

    let armored = engine
        .encrypt_message(qpg::engine::EncryptParams {
            recipient_key_ids: vec![pair.key_id],
            plaintext: b"payload".to_vec(),
        })
        .await
        .unwrap();

    // Cut the armored text in half.
    let truncated: String = armored.chars().take(armored.len() / 2).collect();
    let err = engine
        .decrypt_message(DecryptParams {
            private_key_id: pair.key_id,
            passphrase: "correct-horse-battery".to_string(),
            ciphertext: truncated,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, QpgError::Format(_)));
}

#[tokio::test]
async fn test_garbage_signature_bytes_are_structural_error() {
    let engine = MessageEngine::new(Arc::new(KeyStore::in_memory()));
    let pair = engine
        .generate_key_pair(GenerateKeyParams {
            user_id: "Alice <alice@example.com>".to_string(),
            passphrase: "correct-horse-battery".to_string(),
        })
        .await
        .unwrap();

    // A well-armored block whose body is not a signature at all.
    let forged = armor::encode(ArmorKind::Signature, &[], b"not a signature");
    let err = engine
        .verify_message(VerifyParams {
            signer_key_id: pair.key_id,
            message: "hello".to_string(),
            signature: forged,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, QpgError::MalformedSignature(_)));
}

#[test]
fn test_sealed_key_salt_reuse_does_not_occur() {
    use qpg::crypto::{KeyId, Passphrase, SealedPrivateKey};

    let p = Passphrase::new("correct-horse-battery").unwrap();
    let mut seen_salts = Vec::new();
    for _ in 0..8 {
        let sealed = SealedPrivateKey::seal(KeyId(1), b"material", &p).unwrap();
        let bytes = bincode::serialize(&sealed).unwrap();
        assert!(!seen_salts.contains(&bytes));
        seen_salts.push(bytes);
    }
}
