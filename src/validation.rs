//! Input validation and size limits for QPG.
//!
//! Validation runs before any expensive cryptographic work so that a bad
//! user ID or an oversized message never costs a key generation or a
//! signing pass.

use crate::error::{QpgError, Result};

/// Maximum allowed plaintext size (100MB)
///
/// Prevents memory exhaustion; larger payloads should be chunked by the
/// caller before encryption.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Maximum allowed armored input size (150MB, base64 and framing overhead)
pub const MAX_ARMOR_SIZE: usize = 150 * 1024 * 1024;

/// Maximum allowed User ID length (1KB)
pub const MAX_USER_ID_LENGTH: usize = 1024;

/// Validation functions for input data
pub struct Validator;

impl Validator {
    /// Validates a user ID against the `Name <email>` shape.
    ///
    /// The name must be non-empty, the address must be bracketed at the end
    /// of the string, and the address itself needs a non-empty local part
    /// and a dotted domain.
    pub fn validate_user_id(user_id: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(QpgError::invalid_user_id("User ID cannot be empty"));
        }
        if user_id.len() > MAX_USER_ID_LENGTH {
            return Err(QpgError::invalid_user_id(format!(
                "User ID too long: {} bytes (max {})",
                user_id.len(),
                MAX_USER_ID_LENGTH
            )));
        }

        let trimmed = user_id.trim();
        let open = trimmed.find('<').ok_or_else(|| {
            QpgError::invalid_user_id("Expected 'Name <email>' form, missing '<'")
        })?;

        if !trimmed.ends_with('>') {
            return Err(QpgError::invalid_user_id(
                "Expected 'Name <email>' form, missing trailing '>'",
            ));
        }

        let name = trimmed[..open].trim();
        if name.is_empty() {
            return Err(QpgError::invalid_user_id("Name part cannot be empty"));
        }

        let email = &trimmed[open + 1..trimmed.len() - 1];
        Self::validate_email(email)
    }

    fn validate_email(email: &str) -> Result<()> {
        let (local, domain) = email.split_once('@').ok_or_else(|| {
            QpgError::invalid_user_id(format!("Email '{}' is missing '@'", email))
        })?;

        if local.is_empty() {
            return Err(QpgError::invalid_user_id(
                "Email local part cannot be empty",
            ));
        }
        if domain.is_empty() || !domain.contains('.') || domain.starts_with('.') {
            return Err(QpgError::invalid_user_id(format!(
                "Email domain '{}' is not valid",
                domain
            )));
        }
        if email.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return Err(QpgError::invalid_user_id(
                "Email cannot contain whitespace or angle brackets",
            ));
        }

        Ok(())
    }

    /// Validates that a plaintext is non-empty and within size limits.
    pub fn validate_plaintext(message: &[u8]) -> Result<()> {
        if message.is_empty() {
            return Err(QpgError::EmptyMessage(
                "Message cannot be empty".to_string(),
            ));
        }
        if message.len() > MAX_MESSAGE_SIZE {
            return Err(QpgError::format(format!(
                "Message too large: {} bytes (max {})",
                message.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Validates that an armored input is within size limits.
    pub fn validate_armor_input(armored: &str) -> Result<()> {
        if armored.len() > MAX_ARMOR_SIZE {
            return Err(QpgError::format(format!(
                "Armored input too large: {} bytes (max {})",
                armored.len(),
                MAX_ARMOR_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_ids() {
        Validator::validate_user_id("Alice <alice@example.com>").unwrap();
        Validator::validate_user_id("Bob Smith <bob.smith@mail.example.org>").unwrap();
        Validator::validate_user_id("  Carol  <carol@example.com>  ").unwrap();
    }

    #[test]
    fn test_invalid_user_ids() {
        assert!(Validator::validate_user_id("").is_err());
        assert!(Validator::validate_user_id("bad").is_err());
        assert!(Validator::validate_user_id("alice@example.com").is_err());
        assert!(Validator::validate_user_id("<alice@example.com>").is_err());
        assert!(Validator::validate_user_id("Alice <alice@example.com").is_err());
        assert!(Validator::validate_user_id("Alice <aliceexample.com>").is_err());
        assert!(Validator::validate_user_id("Alice <@example.com>").is_err());
        assert!(Validator::validate_user_id("Alice <alice@com>").is_err());
        assert!(Validator::validate_user_id("Alice <a b@example.com>").is_err());
    }

    #[test]
    fn test_user_id_error_kind() {
        let err = Validator::validate_user_id("bad").unwrap_err();
        assert!(matches!(err, QpgError::InvalidUserId(_)));
    }

    #[test]
    fn test_plaintext_validation() {
        Validator::validate_plaintext(b"hello").unwrap();

        let err = Validator::validate_plaintext(b"").unwrap_err();
        assert!(matches!(err, QpgError::EmptyMessage(_)));
    }

    #[test]
    fn test_oversized_user_id() {
        let huge = format!("{} <a@example.com>", "x".repeat(MAX_USER_ID_LENGTH + 1));
        assert!(Validator::validate_user_id(&huge).is_err());
    }
}
