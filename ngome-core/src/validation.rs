//! Centralized validation utilities
//!
//! Single source of truth for input validation shared by the services, so
//! the same rule is never re-implemented slightly differently per handler.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Minimum length for lock/unlock justification text.
pub const MIN_JUSTIFICATION_LEN: usize = 10;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9._-]{2,49}$").expect("Invalid username regex pattern")
});

/// Validates a login name: lowercase alphanumeric with separators, 3-50 chars.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::MissingField(
            "Username is required".to_string(),
        ));
    }

    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::InvalidField(format!(
            "Invalid username format: {username}"
        )))
    }
}

/// Validates justification text for administrative lock/unlock operations.
///
/// Reasons and verification notes must carry enough substance for the audit
/// trail; a minimum length is the only mechanical check applied.
pub fn validate_justification(text: &str, field: &'static str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.len() < MIN_JUSTIFICATION_LEN {
        return Err(ValidationError::JustificationTooShort {
            field,
            min: MIN_JUSTIFICATION_LEN,
            actual: trimmed.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("jkhamis").is_ok());
        assert!(validate_username("a.salim-2024").is_ok());
        assert!(validate_username("m_ali").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err()); // too short
        assert!(validate_username("JKhamis").is_err()); // uppercase
        assert!(validate_username("user name").is_err()); // whitespace
        assert!(validate_username(&"a".repeat(51)).is_err()); // too long
    }

    #[test]
    fn test_validate_justification() {
        assert!(validate_justification("Suspicious access pattern detected", "reason").is_ok());
        assert!(validate_justification("exactly10!", "reason").is_ok());

        let err = validate_justification("too short", "reason").unwrap_err();
        match err {
            ValidationError::JustificationTooShort { field, min, actual } => {
                assert_eq!(field, "reason");
                assert_eq!(min, 10);
                assert_eq!(actual, 9);
            }
            e => panic!("Expected JustificationTooShort, got {e:?}"),
        }

        // Whitespace padding does not count toward the minimum
        assert!(validate_justification("   short    ", "notes").is_err());
    }
}
