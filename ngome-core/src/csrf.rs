//! Double-submit CSRF guard
//!
//! A secret token is set as a cookie at session start; the client mirrors
//! it into a custom header on every state-changing request. Both values
//! must be present and exactly equal (constant-time) for the request to
//! proceed. The guard proves only that the request originated from a page
//! able to read the cookie; it never authenticates a user.

use crate::crypto::{constant_time_compare, generate_secure_token};

/// Cookie carrying the CSRF secret.
pub const CSRF_COOKIE: &str = "ngome_csrf";

/// Header the client mirrors the cookie value into.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Issue a fresh CSRF token.
pub fn issue_token() -> String {
    generate_secure_token()
}

/// Whether a request method mutates state and therefore requires the
/// token pair. Safe methods (GET/HEAD/OPTIONS) pass unchecked.
pub fn requires_protection(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE"
    )
}

/// Why a token pair was rejected.
///
/// The classification feeds the audit trail; client-facing responses stay
/// generic so an attacker cannot tell which half was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfRejection {
    MissingCookie,
    MissingHeader,
    MissingBoth,
    Mismatch,
}

impl CsrfRejection {
    pub fn audit_label(&self) -> &'static str {
        match self {
            CsrfRejection::MissingCookie => "missing_cookie",
            CsrfRejection::MissingHeader => "missing_header",
            CsrfRejection::MissingBoth => "missing_both",
            CsrfRejection::Mismatch => "token_mismatch",
        }
    }
}

/// Verify the double-submit pair. Both values must exist and match.
pub fn verify(cookie: Option<&str>, header: Option<&str>) -> Result<(), CsrfRejection> {
    match (cookie, header) {
        (None, None) => Err(CsrfRejection::MissingBoth),
        (None, Some(_)) => Err(CsrfRejection::MissingCookie),
        (Some(_), None) => Err(CsrfRejection::MissingHeader),
        (Some(cookie), Some(header)) => {
            if constant_time_compare(cookie.as_bytes(), header.as_bytes()) {
                Ok(())
            } else {
                Err(CsrfRejection::Mismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_methods_skip_protection() {
        assert!(!requires_protection("GET"));
        assert!(!requires_protection("HEAD"));
        assert!(!requires_protection("OPTIONS"));
        assert!(!requires_protection("get"));
    }

    #[test]
    fn test_unsafe_methods_require_protection() {
        assert!(requires_protection("POST"));
        assert!(requires_protection("PUT"));
        assert!(requires_protection("PATCH"));
        assert!(requires_protection("DELETE"));
        assert!(requires_protection("post"));
    }

    #[test]
    fn test_matching_pair_passes() {
        let token = issue_token();
        assert!(verify(Some(&token), Some(&token)).is_ok());
    }

    #[test]
    fn test_rejection_classification() {
        let token = issue_token();
        assert_eq!(verify(None, None), Err(CsrfRejection::MissingBoth));
        assert_eq!(
            verify(None, Some(&token)),
            Err(CsrfRejection::MissingCookie)
        );
        assert_eq!(
            verify(Some(&token), None),
            Err(CsrfRejection::MissingHeader)
        );

        let other = issue_token();
        assert_eq!(
            verify(Some(&token), Some(&other)),
            Err(CsrfRejection::Mismatch)
        );
    }

    #[test]
    fn test_near_miss_is_mismatch() {
        let token = issue_token();
        let truncated = &token[..token.len() - 1];
        assert_eq!(
            verify(Some(&token), Some(truncated)),
            Err(CsrfRejection::Mismatch)
        );
    }

    #[test]
    fn test_issued_tokens_are_unique() {
        assert_ne!(issue_token(), issue_token());
    }
}
