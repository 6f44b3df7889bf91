//! Known-weak password list
//!
//! A compact list of the passwords that dominate credential-stuffing
//! dictionaries. Matching is case-insensitive. This is deliberately a small
//! embedded list rather than a full breach corpus; the strength estimator
//! catches the longer tail.

/// Passwords rejected outright, matched case-insensitively.
pub(crate) const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "p@ssw0rd",
    "p@ssword",
    "123456",
    "1234567",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty",
    "qwerty123",
    "qwertyuiop",
    "abc123",
    "abcd1234",
    "iloveyou",
    "admin",
    "admin123",
    "administrator",
    "welcome",
    "welcome1",
    "welcome123",
    "letmein",
    "monkey",
    "dragon",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "superman",
    "batman",
    "trustno1",
    "master",
    "shadow",
    "michael",
    "jennifer",
    "computer",
    "freedom",
    "whatever",
    "starwars",
    "cheese",
    "summer",
    "winter",
    "secret",
    "login",
    "access",
    "default",
    "changeme",
    "change123",
    "test123",
    "temp123",
    "zanzibar",
    "serikali",
    "utumishi",
    "karibu123",
];

/// Case-insensitive membership test against the known-weak list.
pub fn is_common_password(password: &str) -> bool {
    let lower = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|&p| p == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_passwords_rejected() {
        assert!(is_common_password("password"));
        assert!(is_common_password("123456"));
        assert!(is_common_password("changeme"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert!(is_common_password("PASSWORD"));
        assert!(is_common_password("Qwerty123"));
        assert!(is_common_password("P@SSW0RD"));
    }

    #[test]
    fn test_uncommon_passwords_pass() {
        assert!(!is_common_password("kT9#mWx2$vLq"));
        assert!(!is_common_password("correct horse battery staple"));
        assert!(!is_common_password(""));
    }
}
