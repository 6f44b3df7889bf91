//! Cryptographic utilities for token generation and comparison
//!
//! Bearer secrets (session tokens, CSRF tokens) are generated from the OS
//! random number generator with 256 bits of entropy. Equality checks on
//! those secrets must not exit early on the first mismatching byte, so
//! comparison goes through the `subtle` crate.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

/// Generate a cryptographically secure random token.
///
/// Produces a 256-bit (32-byte) random value encoded as URL-safe base64
/// (43 characters).
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Perform constant-time comparison of two byte slices.
///
/// The comparison takes the same amount of time regardless of where (or
/// whether) the slices differ. Length is checked first; differing lengths
/// are not secret here since token lengths are fixed and public.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
