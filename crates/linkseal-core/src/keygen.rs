//! Share key generation and validation.
//!
//! A share key is opaque: random bytes rendered as base64url, with no
//! structure or checksum. Collision handling belongs to the caller.

use crate::crypto::random_array;
use crate::text::base64url_encode;

/// Random bytes per generated key (renders to 12 characters).
pub const SHARE_KEY_BYTES: usize = 9;

/// Accepted share key length range.
pub const SHARE_KEY_MIN_LEN: usize = 8;
pub const SHARE_KEY_MAX_LEN: usize = 32;

/// Minimum password length after trimming whitespace.
pub const PASSWORD_MIN_LEN: usize = 4;

/// Source of candidate share keys.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Cryptographically random keys from the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        generate_share_key()
    }
}

/// Generate a fresh random share key.
pub fn generate_share_key() -> String {
    base64url_encode(&random_array::<SHARE_KEY_BYTES>())
}

/// True for `[A-Za-z0-9_-]{8,32}`.
pub fn is_valid_share_key(key: &str) -> bool {
    (SHARE_KEY_MIN_LEN..=SHARE_KEY_MAX_LEN).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// True when the password has enough non-whitespace content.
pub fn is_valid_password(password: &str) -> bool {
    password.trim().chars().count() >= PASSWORD_MIN_LEN
}
