//! Password verification hashes.
//!
//! A [`PasswordHashRecord`] lets a client reject an obviously wrong password
//! before asking the server to decrypt. It is derived from the same password
//! as the envelope key but with its own salt, and it is never used as, or
//! turned into, an AES key.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::crypto::{pbkdf2_sha256, random_array, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN};
use crate::error::Result;
use crate::text::{base64url_decode, base64url_encode};

/// Record format version.
pub const PASSWORD_HASH_VERSION: u8 = 1;

/// Refuse to re-derive records claiming more iterations than this.
pub const MAX_VERIFY_ITERATIONS: u32 = 10_000_000;

/// A stored password hash, serialized as `{v, salt, hash, iter}`.
///
/// `salt` and `hash` are base64url. `iter` is the PBKDF2 count the record
/// was created with; older records may carry a lower count and are verified
/// with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHashRecord {
    #[serde(rename = "v")]
    pub version: u8,
    pub salt: String,
    pub hash: String,
    #[serde(rename = "iter")]
    pub iterations: u32,
}

impl PasswordHashRecord {
    /// Parse a persisted record, accepting only the current shape.
    pub fn from_json(raw: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(raw).ok()?;
        (record.version == PASSWORD_HASH_VERSION).then_some(record)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// PBKDF2-HMAC-SHA256 of `password` with a fixed 32-byte output.
pub fn derive(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; KEY_LEN]> {
    pbkdf2_sha256(password.as_bytes(), salt, iterations)
}

/// Create a record with a fresh salt and the current iteration count.
pub fn create(password: &str) -> Result<PasswordHashRecord> {
    let salt: [u8; SALT_LEN] = random_array();
    let hash = derive(password, &salt, PBKDF2_ITERATIONS)?;
    Ok(PasswordHashRecord {
        version: PASSWORD_HASH_VERSION,
        salt: base64url_encode(&salt),
        hash: base64url_encode(&hash),
        iterations: PBKDF2_ITERATIONS,
    })
}

/// Check `password` against `record` using the record's own salt and count.
///
/// A malformed record never verifies.
pub fn verify(password: &str, record: &PasswordHashRecord) -> bool {
    if record.iterations == 0 || record.iterations > MAX_VERIFY_ITERATIONS {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (
        base64url_decode(&record.salt),
        base64url_decode(&record.hash),
    ) else {
        return false;
    };
    match derive(password, &salt, record.iterations) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(_) => false,
    }
}

/// Compare two byte strings without early exit on the first difference.
///
/// Buffers of different length are unequal; no bytes are compared then.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_verify() {
        let record = create("secret-123").unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.iterations, PBKDF2_ITERATIONS);
        assert!(verify("secret-123", &record));
        assert!(!verify("not-match", &record));
    }

    #[test]
    fn test_records_are_never_identical() {
        let a = create("same-password").unwrap();
        let b = create("same-password").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(verify("same-password", &a));
        assert!(verify("same-password", &b));
    }

    #[test]
    fn test_verify_honors_older_iteration_count() {
        let salt = [9u8; SALT_LEN];
        let hash = derive("legacy-pw", &salt, 1_000).unwrap();
        let record = PasswordHashRecord {
            version: 1,
            salt: base64url_encode(&salt),
            hash: base64url_encode(&hash),
            iterations: 1_000,
        };
        assert!(verify("legacy-pw", &record));
        assert!(!verify("legacy-px", &record));
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_truncated_hash_does_not_verify() {
        let mut record = create("pw-1234").unwrap();
        record.hash.truncate(10);
        assert!(!verify("pw-1234", &record));
    }

    #[test]
    fn test_malformed_record_does_not_verify() {
        let record = PasswordHashRecord {
            version: 1,
            salt: "***".into(),
            hash: "AAAA".into(),
            iterations: 1_000,
        };
        assert!(!verify("pw", &record));

        let zero = PasswordHashRecord {
            iterations: 0,
            ..create("pw-1234").unwrap()
        };
        assert!(!verify("pw-1234", &zero));
    }

    #[test]
    fn test_json_shape() {
        let record = create("pw-1234").unwrap();
        let json = record.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["iter"], PBKDF2_ITERATIONS);
        assert!(value["salt"].is_string());
        assert!(value["hash"].is_string());

        assert_eq!(PasswordHashRecord::from_json(&json), Some(record));
        assert_eq!(
            PasswordHashRecord::from_json(r#"{"v":2,"salt":"a","hash":"b","iter":1}"#),
            None
        );
        assert_eq!(PasswordHashRecord::from_json("not json"), None);
    }
}
