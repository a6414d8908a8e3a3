//! Password-based key derivation and AES-256-GCM.
//!
//! Every envelope generation shares the same primitive pipeline:
//! PBKDF2-HMAC-SHA256 over a 16-byte salt yields a 256-bit AES key, and the
//! (optionally compressed) plaintext is sealed with AES-GCM under a 12-byte IV.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{EnvelopeError, Result};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;

/// Derived key / hash length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count for every envelope and every new password hash.
///
/// Bounded by the slowest runtime the service is deployed on; raising it
/// invalidates nothing because password-hash records carry their own count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fill a fixed-size array from the thread RNG.
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// PBKDF2-HMAC-SHA256 with a 32-byte output.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; KEY_LEN]> {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut out)
        .map_err(|e| EnvelopeError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// A 16-byte PBKDF2 salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn generate() -> Self {
        Self(random_array())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice of exactly [`SALT_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SALT_LEN] = bytes
            .try_into()
            .map_err(|_| EnvelopeError::format(format!("salt must be {SALT_LEN} bytes")))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// A 12-byte AES-GCM initialization vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_LEN]);

impl Iv {
    /// Generate a fresh random IV.
    pub fn generate() -> Self {
        Self(random_array())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice of exactly [`IV_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; IV_LEN] = bytes
            .try_into()
            .map_err(|_| EnvelopeError::format(format!("iv must be {IV_LEN} bytes")))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// A 256-bit AES-GCM key derived from a password.
#[derive(Clone)]
pub struct AesKey([u8; KEY_LEN]);

impl AesKey {
    /// Derive the envelope key for `password` under `salt`.
    pub fn derive(password: &str, salt: &Salt) -> Result<Self> {
        Self::derive_with_iterations(password, salt, PBKDF2_ITERATIONS)
    }

    /// Derive with an explicit iteration count.
    pub fn derive_with_iterations(password: &str, salt: &Salt, iterations: u32) -> Result<Self> {
        pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations).map(Self)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Encrypt `plaintext`; the output carries the 16-byte tag at the end.
    pub fn seal(&self, plaintext: &[u8], iv: &Iv) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(iv.as_bytes()), plaintext)
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))
    }

    /// Decrypt and authenticate `ciphertext`.
    ///
    /// Every failure collapses to [`EnvelopeError::DecryptionFailed`].
    pub fn open(&self, ciphertext: &[u8], iv: &Iv) -> Result<Vec<u8>> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.0).map_err(|_| EnvelopeError::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(iv.as_bytes()), ciphertext)
            .map_err(|_| EnvelopeError::DecryptionFailed)
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration count keeps the unit tests fast; the real constant is
    // exercised by the envelope tests.
    const FAST: u32 = 1_000;

    #[test]
    fn test_seal_open_roundtrip() {
        let salt = Salt::generate();
        let iv = Iv::generate();
        let key = AesKey::derive_with_iterations("secret-123", &salt, FAST).unwrap();

        let ciphertext = key.seal(b"hello, sealed world", &iv).unwrap();
        assert_eq!(ciphertext.len(), b"hello, sealed world".len() + TAG_LEN);

        let plaintext = key.open(&ciphertext, &iv).unwrap();
        assert_eq!(plaintext, b"hello, sealed world");
    }

    #[test]
    fn test_wrong_password_fails() {
        let salt = Salt::generate();
        let iv = Iv::generate();
        let key = AesKey::derive_with_iterations("right", &salt, FAST).unwrap();
        let wrong = AesKey::derive_with_iterations("wrong", &salt, FAST).unwrap();

        let ciphertext = key.seal(b"secret", &iv).unwrap();
        assert!(matches!(
            wrong.open(&ciphertext, &iv),
            Err(EnvelopeError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails_as_decryption() {
        let key = AesKey::from_bytes([7u8; KEY_LEN]);
        let iv = Iv::from_bytes([1u8; IV_LEN]);
        assert!(matches!(
            key.open(&[0u8; 4], &iv),
            Err(EnvelopeError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_pbkdf2_is_deterministic() {
        let a = pbkdf2_sha256(b"pw", b"salt-salt-salt-1", FAST).unwrap();
        let b = pbkdf2_sha256(b"pw", b"salt-salt-salt-1", FAST).unwrap();
        let c = pbkdf2_sha256(b"pw", b"salt-salt-salt-2", FAST).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_pbkdf2_rfc7914_vector() {
        // PBKDF2-HMAC-SHA256, P="passwd", S="salt", c=1 (RFC 7914 section 11).
        let out = pbkdf2_sha256(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            &out[..8],
            &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn test_salt_from_slice_rejects_wrong_length() {
        assert!(Salt::from_slice(&[0u8; 15]).is_err());
        assert!(Iv::from_slice(&[0u8; 13]).is_err());
    }
}
