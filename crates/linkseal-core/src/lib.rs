//! # linkseal core
//!
//! Pure primitives for password-sealed share links: the versioned
//! encrypted envelope, password verification hashes and share keys.
//!
//! This crate performs no I/O. Everything here is computation over bytes.
//!
//! ## Key Types
//!
//! - [`EncryptedEnvelope`] - an encrypted payload in text or packed form
//! - [`Generation`] - one historical envelope wire format
//! - [`PasswordHashRecord`] - a non-decrypting password check
//! - [`KeyGenerator`] - source of share keys
//!
//! ## Usage
//!
//! ```rust
//! let text = linkseal_core::encrypt(r#"{"hello":"world"}"#, "secret-123").unwrap();
//! let plain = linkseal_core::decrypt(&text, "secret-123").unwrap();
//! assert_eq!(plain, r#"{"hello":"world"}"#);
//! ```

pub mod compression;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keygen;
pub mod passhash;
pub mod text;

pub use compression::Compression;
pub use crypto::{AesKey, Iv, Salt, IV_LEN, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN, TAG_LEN};
pub use envelope::{
    decoder_for, decrypt, decrypt_bytes, encrypt, encrypt_bytes, looks_like_packed, open,
    sniff_generation, EncryptedEnvelope, EnvelopeParts, Generation, TextEncoding,
    PACKED_HEADER_LEN,
};
pub use error::{EnvelopeError, Result};
pub use keygen::{
    generate_share_key, is_valid_password, is_valid_share_key, KeyGenerator, RandomKeyGenerator,
};
pub use passhash::{constant_time_eq, PasswordHashRecord};
