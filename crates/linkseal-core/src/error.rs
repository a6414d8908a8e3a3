//! Error types for linkseal core.

use thiserror::Error;

/// Errors raised by the envelope codec and the password primitives.
///
/// Envelope failures fall into two categories that callers surface
/// differently: a *format* problem (the envelope can never be read, retrying
/// with another password is pointless) and a *decryption* failure (wrong
/// password or corrupted ciphertext, which AES-GCM cannot tell apart).
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope is malformed: bad outer text, truncated buffer,
    /// unknown leading byte, missing JSON fields, corrupt compressed data.
    #[error("invalid envelope format: {0}")]
    Format(String),

    /// The envelope belongs to a generation this codec no longer reads.
    #[error("unsupported legacy envelope format (generation {0})")]
    RetiredGeneration(u8),

    /// AEAD authentication failed.
    #[error("decryption failed: wrong password or corrupted data")]
    DecryptionFailed,

    /// Encryption failed (should only happen on internal misuse).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// PBKDF2 rejected its parameters.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),
}

impl EnvelopeError {
    /// True for malformed, unsupported or retired envelopes.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::RetiredGeneration(_))
    }

    /// True when the AEAD tag did not verify.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::DecryptionFailed)
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
