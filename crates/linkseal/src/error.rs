//! Error types for share link operations.

use linkseal_core::EnvelopeError;
use linkseal_store::StoreError;
use thiserror::Error;

/// Errors that can occur while creating or unlocking a share.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Envelope codec error (format problem or wrong password).
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The current password does not open the share being overwritten.
    #[error("current password does not unlock share {key}")]
    Authorization { key: String },

    /// Every generated key collided with an existing share.
    #[error("could not find a free share key after {attempts} attempts")]
    KeySpaceExhausted { attempts: u32 },

    /// No live share under this key.
    #[error("share not found: {0}")]
    NotFound(String),

    /// The password does not match the locally saved password hash.
    #[error("password does not match the saved password for this share")]
    PasswordMismatch,

    /// The document failed parsing or validation.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Malformed request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Plaintext exceeds the configured size limit.
    #[error("plaintext is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Share creation is switched off.
    #[error("share creation is disabled")]
    CreationDisabled,

    /// A rate limit window is exhausted.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// A blocking task could not be joined.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ShareError {
    fn from(e: tokio::task::JoinError) -> Self {
        ShareError::Task(e.to_string())
    }
}

/// What the user should be told to do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// The link is broken or gone; ask for a new one.
    RecreateLink,
    /// The password is wrong.
    CheckPassword,
    /// Fix the input and resubmit.
    FixInput,
    /// Transient; try again later.
    Retry,
    /// Nothing the user can do.
    Unavailable,
}

impl ShareError {
    pub fn guidance(&self) -> Guidance {
        match self {
            ShareError::Envelope(e) if e.is_decryption_failure() => Guidance::CheckPassword,
            ShareError::Envelope(_) => Guidance::RecreateLink,
            ShareError::NotFound(_) => Guidance::RecreateLink,
            ShareError::Authorization { .. } | ShareError::PasswordMismatch => {
                Guidance::CheckPassword
            }
            ShareError::InvalidDocument(_)
            | ShareError::InvalidRequest(_)
            | ShareError::PayloadTooLarge { .. } => Guidance::FixInput,
            ShareError::KeySpaceExhausted { .. }
            | ShareError::RateLimited(_)
            | ShareError::Store(_)
            | ShareError::Task(_) => Guidance::Retry,
            ShareError::CreationDisabled => Guidance::Unavailable,
        }
    }
}

/// Result type for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;
