//! # linkseal
//!
//! Password-sealed share links. A JSON document is encrypted under a
//! password, stored under a short random key with a TTL, and opened again
//! with the same key and password.
//!
//! ## Overview
//!
//! - **Create**: validate, compact, encrypt (current envelope generation),
//!   hash the password, pick a free key, store with TTL
//! - **Overwrite**: prove the current password opens the existing share,
//!   then replace it under the same key
//! - **Unlock**: optional local password-hash pre-check, fetch, decrypt any
//!   envelope generation, validate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkseal::{CreateShareRequest, ShareConfig, ShareService, UnlockRequest};
//! use linkseal::store::MemoryStore;
//!
//! async fn example() {
//!     let service = ShareService::new(Arc::new(MemoryStore::new()), ShareConfig::from_env());
//!
//!     let created = service
//!         .create(CreateShareRequest {
//!             plain_text: r#"{"title":"trip"}"#.into(),
//!             password: "secret-123".into(),
//!             ..Default::default()
//!         })
//!         .await
//!         .unwrap();
//!
//!     let unlocked = service
//!         .unlock(UnlockRequest {
//!             key: created.key,
//!             password: "secret-123".into(),
//!             subject: None,
//!         })
//!         .await
//!         .unwrap();
//!     assert_eq!(unlocked.plain_text, r#"{"title":"trip"}"#);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `linkseal::core` - envelope codec, password hashes, share keys
//! - `linkseal::store` - share stores and KV backends

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod rate_limit;
pub mod share;

pub use linkseal_core as core;
pub use linkseal_store as store;

pub use cache::{MemoryPasswordHashCache, PasswordHashCache};
pub use config::ShareConfig;
pub use document::{DocumentValidator, JsonObjectValidator};
pub use error::{Guidance, Result, ShareError};
pub use rate_limit::{rate_limit_subject, FixedWindowRateLimiter};
pub use share::{
    CreateShareRequest, CreatedShare, Overwrite, ShareService, UnlockRequest, UnlockedShare,
};

pub use linkseal_core::{EncryptedEnvelope, EnvelopeError, Generation, PasswordHashRecord};
pub use linkseal_store::{ShareStore, StoreError};
