//! ShareStore trait: the abstract interface for keyed share persistence.
//!
//! The workflow is storage-agnostic. Implementations include a KV-backed
//! store (production) and an in-memory store (fallback and tests).

use async_trait::async_trait;
use linkseal_core::EncryptedEnvelope;

use crate::error::Result;

/// A share as the store owns it.
///
/// `expires_at` is absolute wall-clock time in Unix milliseconds and is
/// authoritative; a backend's own TTL may be coarser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub key: String,
    pub envelope: EncryptedEnvelope,
    pub ttl_seconds: u64,
    pub expires_at: i64,
}

/// What `get` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredShare {
    pub envelope: EncryptedEnvelope,
    /// `None` when the backend could not report expiry metadata.
    pub expires_at: Option<i64>,
}

/// The ShareStore trait: async interface for keyed share persistence.
///
/// # Design Notes
///
/// - **Full replacement**: `put` on an existing key replaces the record; no merge.
/// - **Expiry**: records whose `expires_at` has passed are never returned.
/// - **No transactions**: `exists` followed by `put` may race; callers accept it.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Check whether a live record exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Store `envelope` under `key`, replacing any previous record.
    async fn put(
        &self,
        key: &str,
        envelope: &EncryptedEnvelope,
        ttl_seconds: u64,
        expires_at: i64,
    ) -> Result<()>;

    /// Fetch a live record.
    async fn get(&self, key: &str) -> Result<Option<StoredShare>>;

    /// Put a whole [`ShareRecord`].
    async fn put_record(&self, record: &ShareRecord) -> Result<()> {
        self.put(
            &record.key,
            &record.envelope,
            record.ttl_seconds,
            record.expires_at,
        )
        .await
    }
}
