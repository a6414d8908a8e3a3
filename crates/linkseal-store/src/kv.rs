//! KV-backed implementation of the ShareStore trait.
//!
//! A [`KvNamespace`] is a remote key-value namespace that can hand a value
//! back either as bytes or as text, optionally together with per-key
//! metadata, and that expires keys on its own (coarse) TTL.
//!
//! Shares are written as packed binary envelopes today, but older shares
//! were written as text. Reading therefore tries twice: fetch as bytes first, and
//! if the bytes do not look like a packed envelope, re-fetch as text so a
//! legacy text envelope is not corrupted by a bytes-to-text round trip.
//! `expiresAt` travels in metadata because the backend's own TTL rounds;
//! a share whose `expiresAt` has passed is not served even if the backend
//! still holds it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use linkseal_core::{looks_like_packed, EncryptedEnvelope};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

use crate::error::Result;
use crate::traits::{ShareStore, StoredShare};

/// How a value should be returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bytes,
    Text,
}

/// A value as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    Bytes(Bytes),
    Text(String),
}

/// A value together with its metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KvEntry {
    /// `None` when the key is absent or expired.
    pub value: Option<KvValue>,
    pub metadata: Option<serde_json::Value>,
}

/// Options for [`KvNamespace::put`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PutOptions {
    /// Backend-native TTL in seconds.
    pub expiration_ttl: Option<u64>,
    pub metadata: Option<serde_json::Value>,
}

/// A remote key-value namespace.
#[async_trait]
pub trait KvNamespace: Send + Sync {
    /// Fetch a value in the requested form.
    async fn get(&self, key: &str, kind: ValueKind) -> Result<Option<KvValue>>;

    /// Fetch a value with its metadata.
    ///
    /// Returns `Ok(None)` when the backend has no metadata support; a missing
    /// key is `Ok(Some(entry))` with `entry.value == None`.
    async fn get_with_metadata(&self, _key: &str, _kind: ValueKind) -> Result<Option<KvEntry>> {
        Ok(None)
    }

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: KvValue, options: PutOptions) -> Result<()>;
}

/// Metadata written next to every share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMetadata {
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

impl ShareMetadata {
    pub fn to_value(self) -> serde_json::Value {
        serde_json::json!({ "expiresAt": self.expires_at })
    }

    /// Read `expiresAt` from arbitrary metadata, ignoring anything malformed.
    pub fn expires_at_from(metadata: Option<&serde_json::Value>) -> Option<i64> {
        metadata?.get("expiresAt")?.as_i64()
    }
}

/// KV-backed share store.
pub struct KvShareStore {
    kv: Arc<dyn KvNamespace>,
    clock: Arc<dyn Clock>,
}

impl KvShareStore {
    pub fn new(kv: Arc<dyn KvNamespace>) -> Self {
        Self {
            kv,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` to judge `expiresAt`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn is_live(&self, key: &str, share: &StoredShare) -> bool {
        match share.expires_at {
            Some(expires_at) if self.clock.now_millis() >= expires_at => {
                debug!(key, expires_at, "kv share is past expiresAt");
                false
            }
            _ => true,
        }
    }

    /// Lookup path when the backend reports metadata.
    async fn get_with_metadata(&self, key: &str, bytes_entry: KvEntry) -> Result<Option<StoredShare>> {
        let bytes = match bytes_entry.value {
            None => return Ok(None),
            Some(KvValue::Bytes(bytes)) => bytes,
            Some(KvValue::Text(text)) => {
                return Ok(Some(StoredShare {
                    envelope: EncryptedEnvelope::Text(text),
                    expires_at: ShareMetadata::expires_at_from(bytes_entry.metadata.as_ref()),
                }))
            }
        };

        if looks_like_packed(&bytes) {
            return Ok(Some(StoredShare {
                envelope: EncryptedEnvelope::Binary(bytes),
                expires_at: ShareMetadata::expires_at_from(bytes_entry.metadata.as_ref()),
            }));
        }

        debug!(key, "stored value is not packed, re-reading as text");
        let text_entry = self
            .kv
            .get_with_metadata(key, ValueKind::Text)
            .await?
            .unwrap_or_default();
        match text_entry.value {
            Some(KvValue::Text(text)) if !text.is_empty() => Ok(Some(StoredShare {
                envelope: EncryptedEnvelope::Text(text),
                expires_at: ShareMetadata::expires_at_from(text_entry.metadata.as_ref()),
            })),
            _ => Ok(None),
        }
    }

    /// Lookup path for backends without metadata; expiry is unknown.
    async fn get_plain(&self, key: &str) -> Result<Option<StoredShare>> {
        if let Some(KvValue::Bytes(bytes)) = self.kv.get(key, ValueKind::Bytes).await? {
            if looks_like_packed(&bytes) {
                return Ok(Some(StoredShare {
                    envelope: EncryptedEnvelope::Binary(bytes),
                    expires_at: None,
                }));
            }
        }

        match self.kv.get(key, ValueKind::Text).await? {
            Some(KvValue::Text(text)) if !text.is_empty() => Ok(Some(StoredShare {
                envelope: EncryptedEnvelope::Text(text),
                expires_at: None,
            })),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ShareStore for KvShareStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        if self.kv.get(key, ValueKind::Bytes).await?.is_some() {
            return Ok(true);
        }
        Ok(self.kv.get(key, ValueKind::Text).await?.is_some())
    }

    async fn put(
        &self,
        key: &str,
        envelope: &EncryptedEnvelope,
        ttl_seconds: u64,
        expires_at: i64,
    ) -> Result<()> {
        let value = match envelope {
            EncryptedEnvelope::Text(text) => KvValue::Text(text.clone()),
            EncryptedEnvelope::Binary(bytes) => KvValue::Bytes(bytes.clone()),
        };
        self.kv
            .put(
                key,
                value,
                PutOptions {
                    expiration_ttl: Some(ttl_seconds),
                    metadata: Some(ShareMetadata { expires_at }.to_value()),
                },
            )
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredShare>> {
        let share = match self.kv.get_with_metadata(key, ValueKind::Bytes).await? {
            Some(entry) => self.get_with_metadata(key, entry).await?,
            None => self.get_plain(key).await?,
        };
        Ok(share.filter(|share| self.is_live(key, share)))
    }
}
