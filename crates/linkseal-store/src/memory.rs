//! In-memory implementation of the ShareStore trait.
//!
//! Used when no KV binding resolves and in tests. Records carry an absolute
//! expiry and are deleted lazily: a read that finds an expired record
//! removes it. There is no background sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use linkseal_core::EncryptedEnvelope;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::traits::{ShareRecord, ShareStore, StoredShare};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    records: RwLock<HashMap<String, ShareRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a new empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of records held, including expired ones not yet purged.
    pub fn len(&self) -> Result<usize> {
        Ok(self.records.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every record.
    pub fn clear(&self) -> Result<()> {
        self.records.write()?.clear();
        Ok(())
    }

    /// Return the live record for `key`, purging it if expired.
    fn live_record(&self, key: &str) -> Result<Option<ShareRecord>> {
        let now = self.clock.now_millis();
        {
            let records = self.records.read()?;
            match records.get(key) {
                None => return Ok(None),
                Some(record) if now < record.expires_at => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        let mut records = self.records.write()?;
        // Re-check under the write lock; a concurrent put may have refreshed it.
        match records.get(key) {
            Some(record) if now < record.expires_at => Ok(Some(record.clone())),
            Some(_) => {
                records.remove(key);
                info!(key, "purged expired share");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_record(key)?.is_some())
    }

    async fn put(
        &self,
        key: &str,
        envelope: &EncryptedEnvelope,
        ttl_seconds: u64,
        expires_at: i64,
    ) -> Result<()> {
        let record = ShareRecord {
            key: key.to_string(),
            envelope: envelope.clone(),
            ttl_seconds,
            expires_at,
        };
        self.records.write()?.insert(key.to_string(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredShare>> {
        Ok(self.live_record(key)?.map(|record| StoredShare {
            envelope: record.envelope,
            expires_at: Some(record.expires_at),
        }))
    }
}
