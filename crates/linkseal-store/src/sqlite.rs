//! SQLite implementation of the KvNamespace trait.
//!
//! Gives the KV-backed share store a durable local backend. Behaves like a
//! remote namespace: values come back as bytes or text, metadata is stored
//! as JSON next to the value, and TTL is whole seconds, rounded up so a row
//! never expires before `now + ttl`.
//! Blocking SQLite calls run under `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::kv::{KvEntry, KvNamespace, KvValue, PutOptions, ValueKind};
use crate::migration;

/// SQLite-based KV namespace.
pub struct SqliteKv {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteKv {
    /// Open a database at `path`, creating and migrating it as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, clock)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn open_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, clock)
    }

    fn from_connection(mut conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        migration::migrate(&mut conn, clock.now_millis())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    /// Remove expired rows. Reads already hide them; this reclaims space.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now_secs = self.now_secs();
        let conn = self.conn.clone();
        let removed = tokio::task::spawn_blocking(move || -> Result<usize> {
            let conn = conn.lock()?;
            Ok(conn.execute(
                "DELETE FROM kv_entries WHERE expires_at_secs IS NOT NULL AND expires_at_secs <= ?1",
                params![now_secs],
            )?)
        })
        .await??;
        info!(removed, "purged expired kv entries");
        Ok(removed)
    }

    fn now_secs(&self) -> i64 {
        self.clock.now_millis().div_euclid(1000)
    }

    /// Fetch the live row for `key`: (value, is_text, metadata).
    async fn fetch(&self, key: &str) -> Result<Option<(Vec<u8>, bool, Option<String>)>> {
        let key = key.to_string();
        let now_secs = self.now_secs();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<(Vec<u8>, bool, Option<String>)>> {
            let conn = conn.lock()?;
            let row = conn
                .query_row(
                    "SELECT value, is_text, metadata FROM kv_entries
                     WHERE key = ?1 AND (expires_at_secs IS NULL OR expires_at_secs > ?2)",
                    params![key, now_secs],
                    |row| {
                        Ok((
                            row.get::<_, Vec<u8>>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await?
    }
}

/// First whole second at or after `now_millis + ttl` seconds.
fn expiry_secs(now_millis: i64, ttl: u64) -> i64 {
    let ttl_millis = i64::try_from(ttl).unwrap_or(i64::MAX).saturating_mul(1000);
    let expires_at = now_millis.saturating_add(ttl_millis);
    expires_at.div_euclid(1000) + i64::from(expires_at.rem_euclid(1000) != 0)
}

fn render(raw: Vec<u8>, kind: ValueKind) -> KvValue {
    match kind {
        ValueKind::Bytes => KvValue::Bytes(Bytes::from(raw)),
        ValueKind::Text => KvValue::Text(match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }),
    }
}

#[async_trait]
impl KvNamespace for SqliteKv {
    async fn get(&self, key: &str, kind: ValueKind) -> Result<Option<KvValue>> {
        Ok(self
            .fetch(key)
            .await?
            .map(|(raw, _is_text, _)| render(raw, kind)))
    }

    async fn get_with_metadata(&self, key: &str, kind: ValueKind) -> Result<Option<KvEntry>> {
        let entry = match self.fetch(key).await? {
            None => KvEntry::default(),
            Some((raw, _is_text, metadata)) => {
                let metadata = match metadata {
                    Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                        StoreError::InvalidData(format!("metadata for {}: {}", key, e))
                    })?),
                    None => None,
                };
                KvEntry {
                    value: Some(render(raw, kind)),
                    metadata,
                }
            }
        };
        Ok(Some(entry))
    }

    async fn put(&self, key: &str, value: KvValue, options: PutOptions) -> Result<()> {
        let (raw, is_text) = match value {
            KvValue::Bytes(bytes) => (bytes.to_vec(), false),
            KvValue::Text(text) => (text.into_bytes(), true),
        };
        let metadata = options
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let now_millis = self.clock.now_millis();
        let expires_at_secs = options
            .expiration_ttl
            .map(|ttl| expiry_secs(now_millis, ttl));

        let key = key.to_string();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.lock()?;
            conn.execute(
                "INSERT INTO kv_entries (key, value, is_text, metadata, expires_at_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    is_text = excluded.is_text,
                    metadata = excluded.metadata,
                    expires_at_secs = excluded.expires_at_secs",
                params![key, raw, is_text, metadata, expires_at_secs],
            )?;
            Ok(())
        })
        .await?
    }
}
