//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use linkseal::{
    CreateShareRequest, CreatedShare, FixedWindowRateLimiter, MemoryPasswordHashCache,
    Overwrite, ShareConfig, ShareService, UnlockRequest, UnlockedShare,
};
use linkseal_core::KeyGenerator;
use linkseal_store::{
    KvEntry, KvNamespace, KvValue, ManualClock, MemoryStore, PutOptions, Result as StoreResult,
    StoreError, ValueKind,
};

/// Fixed start time for fixtures: 2023-11-14T22:13:20Z.
pub const FIXTURE_NOW: i64 = 1_700_000_000_000;

/// Hands out keys in order, then keeps repeating the last one.
#[derive(Debug)]
pub struct SequenceKeyGenerator {
    keys: Vec<String>,
    next: AtomicUsize,
}

impl SequenceKeyGenerator {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        assert!(!keys.is_empty(), "sequence needs at least one key");
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    /// How many keys have been handed out.
    pub fn generated(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl KeyGenerator for SequenceKeyGenerator {
    fn generate(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.keys[index.min(self.keys.len() - 1)].clone()
    }
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum KvCall {
    Get(String, ValueKind),
    GetWithMetadata(String, ValueKind),
    Put(String, PutOptions),
}

/// An in-memory KV namespace that behaves like a raw byte store.
///
/// Text reads of binary values are lossy and byte reads of text values
/// return their UTF-8, as with a real remote namespace. Every call is
/// recorded. Metadata support and put failures are switchable.
#[derive(Debug, Default)]
pub struct ScriptedKv {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<serde_json::Value>)>>,
    calls: Mutex<Vec<KvCall>>,
    metadata: bool,
    fail_puts: bool,
}

impl ScriptedKv {
    /// A namespace that reports metadata.
    pub fn new() -> Self {
        Self {
            metadata: true,
            ..Default::default()
        }
    }

    /// A namespace without `get_with_metadata`.
    pub fn without_metadata() -> Self {
        Self::default()
    }

    /// Every `put` fails.
    pub fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    /// Seed a raw value directly.
    pub fn insert_raw(&self, key: &str, raw: impl Into<Vec<u8>>, metadata: Option<serde_json::Value>) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (raw.into(), metadata));
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).map(|(raw, _)| raw.clone())
    }

    pub fn calls(&self) -> Vec<KvCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, KvCall::Put(..)))
            .count()
    }

    fn render(raw: &[u8], kind: ValueKind) -> KvValue {
        match kind {
            ValueKind::Bytes => KvValue::Bytes(Bytes::copy_from_slice(raw)),
            ValueKind::Text => KvValue::Text(String::from_utf8_lossy(raw).into_owned()),
        }
    }
}

#[async_trait]
impl KvNamespace for ScriptedKv {
    async fn get(&self, key: &str, kind: ValueKind) -> StoreResult<Option<KvValue>> {
        self.calls
            .lock()
            .unwrap()
            .push(KvCall::Get(key.to_string(), kind));
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).map(|(raw, _)| Self::render(raw, kind)))
    }

    async fn get_with_metadata(&self, key: &str, kind: ValueKind) -> StoreResult<Option<KvEntry>> {
        if !self.metadata {
            return Ok(None);
        }
        self.calls
            .lock()
            .unwrap()
            .push(KvCall::GetWithMetadata(key.to_string(), kind));
        let entries = self.entries.lock().unwrap();
        Ok(Some(match entries.get(key) {
            Some((raw, metadata)) => KvEntry {
                value: Some(Self::render(raw, kind)),
                metadata: metadata.clone(),
            },
            None => KvEntry::default(),
        }))
    }

    async fn put(&self, key: &str, value: KvValue, options: PutOptions) -> StoreResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(KvCall::Put(key.to_string(), options.clone()));
        if self.fail_puts {
            return Err(StoreError::Backend("scripted put failure".into()));
        }
        let raw = match value {
            KvValue::Bytes(bytes) => bytes.to_vec(),
            KvValue::Text(text) => text.into_bytes(),
        };
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (raw, options.metadata));
        Ok(())
    }
}

/// A share service over a memory store on a manual clock.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub keys: Arc<SequenceKeyGenerator>,
    pub cache: Arc<MemoryPasswordHashCache>,
    pub limiter: Arc<FixedWindowRateLimiter>,
    pub service: ShareService,
}

impl TestFixture {
    /// Default configuration, keys `fixture0001`, `fixture0002`, ...
    pub fn new() -> Self {
        let keys: Vec<String> = (1..=16).map(|n| format!("fixture{:04}", n)).collect();
        Self::with_config(ShareConfig::default(), keys)
    }

    pub fn with_keys(keys: &[&str]) -> Self {
        Self::with_config(ShareConfig::default(), keys.iter().copied())
    }

    pub fn with_config<I, S>(config: ShareConfig, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let clock = Arc::new(ManualClock::new(FIXTURE_NOW));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let keys = Arc::new(SequenceKeyGenerator::new(keys));
        let cache = Arc::new(MemoryPasswordHashCache::new());
        let limiter = Arc::new(FixedWindowRateLimiter::new());
        let service = ShareService::new(store.clone(), config)
            .with_clock(clock.clone())
            .with_key_generator(keys.clone())
            .with_rate_limiter(limiter.clone());
        Self {
            clock,
            store,
            keys,
            cache,
            limiter,
            service,
        }
    }

    /// Attach the fixture's password-hash cache to the service.
    pub fn with_password_cache(mut self) -> Self {
        self.service = self.service.with_password_cache(self.cache.clone());
        self
    }

    pub async fn create(&self, plain_text: &str, password: &str) -> linkseal::Result<CreatedShare> {
        self.service
            .create(CreateShareRequest {
                plain_text: plain_text.to_string(),
                password: password.to_string(),
                ..Default::default()
            })
            .await
    }

    pub async fn overwrite(
        &self,
        key: &str,
        current_password: &str,
        plain_text: &str,
        password: &str,
    ) -> linkseal::Result<CreatedShare> {
        self.service
            .create(CreateShareRequest {
                plain_text: plain_text.to_string(),
                password: password.to_string(),
                overwrite: Some(Overwrite {
                    key: key.to_string(),
                    current_password: Some(current_password.to_string()),
                }),
                subject: None,
            })
            .await
    }

    pub async fn unlock(&self, key: &str, password: &str) -> linkseal::Result<UnlockedShare> {
        self.service
            .unlock(UnlockRequest {
                key: key.to_string(),
                password: password.to_string(),
                subject: None,
            })
            .await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
