//! KV-backed share storage: byte and text reads, the SQLite backend and binding resolution.

use std::sync::Arc;

use linkseal::store::{
    resolve_share_store, BindingChain, BindingSource, KvNamespace, KvShareStore, ManualClock,
    MemoryStore, ShareStore, SqliteKv, ValueKind,
};
use linkseal::{ShareConfig, ShareError, ShareService, UnlockRequest, UnlockedShare};
use linkseal_core::{EncryptedEnvelope, Generation};
use linkseal_testkit::{KvCall, LegacyEnvelope, ScriptedKv, SequenceKeyGenerator, FIXTURE_NOW};

const DOC: &str = r#"{"title":"Nara"}"#;

#[tokio::test]
async fn legacy_text_is_reread_as_text() {
    let kv = Arc::new(ScriptedKv::new());
    let text = LegacyEnvelope::new(Generation::V5, DOC, "secret-123").text();
    kv.insert_raw(
        "legacytx1",
        text.clone().into_bytes(),
        Some(serde_json::json!({ "expiresAt": FIXTURE_NOW + 60_000 })),
    );

    let store = KvShareStore::new(kv.clone()).with_clock(Arc::new(ManualClock::new(FIXTURE_NOW)));
    let stored = store.get("legacytx1").await.unwrap().unwrap();
    assert_eq!(stored.envelope, EncryptedEnvelope::Text(text));
    assert_eq!(stored.expires_at, Some(FIXTURE_NOW + 60_000));
    assert_eq!(
        kv.calls(),
        vec![
            KvCall::GetWithMetadata("legacytx1".into(), ValueKind::Bytes),
            KvCall::GetWithMetadata("legacytx1".into(), ValueKind::Text),
        ]
    );
}

#[tokio::test]
async fn binary_envelope_is_read_once() {
    let kv = Arc::new(ScriptedKv::new());
    let raw = LegacyEnvelope::new(Generation::V6, DOC, "secret-123").raw();
    kv.insert_raw("binary001", raw.clone(), None);

    let store = KvShareStore::new(kv.clone());
    let stored = store.get("binary001").await.unwrap().unwrap();
    assert_eq!(stored.envelope, EncryptedEnvelope::from(raw));
    assert_eq!(stored.expires_at, None);
    assert_eq!(kv.calls().len(), 1);
}

#[tokio::test]
async fn backend_without_metadata_still_serves_shares() {
    let kv = Arc::new(ScriptedKv::without_metadata());
    let service = ShareService::new(Arc::new(KvShareStore::new(kv.clone())), ShareConfig::default())
        .with_key_generator(Arc::new(SequenceKeyGenerator::new(["nometa001"])));
    service
        .create(linkseal::CreateShareRequest {
            plain_text: DOC.into(),
            password: "secret-123".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let unlocked = service
        .unlock(UnlockRequest {
            key: "nometa001".into(),
            password: "secret-123".into(),
            subject: None,
        })
        .await
        .unwrap();
    assert_eq!(unlocked.plain_text, DOC);
    assert_eq!(unlocked.expires_at, None);
    assert!(kv
        .calls()
        .iter()
        .all(|c| !matches!(c, KvCall::GetWithMetadata(..))));
}

#[tokio::test]
async fn put_carries_ttl_and_expiry_metadata() {
    let kv = Arc::new(ScriptedKv::new());
    let store = KvShareStore::new(kv.clone());
    let envelope = EncryptedEnvelope::from(LegacyEnvelope::new(Generation::V6, DOC, "pw-1234").raw());
    store.put("putmeta01", &envelope, 600, 123_456_789).await.unwrap();

    let calls = kv.calls();
    let KvCall::Put(key, options) = &calls[0] else {
        panic!("expected a put, got {:?}", calls);
    };
    assert_eq!(key, "putmeta01");
    assert_eq!(options.expiration_ttl, Some(600));
    assert_eq!(
        options.metadata,
        Some(serde_json::json!({ "expiresAt": 123_456_789 }))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite backend
// ─────────────────────────────────────────────────────────────────────────────

async fn unlock_sqlite_share(service: &ShareService) -> linkseal::Result<UnlockedShare> {
    service
        .unlock(UnlockRequest {
            key: "sqlite001".into(),
            password: "secret-123".into(),
            subject: None,
        })
        .await
}

#[tokio::test]
async fn sqlite_backend_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(FIXTURE_NOW));
    let kv = Arc::new(SqliteKv::open_with_clock(dir.path().join("shares.db"), clock.clone()).unwrap());

    let config = ShareConfig {
        share_ttl_seconds: 60,
        ..Default::default()
    };
    let store = KvShareStore::new(kv.clone()).with_clock(clock.clone());
    let service = ShareService::new(Arc::new(store), config)
        .with_clock(clock.clone())
        .with_key_generator(Arc::new(SequenceKeyGenerator::new(["sqlite001"])));

    let created = service
        .create(linkseal::CreateShareRequest {
            plain_text: DOC.into(),
            password: "secret-123".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.expires_at, FIXTURE_NOW + 60_000);

    let unlocked = unlock_sqlite_share(&service).await.unwrap();
    assert_eq!(unlocked.plain_text, DOC);
    assert_eq!(unlocked.expires_at, Some(created.expires_at));

    // Native TTL is whole seconds from the write time.
    clock.set(FIXTURE_NOW + 60_000);
    assert!(matches!(
        unlock_sqlite_share(&service).await,
        Err(ShareError::NotFound(_))
    ));
}

#[tokio::test]
async fn sqlite_share_lives_until_its_expires_at() {
    // Written half a second past a whole second.
    let clock = Arc::new(ManualClock::new(FIXTURE_NOW + 500));
    let kv = Arc::new(SqliteKv::open_memory_with_clock(clock.clone()).unwrap());
    let store = KvShareStore::new(kv.clone()).with_clock(clock.clone());
    let envelope = EncryptedEnvelope::from(LegacyEnvelope::new(Generation::V6, DOC, "secret-123").raw());
    store
        .put("sqlttl001", &envelope, 1, FIXTURE_NOW + 1_500)
        .await
        .unwrap();

    clock.set(FIXTURE_NOW + 1_499);
    let stored = store.get("sqlttl001").await.unwrap().expect("live until expiresAt");
    assert_eq!(stored.envelope, envelope);
    assert_eq!(stored.expires_at, Some(FIXTURE_NOW + 1_500));

    clock.set(FIXTURE_NOW + 1_500);
    assert!(store.get("sqlttl001").await.unwrap().is_none());
    // The row outlives expiresAt until the next whole second.
    assert!(kv.get("sqlttl001", ValueKind::Bytes).await.unwrap().is_some());
    clock.set(FIXTURE_NOW + 2_000);
    assert!(kv.get("sqlttl001", ValueKind::Bytes).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_backend_keeps_text_envelopes_intact() {
    let kv = Arc::new(SqliteKv::open_memory().unwrap());
    let store = KvShareStore::new(kv.clone());
    let text = LegacyEnvelope::new(Generation::V6, DOC, "secret-123").text();
    store
        .put("sqltext01", &EncryptedEnvelope::Text(text.clone()), 60, i64::MAX)
        .await
        .unwrap();

    let stored = store.get("sqltext01").await.unwrap().unwrap();
    assert_eq!(stored.envelope, EncryptedEnvelope::Text(text));
    assert!(kv.get("sqltext01", ValueKind::Bytes).await.unwrap().is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Binding resolution
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_binding_beats_environment_binding() {
    let request_kv = Arc::new(ScriptedKv::new());
    let env_kv = Arc::new(ScriptedKv::new());
    let chain = BindingChain::new()
        .with_binding(BindingSource::Environment, env_kv.clone())
        .with_binding(BindingSource::Request, request_kv.clone());

    let store = resolve_share_store(&chain, Arc::new(MemoryStore::new()));
    let envelope = EncryptedEnvelope::Text("eyJ2IjozfQ".into());
    store.put("bindkey01", &envelope, 60, i64::MAX).await.unwrap();

    assert!(request_kv.raw("bindkey01").is_some());
    assert!(env_kv.raw("bindkey01").is_none());
}

#[tokio::test]
async fn unresolved_chain_falls_back_to_memory() {
    let chain = BindingChain::new()
        .with_provider(BindingSource::Request, || None)
        .with_provider(BindingSource::Environment, || None)
        .with_provider(BindingSource::Global, || None)
        .with_provider(BindingSource::Platform, || None);
    let fallback = Arc::new(MemoryStore::new());
    let store = resolve_share_store(&chain, fallback.clone());

    let envelope = EncryptedEnvelope::Text("eyJ2IjozfQ".into());
    store.put("fallback1", &envelope, 60, i64::MAX).await.unwrap();
    assert_eq!(fallback.len().unwrap(), 1);
}

#[tokio::test]
async fn platform_provider_is_consulted_last() {
    let platform: Arc<dyn KvNamespace> = Arc::new(ScriptedKv::new());
    let chain = BindingChain::new()
        .with_binding(BindingSource::Platform, platform)
        .with_provider(BindingSource::Global, || None);
    let (source, _) = chain.resolve().unwrap();
    assert_eq!(source, BindingSource::Platform);
}
