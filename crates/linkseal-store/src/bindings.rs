//! Binding resolution for the KV-backed store.
//!
//! A deployment may expose the KV namespace from several places. The chain
//! holds one provider per place, tried in a fixed order; the first provider
//! that yields a namespace wins. When none does, the caller's in-memory
//! store is used instead. That fallback is a deployment condition, not an
//! error.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::kv::{KvNamespace, KvShareStore};
use crate::memory::MemoryStore;
use crate::traits::ShareStore;

/// Where a binding came from, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingSource {
    /// Bound to the current request.
    Request,
    /// Bound in the worker environment.
    Environment,
    /// Set as a process-wide global.
    Global,
    /// Provided by the hosting platform's environment object.
    Platform,
}

impl BindingSource {
    pub const ALL: [BindingSource; 4] = [
        BindingSource::Request,
        BindingSource::Environment,
        BindingSource::Global,
        BindingSource::Platform,
    ];
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingSource::Request => "request",
            BindingSource::Environment => "environment",
            BindingSource::Global => "global",
            BindingSource::Platform => "platform",
        };
        f.write_str(name)
    }
}

/// A provider returns the namespace it can see, if any.
pub type BindingProvider = Box<dyn Fn() -> Option<Arc<dyn KvNamespace>> + Send + Sync>;

/// Ordered list of binding providers.
#[derive(Default)]
pub struct BindingChain {
    providers: Vec<(BindingSource, BindingProvider)>,
}

impl BindingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for `source`.
    ///
    /// Providers are kept sorted by source so the request binding is always
    /// consulted before the platform one, whatever the registration order.
    /// Providers for the same source run in registration order.
    pub fn with_provider<F>(mut self, source: BindingSource, provider: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn KvNamespace>> + Send + Sync + 'static,
    {
        let at = self
            .providers
            .iter()
            .position(|(existing, _)| *existing > source)
            .unwrap_or(self.providers.len());
        self.providers.insert(at, (source, Box::new(provider)));
        self
    }

    /// Register a fixed namespace for `source`.
    pub fn with_binding(self, source: BindingSource, kv: Arc<dyn KvNamespace>) -> Self {
        self.with_provider(source, move || Some(kv.clone()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First namespace any provider yields, with where it came from.
    pub fn resolve(&self) -> Option<(BindingSource, Arc<dyn KvNamespace>)> {
        self.providers
            .iter()
            .find_map(|(source, provider)| provider().map(|kv| (*source, kv)))
    }
}

impl fmt::Debug for BindingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingChain")
            .field(
                "sources",
                &self.providers.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Pick the share store for this request.
pub fn resolve_share_store(chain: &BindingChain, fallback: Arc<MemoryStore>) -> Arc<dyn ShareStore> {
    match chain.resolve() {
        Some((source, kv)) => {
            debug!(%source, "using kv binding");
            Arc::new(KvShareStore::new(kv))
        }
        None => {
            debug!("no kv binding resolved, using in-memory store");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::kv::{KvValue, PutOptions, ValueKind};
    use async_trait::async_trait;
    use linkseal_core::EncryptedEnvelope;

    /// A namespace that answers every read with its own name.
    struct NamedKv(&'static str);

    #[async_trait]
    impl KvNamespace for NamedKv {
        async fn get(&self, _key: &str, _kind: ValueKind) -> Result<Option<KvValue>> {
            Ok(Some(KvValue::Text(self.0.to_string())))
        }

        async fn put(&self, _key: &str, _value: KvValue, _options: PutOptions) -> Result<()> {
            Ok(())
        }
    }

    fn named(name: &'static str) -> Arc<dyn KvNamespace> {
        Arc::new(NamedKv(name))
    }

    #[test]
    fn test_empty_chain_resolves_nothing() {
        assert!(BindingChain::new().resolve().is_none());
    }

    #[test]
    fn test_order_is_by_source() {
        let chain = BindingChain::new()
            .with_binding(BindingSource::Platform, named("platform"))
            .with_binding(BindingSource::Global, named("global"))
            .with_binding(BindingSource::Environment, named("env"));
        let (source, _) = chain.resolve().unwrap();
        assert_eq!(source, BindingSource::Environment);
    }

    #[test]
    fn test_empty_providers_fall_through() {
        let chain = BindingChain::new()
            .with_provider(BindingSource::Request, || None)
            .with_provider(BindingSource::Environment, || None)
            .with_binding(BindingSource::Platform, named("platform"));
        assert_eq!(chain.len(), 3);
        let (source, _) = chain.resolve().unwrap();
        assert_eq!(source, BindingSource::Platform);
    }

    #[tokio::test]
    async fn test_resolve_share_store_uses_kv() {
        let chain = BindingChain::new().with_binding(BindingSource::Global, named("abc"));
        let fallback = Arc::new(MemoryStore::new());
        let store = resolve_share_store(&chain, fallback.clone());

        let got = store.get("anything").await.unwrap().unwrap();
        assert_eq!(got.envelope, EncryptedEnvelope::Text("abc".into()));
        assert!(fallback.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_share_store_falls_back() {
        let chain = BindingChain::new().with_provider(BindingSource::Request, || None);
        let fallback = Arc::new(MemoryStore::new());
        let store = resolve_share_store(&chain, fallback.clone());

        let envelope = EncryptedEnvelope::Text("eyJ2IjozfQ".into());
        store
            .put("fallbk01", &envelope, 60, i64::MAX)
            .await
            .unwrap();
        assert_eq!(fallback.len().unwrap(), 1);
    }
}
