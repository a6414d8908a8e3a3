//! The share service: create, overwrite and unlock password-sealed shares.
//!
//! Brings the envelope codec, password hashes, key generation and a share
//! store together. The store, clock, key source, document validator,
//! password-hash cache and rate limiter are all injected.

use std::sync::Arc;

use linkseal_core::{
    encrypt_bytes, is_valid_password, is_valid_share_key, open, passhash, EncryptedEnvelope,
    KeyGenerator, PasswordHashRecord, RandomKeyGenerator,
};
use linkseal_store::{Clock, ShareStore, SystemClock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::PasswordHashCache;
use crate::config::ShareConfig;
use crate::document::{compact, parse_document, DocumentValidator, JsonObjectValidator};
use crate::error::{Result, ShareError};
use crate::rate_limit::{FixedWindowRateLimiter, DAY_WINDOW_MS, MINUTE_WINDOW_MS};

/// Replace the share under an existing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    pub key: String,
    /// Password currently sealing `key`. Required.
    pub current_password: Option<String>,
}

/// Input to [`ShareService::create`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateShareRequest {
    pub plain_text: String,
    pub password: String,
    pub overwrite: Option<Overwrite>,
    /// Caller identity for rate limiting.
    pub subject: Option<String>,
}

/// Result of a successful create, serialized as the API response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedShare {
    pub key: String,
    /// For the client's password-hash cache.
    pub passhash: PasswordHashRecord,
    /// Unix ms.
    pub expires_at: i64,
    /// Key candidates tried; 0 for an overwrite.
    #[serde(skip)]
    pub attempts: u32,
    #[serde(skip)]
    pub overwritten: bool,
}

/// Input to [`ShareService::unlock`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnlockRequest {
    pub key: String,
    pub password: String,
    pub subject: Option<String>,
}

/// Result of a successful unlock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedShare {
    pub key: String,
    /// Compact JSON.
    pub plain_text: String,
    #[serde(skip)]
    pub document: Value,
    /// `None` when the store could not report expiry.
    pub expires_at: Option<i64>,
}

/// The share service.
pub struct ShareService {
    store: Arc<dyn ShareStore>,
    config: ShareConfig,
    clock: Arc<dyn Clock>,
    keys: Arc<dyn KeyGenerator>,
    validator: Arc<dyn DocumentValidator>,
    cache: Option<Arc<dyn PasswordHashCache>>,
    limiter: Option<Arc<FixedWindowRateLimiter>>,
}

impl ShareService {
    /// Create a service with random keys, the system clock, a JSON object
    /// validator, no password-hash cache and no rate limiting.
    pub fn new(store: Arc<dyn ShareStore>, config: ShareConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            keys: Arc::new(RandomKeyGenerator),
            validator: Arc::new(JsonObjectValidator),
            cache: None,
            limiter: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_key_generator(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_password_cache(mut self, cache: Arc<dyn PasswordHashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<FixedWindowRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn config(&self) -> &ShareConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ShareStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Create
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal a document and store it under a new key, or under an existing
    /// key when `overwrite` is set and its current password checks out.
    ///
    /// An overwrite that fails authorization writes nothing.
    pub async fn create(&self, request: CreateShareRequest) -> Result<CreatedShare> {
        let CreateShareRequest {
            plain_text,
            password,
            overwrite,
            subject,
        } = request;

        if plain_text.is_empty() || password.is_empty() {
            return Err(ShareError::InvalidRequest(
                "plain text and password are required".into(),
            ));
        }
        let overwrite = match overwrite {
            Some(Overwrite {
                key,
                current_password: Some(current),
            }) if !current.is_empty() => Some((key, current)),
            Some(_) => {
                return Err(ShareError::InvalidRequest(
                    "overwriting a share requires its current password".into(),
                ))
            }
            None => None,
        };
        if !is_valid_password(&password) {
            return Err(ShareError::InvalidRequest("password is too short".into()));
        }
        if let Some((key, _)) = &overwrite {
            if !is_valid_share_key(key) {
                return Err(ShareError::InvalidRequest("malformed share key".into()));
            }
        }

        if self.config.disable_share_create {
            return Err(ShareError::CreationDisabled);
        }
        if plain_text.len() > self.config.max_plaintext_bytes {
            return Err(ShareError::PayloadTooLarge {
                size: plain_text.len(),
                limit: self.config.max_plaintext_bytes,
            });
        }
        if let Some(subject) = &subject {
            self.check_create_rate(subject)?;
        }

        let document = parse_document(&plain_text, self.validator.as_ref())?;
        let compact_text = compact(&document)?;

        if let Some((key, current)) = &overwrite {
            self.authorize_overwrite(key, current).await?;
        }

        let (envelope, passhash) = tokio::task::spawn_blocking(move || {
            let envelope = encrypt_bytes(&compact_text, &password)?;
            let passhash = passhash::create(&password)?;
            Ok::<_, ShareError>((EncryptedEnvelope::from(envelope), passhash))
        })
        .await??;

        let (key, attempts) = match &overwrite {
            Some((key, _)) => (key.clone(), 0),
            None => self.pick_free_key().await?,
        };

        let ttl_seconds = self.config.share_ttl_seconds;
        let ttl_ms = i64::try_from(ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_millis().saturating_add(ttl_ms);
        self.store
            .put(&key, &envelope, ttl_seconds, expires_at)
            .await?;

        if let Some(cache) = &self.cache {
            cache.save(&key, &passhash);
        }

        let overwritten = overwrite.is_some();
        if overwritten {
            info!(key = %key, expires_at, "overwrote share");
        } else {
            info!(key = %key, attempts, expires_at, "created share");
        }

        Ok(CreatedShare {
            key,
            passhash,
            expires_at,
            attempts,
            overwritten,
        })
    }

    fn check_create_rate(&self, subject: &str) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        let now = self.clock.now_millis();
        if !limiter.consume(
            &format!("create:min:{}", subject),
            self.config.rate_limit_create_per_min,
            MINUTE_WINDOW_MS,
            now,
        ) {
            return Err(ShareError::RateLimited("too many creates this minute".into()));
        }
        if !limiter.consume(
            &format!("create:day:{}", subject),
            self.config.rate_limit_create_per_day,
            DAY_WINDOW_MS,
            now,
        ) {
            return Err(ShareError::RateLimited("daily create limit reached".into()));
        }
        Ok(())
    }

    /// The current password must open the existing share.
    async fn authorize_overwrite(&self, key: &str, current_password: &str) -> Result<()> {
        let Some(existing) = self.store.get(key).await? else {
            warn!(key, "overwrite refused: no share under key");
            return Err(ShareError::Authorization { key: key.to_string() });
        };

        let current_password = current_password.to_string();
        let opened =
            tokio::task::spawn_blocking(move || open(&existing.envelope, &current_password))
                .await?;

        match opened {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(key, error = %e, "overwrite refused: current password does not open share");
                Err(ShareError::Authorization { key: key.to_string() })
            }
        }
    }

    /// Try generated keys until one is unused.
    async fn pick_free_key(&self) -> Result<(String, u32)> {
        let max_attempts = self.config.max_key_generation_attempts;
        for attempt in 1..=max_attempts {
            let candidate = self.keys.generate();
            if !self.store.exists(&candidate).await? {
                return Ok((candidate, attempt));
            }
            debug!(key = %candidate, attempt, "generated key collides with existing share");
        }
        warn!(attempts = max_attempts, "share key space exhausted");
        Err(ShareError::KeySpaceExhausted {
            attempts: max_attempts,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unlock
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the share under `key` with `password`.
    pub async fn unlock(&self, request: UnlockRequest) -> Result<UnlockedShare> {
        let UnlockRequest {
            key,
            password,
            subject,
        } = request;

        if !is_valid_share_key(&key) {
            return Err(ShareError::InvalidRequest("malformed share key".into()));
        }
        if password.is_empty() {
            return Err(ShareError::InvalidRequest("password is required".into()));
        }
        if let (Some(limiter), Some(subject)) = (&self.limiter, &subject) {
            if !limiter.consume(
                &format!("read:min:{}", subject),
                self.config.rate_limit_read_per_min,
                MINUTE_WINDOW_MS,
                self.clock.now_millis(),
            ) {
                return Err(ShareError::RateLimited("too many reads this minute".into()));
            }
        }

        if let Some(record) = self.cache.as_ref().and_then(|cache| cache.load(&key)) {
            let candidate = password.clone();
            let matches =
                tokio::task::spawn_blocking(move || passhash::verify(&candidate, &record)).await?;
            if !matches {
                warn!(key = %key, "password does not match saved password hash");
                return Err(ShareError::PasswordMismatch);
            }
        }

        let stored = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| ShareError::NotFound(key.clone()))?;

        let envelope = stored.envelope;
        let plain = tokio::task::spawn_blocking(move || open(&envelope, &password)).await??;

        let document = parse_document(&plain, self.validator.as_ref())?;
        let plain_text = compact(&document)?;
        debug!(key = %key, "unlocked share");

        Ok(UnlockedShare {
            key,
            plain_text,
            document,
            expires_at: stored.expires_at,
        })
    }
}
