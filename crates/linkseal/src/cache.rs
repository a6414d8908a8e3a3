//! Client-side cache of password verification hashes.
//!
//! After creating a share the client keeps its [`PasswordHashRecord`] so a
//! later unlock can reject a mistyped password without a round trip. Records
//! are stored as their `{v,salt,hash,iter}` JSON; anything else reads back
//! as absent.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use linkseal_core::PasswordHashRecord;

/// Persistent map from share key to password hash record.
pub trait PasswordHashCache: Send + Sync {
    fn save(&self, key: &str, record: &PasswordHashRecord);

    /// `None` when nothing usable is saved for `key`.
    fn load(&self, key: &str) -> Option<PasswordHashRecord>;
}

/// In-process cache holding the serialized JSON form.
#[derive(Debug, Default)]
pub struct MemoryPasswordHashCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryPasswordHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw JSON as-is, e.g. a value written by an older client.
    pub fn save_raw(&self, key: &str, json: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), json.into());
    }

    pub fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl PasswordHashCache for MemoryPasswordHashCache {
    fn save(&self, key: &str, record: &PasswordHashRecord) {
        self.save_raw(key, record.to_json());
    }

    fn load(&self, key: &str) -> Option<PasswordHashRecord> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        PasswordHashRecord::from_json(entries.get(key)?)
    }
}
