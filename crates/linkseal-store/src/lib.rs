//! # linkseal-store
//!
//! Keyed share storage. The share workflow talks to the [`ShareStore`]
//! trait and never to a backend directly.
//!
//! ## Key Types
//!
//! - [`ShareStore`] - async put/get/exists with TTL and absolute expiry
//! - [`MemoryStore`] - in-process map with lazy expiry on read
//! - [`KvShareStore`] - store over any [`KvNamespace`], reading bytes then text
//! - [`SqliteKv`] - durable local [`KvNamespace`]
//! - [`BindingChain`] - ordered binding providers, see [`resolve_share_store`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkseal_store::{
//!     resolve_share_store, BindingChain, BindingSource, MemoryStore, SqliteKv,
//! };
//!
//! let kv = Arc::new(SqliteKv::open("shares.db").unwrap());
//! let chain = BindingChain::new().with_binding(BindingSource::Environment, kv);
//! let store = resolve_share_store(&chain, Arc::new(MemoryStore::new()));
//! ```
//!
//! ## Design Notes
//!
//! - **Full replacement**: `put` on an existing key replaces it
//! - **Authoritative expiry**: `expires_at` in Unix ms; backend TTL may round
//! - **No transactions**: `exists` then `put` can race, last writer wins

pub mod bindings;
pub mod clock;
pub mod error;
pub mod kv;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use bindings::{resolve_share_store, BindingChain, BindingProvider, BindingSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, StoreError};
pub use kv::{KvEntry, KvNamespace, KvShareStore, KvValue, PutOptions, ShareMetadata, ValueKind};
pub use memory::MemoryStore;
pub use sqlite::SqliteKv;
pub use traits::{ShareRecord, ShareStore, StoredShare};
