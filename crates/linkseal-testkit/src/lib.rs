//! # linkseal-testkit
//!
//! Testing utilities for linkseal.
//!
//! - **Legacy envelopes**: hand-built envelopes for every generation
//! - **Golden vectors**: known answers for PBKDF2 and AES-GCM, fixed envelope inputs
//! - **Generators**: proptest strategies for passwords, keys and documents
//! - **Fixtures**: a share service on a manual clock, scripted KV backends
//!
//! ## Legacy Envelopes
//!
//! ```rust,no_run
//! use linkseal_core::Generation;
//! use linkseal_testkit::legacy::LegacyEnvelope;
//!
//! let text = LegacyEnvelope::new(Generation::V3, r#"{"a":1}"#, "secret-123").text();
//! assert_eq!(linkseal_core::decrypt(&text, "secret-123").unwrap(), r#"{"a":1}"#);
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use linkseal_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::with_keys(&["firstkey01"]);
//! let created = fixture.create(r#"{"a":1}"#, "secret-123").await?;
//! fixture.clock.advance(1_000);
//! ```

pub mod fixtures;
pub mod generators;
pub mod legacy;
pub mod vectors;

pub use fixtures::{KvCall, ScriptedKv, SequenceKeyGenerator, TestFixture, FIXTURE_NOW};
pub use legacy::LegacyEnvelope;
pub use vectors::{envelope_vectors, verify_primitive_vectors, EnvelopeVector};
