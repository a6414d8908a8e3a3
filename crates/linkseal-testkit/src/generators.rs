//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use linkseal_core::{Generation, IV_LEN, SALT_LEN};

use crate::legacy::LegacyEnvelope;

/// A password that passes validation.
pub fn password() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!#%&*+.=?@^_~-]{4,24}".prop_map(String::from)
}

/// A well-formed share key.
pub fn share_key() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{8,32}".prop_map(String::from)
}

/// A string that is not a well-formed share key.
pub fn malformed_share_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9_-]{0,7}".prop_map(String::from),
        "[A-Za-z0-9_-]{33,40}".prop_map(String::from),
        "[A-Za-z0-9]{4}[ ./+=%][A-Za-z0-9]{4}".prop_map(String::from),
    ]
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "\\PC{0,24}".prop_map(Value::from),
    ]
}

/// A JSON value of bounded depth.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// A JSON object document.
pub fn document() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,8}", json_value(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// A document rendered as compact JSON text.
pub fn document_text() -> impl Strategy<Value = String> {
    document().prop_map(|doc| doc.to_string())
}

/// A generation the codec still accepts.
pub fn accepted_generation() -> impl Strategy<Value = Generation> {
    prop_oneof![
        Just(Generation::V3),
        Just(Generation::V4),
        Just(Generation::V5),
        Just(Generation::V6),
    ]
}

/// Inputs for one hand-built envelope.
pub fn legacy_envelope() -> impl Strategy<Value = LegacyEnvelope> {
    (
        accepted_generation(),
        document_text(),
        password(),
        any::<[u8; SALT_LEN]>(),
        any::<[u8; IV_LEN]>(),
    )
        .prop_map(|(generation, plain, password, salt, iv)| {
            LegacyEnvelope::new(generation, &plain, &password)
                .with_salt(salt)
                .with_iv(iv)
        })
}
