//! Golden test vectors.
//!
//! Known-answer vectors for the primitives under the envelope, and fixed
//! envelope inputs whose packed header is fully determined.

use linkseal_core::crypto::pbkdf2_sha256;
use linkseal_core::{AesKey, Generation, Iv};

use crate::legacy::LegacyEnvelope;

/// A PBKDF2-HMAC-SHA256 known answer (32-byte output).
#[derive(Debug, Clone)]
pub struct Pbkdf2Vector {
    pub name: &'static str,
    pub password: &'static [u8],
    pub salt: &'static [u8],
    pub iterations: u32,
    pub expected_hex: &'static str,
}

/// Published PBKDF2-HMAC-SHA256 vectors, truncated to 32 bytes.
pub fn pbkdf2_vectors() -> Vec<Pbkdf2Vector> {
    vec![
        Pbkdf2Vector {
            name: "password/salt, 1 iteration",
            password: b"password",
            salt: b"salt",
            iterations: 1,
            expected_hex: "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b",
        },
        Pbkdf2Vector {
            name: "password/salt, 2 iterations",
            password: b"password",
            salt: b"salt",
            iterations: 2,
            expected_hex: "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43",
        },
        Pbkdf2Vector {
            name: "password/salt, 4096 iterations",
            password: b"password",
            salt: b"salt",
            iterations: 4096,
            expected_hex: "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a",
        },
        Pbkdf2Vector {
            name: "passwd/salt, 1 iteration",
            password: b"passwd",
            salt: b"salt",
            iterations: 1,
            expected_hex: "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc",
        },
    ]
}

/// An AES-256-GCM known answer with empty associated data.
#[derive(Debug, Clone)]
pub struct AesGcmVector {
    pub name: &'static str,
    pub key: [u8; 32],
    pub iv: [u8; 12],
    pub plaintext_hex: &'static str,
    /// Ciphertext followed by the 16-byte tag.
    pub sealed_hex: &'static str,
}

/// AES-256-GCM vectors from the McGrew-Viega GCM paper, test cases 13 and 14.
pub fn aes_gcm_vectors() -> Vec<AesGcmVector> {
    vec![
        AesGcmVector {
            name: "zero key, empty plaintext",
            key: [0; 32],
            iv: [0; 12],
            plaintext_hex: "",
            sealed_hex: "530f8afbc74536b9a963b4f1c4cb738b",
        },
        AesGcmVector {
            name: "zero key, one zero block",
            key: [0; 32],
            iv: [0; 12],
            plaintext_hex: "00000000000000000000000000000000",
            sealed_hex: "cea7403d4d606b6e074ec5d3baf39d18d0d1c8a799996bf0265b98b5d48ab919",
        },
    ]
}

/// Fixed envelope inputs, one per generation.
#[derive(Debug, Clone)]
pub struct EnvelopeVector {
    pub name: &'static str,
    pub generation: Generation,
    pub plain_text: &'static str,
    pub password: &'static str,
    pub salt: [u8; 16],
    pub iv: [u8; 12],
    /// Hex of version byte, salt and IV for packed generations.
    pub packed_header_hex: Option<&'static str>,
}

impl EnvelopeVector {
    pub fn build(&self) -> LegacyEnvelope {
        LegacyEnvelope::new(self.generation, self.plain_text, self.password)
            .with_salt(self.salt)
            .with_iv(self.iv)
    }
}

const VECTOR_SALT: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];
const VECTOR_IV: [u8; 12] = [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab];

pub fn envelope_vectors() -> Vec<EnvelopeVector> {
    let vector = |name: &'static str,
                  generation: Generation,
                  packed_header_hex: Option<&'static str>| EnvelopeVector {
        name,
        generation,
        plain_text: r#"{"title":"Kyoto","days":[{"date":"2024-04-01","items":["Fushimi Inari"]}]}"#,
        password: "secret-123",
        salt: VECTOR_SALT,
        iv: VECTOR_IV,
        packed_header_hex,
    };
    vec![
        vector("gen1 json, uncompressed (retired)", Generation::V1, None),
        vector("gen2 json, gzip (retired)", Generation::V2, None),
        vector("gen3 json, gzip", Generation::V3, None),
        vector(
            "gen4 packed, brotli, base64url",
            Generation::V4,
            Some("0400112233445566778899aabbccddeeffa0a1a2a3a4a5a6a7a8a9aaab"),
        ),
        vector(
            "gen5 packed, uncompressed, base2048",
            Generation::V5,
            Some("0500112233445566778899aabbccddeeffa0a1a2a3a4a5a6a7a8a9aaab"),
        ),
        vector(
            "gen6 packed, brotli, base2048",
            Generation::V6,
            Some("0600112233445566778899aabbccddeeffa0a1a2a3a4a5a6a7a8a9aaab"),
        ),
    ]
}

/// A generation-5 link with salt `00..0f`, IV `10..1b`, password
/// `secret-123` and plaintext `{"hello":"world"}`.
pub const GEN5_LINK_TEXT: &str = "m8ҫuҩࠅɻHƃנYɺ༣ĸԋڇɂଛಀЦਛनӿಐƾಈϯЄව೨ωҢӶרѻʬҏԆඊඝߟඥջ۷ਡ3";

/// The packed buffer behind [`GEN5_LINK_TEXT`].
pub const GEN5_LINK_PACKED_HEX: &str = concat!(
    "05000102030405060708090a0b0c0d0e0f101112131415161718191a1b",
    "2391b63b10f8d0b4974e059a0a79fb45eb2cee1123d08f769ee380fbad53b68a26",
);

/// Check the primitive vectors; returns `(name, matches, actual_hex)`.
pub fn verify_primitive_vectors() -> Vec<(String, bool, String)> {
    let mut results = Vec::new();
    for v in pbkdf2_vectors() {
        let actual = pbkdf2_sha256(v.password, v.salt, v.iterations)
            .map(hex::encode)
            .unwrap_or_default();
        results.push((v.name.to_string(), actual == v.expected_hex, actual));
    }
    for v in aes_gcm_vectors() {
        let plaintext = hex::decode(v.plaintext_hex).unwrap_or_default();
        let actual = AesKey::from_bytes(v.key)
            .seal(&plaintext, &Iv::from_bytes(v.iv))
            .map(hex::encode)
            .unwrap_or_default();
        results.push((v.name.to_string(), actual == v.sealed_hex, actual));
    }
    results
}
