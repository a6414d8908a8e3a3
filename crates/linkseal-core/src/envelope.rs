//! The versioned encrypted-payload envelope.
//!
//! Six wire generations have shipped. Encryption always writes the current
//! one ([`Generation::CURRENT`]); decryption reads every generation that is
//! still served, identifying it purely from the envelope's own content.
//! Generations 1 and 2 are recognised but rejected as retired.
//!
//! ```text
//! gen  outer text   inner shape                          compression
//! 1    base64url    JSON {v:1, s, i, c}                  none     (retired)
//! 2    base64url    JSON {v:2, z:"gzip", s, i, c}        gzip     (retired)
//! 3    base64url    JSON {v:3, z:"gzip", s, i, c}        gzip
//! 4    base64url    0x04 | salt[16] | iv[12] | ct        brotli
//! 5    base2048     0x05 | salt[16] | iv[12] | ct        none
//! 6    base2048     0x06 | salt[16] | iv[12] | ct        brotli
//! ```
//!
//! Decoding is a two-step table lookup: the outer text is base64url-decoded
//! when it uses only that alphabet and base2048-decoded otherwise, then the
//! first decoded byte selects a generation decoder (`{` defers to the JSON
//! `v` field). Every decoder is a pure `fn(&[u8], &str) -> Result<String>`.

use bytes::Bytes;
use serde::Deserialize;

use crate::compression::Compression;
use crate::crypto::{AesKey, Iv, Salt, IV_LEN, SALT_LEN};
use crate::error::{EnvelopeError, Result};
use crate::text::{
    base2048_decode, base2048_encode, base64url_decode, base64url_encode, is_base64url,
};

/// Version byte + salt + IV.
pub const PACKED_HEADER_LEN: usize = 1 + SALT_LEN + IV_LEN;

/// Leading byte of a JSON envelope.
const JSON_LEADING_BYTE: u8 = b'{';

/// Envelope wire generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Generation {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
    V6 = 6,
}

impl Generation {
    /// The generation every new envelope is written in.
    pub const CURRENT: Generation = Generation::V6;

    /// Version number carried by the envelope (JSON `v` or leading byte).
    pub const fn version(self) -> u8 {
        self as u8
    }

    pub const fn compression(self) -> Compression {
        match self {
            Self::V1 | Self::V5 => Compression::None,
            Self::V2 | Self::V3 => Compression::Gzip,
            Self::V4 | Self::V6 => Compression::Brotli,
        }
    }

    /// Text encoding of the outer envelope.
    pub const fn text_encoding(self) -> TextEncoding {
        match self {
            Self::V1 | Self::V2 | Self::V3 | Self::V4 => TextEncoding::Base64Url,
            Self::V5 | Self::V6 => TextEncoding::Base2048,
        }
    }

    /// True for the packed binary layout (generations 4 to 6).
    pub const fn is_packed(self) -> bool {
        matches!(self, Self::V4 | Self::V5 | Self::V6)
    }

    /// Generations 1 and 2 are no longer read.
    pub const fn is_retired(self) -> bool {
        matches!(self, Self::V1 | Self::V2)
    }
}

/// Outer text alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Base64Url,
    Base2048,
}

impl TextEncoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64Url => base64url_encode(bytes),
            Self::Base2048 => base2048_encode(bytes),
        }
    }

    /// Pick the alphabet a piece of envelope text was written in.
    pub fn detect(text: &str) -> Self {
        if is_base64url(text) {
            Self::Base64Url
        } else {
            Self::Base2048
        }
    }

    pub fn decode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base64Url => base64url_decode(text),
            Self::Base2048 => base2048_decode(text),
        }
    }
}

/// An encrypted payload as produced by [`encrypt`] or [`encrypt_bytes`].
///
/// Immutable once created. Text envelopes travel in URLs and legacy storage;
/// binary envelopes are the raw packed buffer kept by byte-capable stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedEnvelope {
    Text(String),
    Binary(Bytes),
}

impl EncryptedEnvelope {
    /// Size of the stored representation in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Decode the outer text layer, yielding the generation-tagged buffer.
    pub fn raw_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Text(text) => TextEncoding::detect(text).decode(text),
            Self::Binary(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Identify the generation without decrypting.
    pub fn generation(&self) -> Result<Generation> {
        sniff_generation(&self.raw_bytes()?)
    }
}

impl From<String> for EncryptedEnvelope {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for EncryptedEnvelope {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

/// True when `bytes` has the shape of a packed binary envelope.
///
/// Stores use this to decide whether a value fetched as bytes is really a
/// binary envelope or a text envelope that must be re-read as text.
pub fn looks_like_packed(bytes: &[u8]) -> bool {
    bytes.len() >= PACKED_HEADER_LEN
        && matches!(lookup_leading_byte(bytes[0]), Some(Shape::Packed(_)))
}

/// The fields common to every generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeParts {
    pub generation: Generation,
    pub salt: Salt,
    pub iv: Iv,
    pub ciphertext: Vec<u8>,
}

impl EnvelopeParts {
    /// Serialize into the packed layout `version | salt | iv | ciphertext`.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PACKED_HEADER_LEN + self.ciphertext.len());
        buf.push(self.generation.version());
        buf.extend_from_slice(self.salt.as_bytes());
        buf.extend_from_slice(self.iv.as_bytes());
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Split a packed buffer whose leading byte is `generation`.
    pub fn unpack(generation: Generation, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PACKED_HEADER_LEN {
            return Err(EnvelopeError::format(format!(
                "packed envelope truncated: {} bytes, need at least {PACKED_HEADER_LEN}",
                bytes.len()
            )));
        }
        if bytes[0] != generation.version() {
            return Err(EnvelopeError::format(format!(
                "expected version byte {:#04x}, found {:#04x}",
                generation.version(),
                bytes[0]
            )));
        }
        Ok(Self {
            generation,
            salt: Salt::from_slice(&bytes[1..1 + SALT_LEN])?,
            iv: Iv::from_slice(&bytes[1 + SALT_LEN..PACKED_HEADER_LEN])?,
            ciphertext: bytes[PACKED_HEADER_LEN..].to_vec(),
        })
    }

    /// Derive the key, authenticate, decompress and return the plaintext.
    pub fn open(&self, password: &str) -> Result<String> {
        let key = AesKey::derive(password, &self.salt)?;
        let compressed = key.open(&self.ciphertext, &self.iv)?;
        let plain = self.generation.compression().decompress(&compressed)?;
        String::from_utf8(plain).map_err(|_| EnvelopeError::format("plaintext is not valid UTF-8"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

fn seal_current(plain_text: &str, password: &str) -> Result<EnvelopeParts> {
    let generation = Generation::CURRENT;
    let salt = Salt::generate();
    let iv = Iv::generate();
    let key = AesKey::derive(password, &salt)?;
    let compressed = generation.compression().compress(plain_text.as_bytes())?;
    let ciphertext = key.seal(&compressed, &iv)?;
    Ok(EnvelopeParts {
        generation,
        salt,
        iv,
        ciphertext,
    })
}

/// Encrypt into a current-generation text envelope.
pub fn encrypt(plain_text: &str, password: &str) -> Result<String> {
    let parts = seal_current(plain_text, password)?;
    Ok(parts.generation.text_encoding().encode(&parts.pack()))
}

/// Encrypt into a current-generation packed binary envelope.
pub fn encrypt_bytes(plain_text: &str, password: &str) -> Result<Vec<u8>> {
    Ok(seal_current(plain_text, password)?.pack())
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// A generation decoder: raw (outer-decoded) envelope bytes + password.
pub type Decoder = fn(&[u8], &str) -> Result<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Packed(Generation),
    Json,
}

/// Leading byte → envelope shape.
const LEADING_BYTE_TABLE: [(u8, Shape); 4] = [
    (0x04, Shape::Packed(Generation::V4)),
    (0x05, Shape::Packed(Generation::V5)),
    (0x06, Shape::Packed(Generation::V6)),
    (JSON_LEADING_BYTE, Shape::Json),
];

/// JSON `v` → generation.
const JSON_VERSION_TABLE: [(u64, Generation); 3] = [
    (1, Generation::V1),
    (2, Generation::V2),
    (3, Generation::V3),
];

fn lookup_leading_byte(byte: u8) -> Option<Shape> {
    LEADING_BYTE_TABLE
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, shape)| *shape)
}

#[derive(Deserialize)]
struct JsonVersion {
    v: Option<serde_json::Value>,
}

/// Identify the generation of an outer-decoded envelope buffer.
pub fn sniff_generation(raw: &[u8]) -> Result<Generation> {
    let first = *raw
        .first()
        .ok_or_else(|| EnvelopeError::format("empty envelope"))?;
    match lookup_leading_byte(first) {
        Some(Shape::Packed(generation)) => Ok(generation),
        Some(Shape::Json) => {
            let header: JsonVersion = serde_json::from_slice(raw)
                .map_err(|e| EnvelopeError::format(format!("bad JSON envelope: {e}")))?;
            let version = header
                .v
                .as_ref()
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| EnvelopeError::format("JSON envelope has no numeric version"))?;
            JSON_VERSION_TABLE
                .iter()
                .find(|(v, _)| *v == version)
                .map(|(_, generation)| *generation)
                .ok_or_else(|| {
                    EnvelopeError::format(format!("unknown JSON envelope version {version}"))
                })
        }
        None => Err(EnvelopeError::format(format!(
            "unknown envelope leading byte {first:#04x}"
        ))),
    }
}

/// The decoder for a generation.
pub fn decoder_for(generation: Generation) -> Decoder {
    match generation {
        Generation::V1 => generations::gen1,
        Generation::V2 => generations::gen2,
        Generation::V3 => generations::gen3,
        Generation::V4 => generations::gen4,
        Generation::V5 => generations::gen5,
        Generation::V6 => generations::gen6,
    }
}

/// Decrypt an outer-decoded envelope buffer of any supported generation.
pub fn decrypt_bytes(raw: &[u8], password: &str) -> Result<String> {
    let generation = sniff_generation(raw)?;
    decoder_for(generation)(raw, password)
}

/// Decrypt a text envelope of any supported generation.
pub fn decrypt(text: &str, password: &str) -> Result<String> {
    let raw = TextEncoding::detect(text).decode(text)?;
    decrypt_bytes(&raw, password)
}

/// Decrypt either envelope form.
pub fn open(envelope: &EncryptedEnvelope, password: &str) -> Result<String> {
    match envelope {
        EncryptedEnvelope::Text(text) => decrypt(text, password),
        EncryptedEnvelope::Binary(bytes) => decrypt_bytes(bytes, password),
    }
}

/// One pure decoder per generation.
pub mod generations {
    use serde::Deserialize;

    use super::{EnvelopeParts, Generation};
    use crate::crypto::{Iv, Salt};
    use crate::error::{EnvelopeError, Result};
    use crate::text::base64url_decode;

    #[derive(Deserialize)]
    struct JsonEnvelope {
        v: u64,
        #[serde(default)]
        z: Option<String>,
        s: String,
        i: String,
        c: String,
    }

    fn parse_json(raw: &[u8], generation: Generation) -> Result<EnvelopeParts> {
        let env: JsonEnvelope = serde_json::from_slice(raw)
            .map_err(|e| EnvelopeError::format(format!("bad JSON envelope: {e}")))?;
        if env.v != u64::from(generation.version()) {
            return Err(EnvelopeError::format(format!(
                "expected JSON envelope v{}, found v{}",
                generation.version(),
                env.v
            )));
        }
        if let Some(expected) = generation.compression().tag() {
            if env.z.as_deref() != Some(expected) {
                return Err(EnvelopeError::format(format!(
                    "unsupported compression {:?}",
                    env.z
                )));
            }
        }
        if env.s.is_empty() || env.i.is_empty() || env.c.is_empty() {
            return Err(EnvelopeError::format("JSON envelope has empty fields"));
        }
        Ok(EnvelopeParts {
            generation,
            salt: Salt::from_slice(&base64url_decode(&env.s)?)?,
            iv: Iv::from_slice(&base64url_decode(&env.i)?)?,
            ciphertext: base64url_decode(&env.c)?,
        })
    }

    /// Generation 1 is retired; it is rejected without being parsed further.
    pub fn gen1(_raw: &[u8], _password: &str) -> Result<String> {
        Err(EnvelopeError::RetiredGeneration(Generation::V1.version()))
    }

    /// Generation 2 is retired as well.
    pub fn gen2(_raw: &[u8], _password: &str) -> Result<String> {
        Err(EnvelopeError::RetiredGeneration(Generation::V2.version()))
    }

    /// Generation 3: JSON, gzip.
    pub fn gen3(raw: &[u8], password: &str) -> Result<String> {
        parse_json(raw, Generation::V3)?.open(password)
    }

    /// Generation 4: packed, brotli.
    pub fn gen4(raw: &[u8], password: &str) -> Result<String> {
        EnvelopeParts::unpack(Generation::V4, raw)?.open(password)
    }

    /// Generation 5: packed, uncompressed.
    pub fn gen5(raw: &[u8], password: &str) -> Result<String> {
        EnvelopeParts::unpack(Generation::V5, raw)?.open(password)
    }

    /// Generation 6: packed, brotli.
    pub fn gen6(raw: &[u8], password: &str) -> Result<String> {
        EnvelopeParts::unpack(Generation::V6, raw)?.open(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::base64url_encode;

    #[test]
    fn test_encrypt_decrypt_example() {
        let source = r#"{"hello":"world"}"#;
        let encrypted = encrypt(source, "secret-123").unwrap();
        assert_eq!(decrypt(&encrypted, "secret-123").unwrap(), source);
    }

    #[test]
    fn test_encrypt_emits_current_generation_in_base2048_text() {
        let encrypted = encrypt("{}", "pw-1234").unwrap();
        assert!(!is_base64url(&encrypted));

        let raw = base2048_decode(&encrypted).unwrap();
        assert_eq!(raw[0], 0x06);
        assert!(raw.len() >= PACKED_HEADER_LEN);
        assert_eq!(sniff_generation(&raw).unwrap(), Generation::CURRENT);
    }

    #[test]
    fn test_encrypt_bytes_roundtrip() {
        let source = r#"{"hello":"bytes"}"#;
        let packed = encrypt_bytes(source, "secret-123").unwrap();
        assert_eq!(packed[0], 0x06);
        assert!(looks_like_packed(&packed));
        assert_eq!(decrypt_bytes(&packed, "secret-123").unwrap(), source);

        let envelope = EncryptedEnvelope::from(packed);
        assert_eq!(open(&envelope, "secret-123").unwrap(), source);
    }

    #[test]
    fn test_wrong_password_is_decryption_failure() {
        let encrypted = encrypt("payload", "right-password").unwrap();
        let err = decrypt(&encrypted, "wrong-password").unwrap_err();
        assert!(err.is_decryption_failure());
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_fresh_salt_and_iv_per_encryption() {
        let a = encrypt_bytes("same", "pw-1234").unwrap();
        let b = encrypt_bytes("same", "pw-1234").unwrap();
        assert_ne!(a[1..PACKED_HEADER_LEN], b[1..PACKED_HEADER_LEN]);
    }

    #[test]
    fn test_truncated_packed_buffer_is_format_error() {
        let mut buf = vec![0x06u8];
        buf.extend_from_slice(&[0u8; 20]);
        let err = decrypt_bytes(&buf, "pw").unwrap_err();
        assert!(err.is_format_error());

        let text = base64url_encode(&buf);
        assert!(decrypt(&text, "pw").unwrap_err().is_format_error());
    }

    #[test]
    fn test_unknown_leading_byte_is_format_error() {
        let buf = [0x07u8; 40];
        assert!(decrypt_bytes(&buf, "pw").unwrap_err().is_format_error());
        assert!(decrypt_bytes(&[], "pw").unwrap_err().is_format_error());
    }

    #[test]
    fn test_broken_outer_text_is_format_error() {
        assert!(decrypt("broken_payload", "secret-123").unwrap_err().is_format_error());
        assert!(decrypt("not base64 and not base2048", "pw").unwrap_err().is_format_error());
    }

    #[test]
    fn test_retired_generation_rejected_before_parsing_fields() {
        let raw = br#"{"v":2,"z":"gzip"}"#;
        assert_eq!(sniff_generation(raw).unwrap(), Generation::V2);
        assert!(matches!(
            decrypt_bytes(raw, "pw"),
            Err(EnvelopeError::RetiredGeneration(2))
        ));

        let raw = br#"{"v":1,"s":"AAAA","i":"AAAA","c":"AAAA"}"#;
        assert_eq!(sniff_generation(raw).unwrap(), Generation::V1);
        let err = decrypt_bytes(raw, "pw").unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(err, EnvelopeError::RetiredGeneration(1)));
    }

    #[test]
    fn test_json_envelope_without_version_is_format_error() {
        let raw = br#"{"s":"a","i":"b","c":"c"}"#;
        assert!(decrypt_bytes(raw, "pw").unwrap_err().is_format_error());
        let raw = br#"{"v":9,"s":"a","i":"b","c":"c"}"#;
        assert!(decrypt_bytes(raw, "pw").unwrap_err().is_format_error());
    }

    #[test]
    fn test_looks_like_packed() {
        assert!(looks_like_packed(&[0x04; PACKED_HEADER_LEN]));
        assert!(looks_like_packed(&[0x05; 40]));
        assert!(!looks_like_packed(&[0x06; PACKED_HEADER_LEN - 1]));
        assert!(!looks_like_packed(b"{\"v\":3,\"z\":\"gzip\",\"s\":\"\",\"i\":\"\",\"c\":\"\"}"));
        assert!(!looks_like_packed(&[0x07; 40]));
    }

    #[test]
    fn test_generation_table() {
        assert_eq!(Generation::V3.compression(), Compression::Gzip);
        assert_eq!(Generation::V5.compression(), Compression::None);
        assert_eq!(Generation::V4.text_encoding(), TextEncoding::Base64Url);
        assert_eq!(Generation::V6.text_encoding(), TextEncoding::Base2048);
        assert!(Generation::V2.is_retired());
        assert!(Generation::V1.is_retired());
        assert!(!Generation::V3.is_retired());
    }
}
