//! Hand-built envelopes for every generation.
//!
//! These builders assemble envelopes from the raw primitives (AES-GCM,
//! gzip, brotli, base64url, base2048) rather than through the codec's write
//! path, so decoding them checks the codec against an independent encoder.
//! Salt and IV are fixed by the caller, which makes the output
//! deterministic.

use std::io::Write;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use linkseal_core::crypto::pbkdf2_sha256;
use linkseal_core::{Generation, IV_LEN, PBKDF2_ITERATIONS, SALT_LEN};

/// Everything needed to build one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEnvelope {
    pub generation: Generation,
    pub plain_text: String,
    pub password: String,
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
}

impl LegacyEnvelope {
    pub fn new(generation: Generation, plain_text: &str, password: &str) -> Self {
        Self {
            generation,
            plain_text: plain_text.to_string(),
            password: password.to_string(),
            salt: [0x5a; SALT_LEN],
            iv: [0x17; IV_LEN],
        }
    }

    pub fn with_salt(mut self, salt: [u8; SALT_LEN]) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_iv(mut self, iv: [u8; IV_LEN]) -> Self {
        self.iv = iv;
        self
    }

    /// AES-256-GCM ciphertext (with tag) of the compressed plaintext.
    pub fn ciphertext(&self) -> Vec<u8> {
        let key = pbkdf2_sha256(self.password.as_bytes(), &self.salt, PBKDF2_ITERATIONS)
            .expect("pbkdf2 with a fixed-size output cannot fail");
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key");
        cipher
            .encrypt(Nonce::from_slice(&self.iv), self.compressed().as_slice())
            .expect("aes-gcm encryption")
    }

    fn compressed(&self) -> Vec<u8> {
        let plain = self.plain_text.as_bytes();
        match self.generation {
            Generation::V1 | Generation::V5 => plain.to_vec(),
            Generation::V2 | Generation::V3 => gzip(plain),
            Generation::V4 | Generation::V6 => brotli(plain),
        }
    }

    /// The outer-decoded buffer: JSON bytes or the packed layout.
    pub fn raw(&self) -> Vec<u8> {
        let ciphertext = self.ciphertext();
        match self.generation {
            Generation::V1 | Generation::V2 | Generation::V3 => {
                let mut json = serde_json::json!({
                    "v": self.generation.version(),
                    "s": URL_SAFE_NO_PAD.encode(self.salt),
                    "i": URL_SAFE_NO_PAD.encode(self.iv),
                    "c": URL_SAFE_NO_PAD.encode(&ciphertext),
                });
                if self.generation != Generation::V1 {
                    json["z"] = serde_json::Value::from("gzip");
                }
                json.to_string().into_bytes()
            }
            Generation::V4 | Generation::V5 | Generation::V6 => {
                let mut buf = vec![self.generation.version()];
                buf.extend_from_slice(&self.salt);
                buf.extend_from_slice(&self.iv);
                buf.extend_from_slice(&ciphertext);
                buf
            }
        }
    }

    /// The envelope as text, in the generation's outer alphabet.
    pub fn text(&self) -> String {
        let raw = self.raw();
        match self.generation {
            Generation::V5 | Generation::V6 => base2048(&raw),
            _ => URL_SAFE_NO_PAD.encode(raw),
        }
    }
}

/// Build a JSON-shaped envelope with arbitrary fields, for malformed cases.
pub fn json_envelope_text(fields: serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(fields.to_string())
}

/// qntm's base2048 main repertoire as inclusive first/last character pairs.
const BASE2048_PAIRS: &str = concat!(
    "89AZazÆÆÐÐØØÞßææððøøþþĐđĦħııĸĸŁłŊŋŒœŦŧƀƟƢƮƱǃǝǝǤǥǶǷȜȝȠȥȴʯͰͳͶͷͻͽͿͿΑΡΣΩαρσωϏϏϗϯϳϳϷϸ",
    "ϺϿЂЂЄІЈЋЏИКикяђђєіјћџѵѸҁҊӀӃӏӔӕӘәӠӡӨөӶӷӺԯԱՖաֆאתװײؠءاؿفي٠٩ٮٯٱٴٹڿہہۃےەەۮۼۿۿܐܐܒܯݍޥޱޱ",
    "߀ߪࠀࠕࡀࡘࡠࡪࢠࢴࢶࢽऄनपरलळवहऽऽॐॐॠॡ०९ॲঀঅঌএঐওনপরললশহঽঽৎৎৠৡ০ৱ৴৹ৼৼਅਊਏਐਓਨਪਰਲਲਵਵਸਹੜੜ੦੯ੲੴઅઍએઑઓન",
    "પરલળવહઽઽૐૐૠૡ૦૯ૹૹଅଌଏଐଓନପରଲଳଵହଽଽୟୡ୦୯ୱ୷ஃஃஅஊஎஐஒஓககஙசஜஜஞடணதநபமஹௐௐ௦௲అఌఎఐఒనపహఽఽౘౚౠౡ౦౯౸౾",
    "ಀಀಅಌಎಐಒನಪಳವಹಽಽೞೞೠೡ೦೯ೱೲഅഌഎഐഒഺഽഽൎൎൔൖ൘ൡ൦൸ൺൿඅඖකනඳරලලවෆ෦෯กะาาเๅ๐๙ກຂຄຄງຈຊຊຍຍດທນຟມຣລລວວ",
    "ສຫອະາາຽຽເໄ໐໙ໞໟༀༀ༠༳ཀགངཇཉཌཎདནབམཛཝཨཪཬྈྌကဥဧဪဿ၉ၐၕၚၚ",
);

/// Characters for a final group of at most 3 bits.
const BASE2048_TAIL: &str = "01234567";

fn base2048_repertoire() -> Vec<char> {
    let pairs: Vec<char> = BASE2048_PAIRS.chars().collect();
    pairs
        .chunks(2)
        .flat_map(|pair| (pair[0]..=pair[1]).collect::<Vec<_>>())
        .collect()
}

/// Bit-at-a-time base2048 encoder, padding the last group with ones.
pub fn base2048(data: &[u8]) -> String {
    let main = base2048_repertoire();
    let tail: Vec<char> = BASE2048_TAIL.chars().collect();
    let mut out = String::new();
    let mut z = 0usize;
    let mut width = 0;
    for byte in data {
        for shift in (0..8u32).rev() {
            z = (z << 1) | usize::from((byte >> shift) & 1);
            width += 1;
            if width == 11 {
                out.push(main[z]);
                z = 0;
                width = 0;
            }
        }
    }
    if width > 0 {
        let target = if width <= 3 { 3 } else { 11 };
        while width < target {
            z = (z << 1) | 1;
            width += 1;
        }
        out.push(if target == 3 { tail[z] } else { main[z] });
    }
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish gzip")
}

fn brotli(data: &[u8]) -> Vec<u8> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 11, 22);
    writer.write_all(data).expect("write to Vec");
    writer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_header_layout() {
        let env = LegacyEnvelope::new(Generation::V4, "{}", "pw-1234")
            .with_salt([1; SALT_LEN])
            .with_iv([2; IV_LEN]);
        let raw = env.raw();
        assert_eq!(raw[0], 0x04);
        assert_eq!(&raw[1..17], &[1; SALT_LEN]);
        assert_eq!(&raw[17..29], &[2; IV_LEN]);
    }

    #[test]
    fn test_json_generations_start_with_brace() {
        for generation in [Generation::V1, Generation::V2, Generation::V3] {
            let raw = LegacyEnvelope::new(generation, "{}", "pw-1234").raw();
            assert_eq!(raw[0], b'{');
            let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
            assert_eq!(json["v"], generation.version());
        }
    }

    #[test]
    fn test_outer_alphabet_by_generation() {
        let b64 = LegacyEnvelope::new(Generation::V4, "{}", "pw-1234").text();
        assert!(linkseal_core::text::is_base64url(&b64));
        let packed = LegacyEnvelope::new(Generation::V5, "{}", "pw-1234").text();
        assert!(!linkseal_core::text::is_base64url(&packed));
    }

    #[test]
    fn test_base2048_repertoire_size() {
        let main = base2048_repertoire();
        assert_eq!(main.len(), 2048);
        assert!(main.windows(2).all(|w| w[0] < w[1]));
        assert!(!main.iter().any(|c| BASE2048_TAIL.contains(*c)));
    }

    #[test]
    fn test_base2048_matches_codec() {
        let data: Vec<u8> = (0..=255u8).rev().collect();
        for len in [0, 1, 2, 3, 4, 11, 29, 64, 256] {
            assert_eq!(
                base2048(&data[..len]),
                linkseal_core::text::base2048_encode(&data[..len]),
                "len {len}"
            );
        }
    }
}
