//! Text encodings for envelopes and identifiers.
//!
//! Two alphabets are in play:
//!
//! - **base64url** (RFC 4648 §5, unpadded): generations 1 to 4, share keys
//!   and password-hash fields.
//! - **base2048** (qntm's repertoire): 11 bits per character, used by
//!   generations 5 and 6 to keep share URLs short. The 2048 main characters
//!   are letters and digits below U+1100 that survive every Unicode
//!   normalization form; a final group of at most 3 bits is written with one
//!   of the digits `0`..`7`. Padding bits are always ones.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{EnvelopeError, Result};

/// Unpadded URL-safe base64 that also accepts padded input on decode.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn base64url_encode(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

/// Decode base64url text (padding optional).
pub fn base64url_decode(text: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(text)
        .map_err(|e| EnvelopeError::format(format!("bad base64url: {e}")))
}

/// True when `text` is non-empty and uses only `[A-Za-z0-9_-]`.
pub fn is_base64url(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Main repertoire as inclusive code point ranges with the index of their
/// first character. Ascending, 2048 characters in total.
const BASE2048_RANGES: [(u32, u32, u32); 223] = [
    (0x0038, 0x0039, 0),
    (0x0041, 0x005A, 2),
    (0x0061, 0x007A, 28),
    (0x00C6, 0x00C6, 54),
    (0x00D0, 0x00D0, 55),
    (0x00D8, 0x00D8, 56),
    (0x00DE, 0x00DF, 57),
    (0x00E6, 0x00E6, 59),
    (0x00F0, 0x00F0, 60),
    (0x00F8, 0x00F8, 61),
    (0x00FE, 0x00FE, 62),
    (0x0110, 0x0111, 63),
    (0x0126, 0x0127, 65),
    (0x0131, 0x0131, 67),
    (0x0138, 0x0138, 68),
    (0x0141, 0x0142, 69),
    (0x014A, 0x014B, 71),
    (0x0152, 0x0153, 73),
    (0x0166, 0x0167, 75),
    (0x0180, 0x019F, 77),
    (0x01A2, 0x01AE, 109),
    (0x01B1, 0x01C3, 122),
    (0x01DD, 0x01DD, 141),
    (0x01E4, 0x01E5, 142),
    (0x01F6, 0x01F7, 144),
    (0x021C, 0x021D, 146),
    (0x0220, 0x0225, 148),
    (0x0234, 0x02AF, 154),
    (0x0370, 0x0373, 278),
    (0x0376, 0x0377, 282),
    (0x037B, 0x037D, 284),
    (0x037F, 0x037F, 287),
    (0x0391, 0x03A1, 288),
    (0x03A3, 0x03A9, 305),
    (0x03B1, 0x03C1, 312),
    (0x03C3, 0x03C9, 329),
    (0x03CF, 0x03CF, 336),
    (0x03D7, 0x03EF, 337),
    (0x03F3, 0x03F3, 362),
    (0x03F7, 0x03F8, 363),
    (0x03FA, 0x03FF, 365),
    (0x0402, 0x0402, 371),
    (0x0404, 0x0406, 372),
    (0x0408, 0x040B, 375),
    (0x040F, 0x0418, 379),
    (0x041A, 0x0438, 389),
    (0x043A, 0x044F, 420),
    (0x0452, 0x0452, 442),
    (0x0454, 0x0456, 443),
    (0x0458, 0x045B, 446),
    (0x045F, 0x0475, 450),
    (0x0478, 0x0481, 473),
    (0x048A, 0x04C0, 483),
    (0x04C3, 0x04CF, 538),
    (0x04D4, 0x04D5, 551),
    (0x04D8, 0x04D9, 553),
    (0x04E0, 0x04E1, 555),
    (0x04E8, 0x04E9, 557),
    (0x04F6, 0x04F7, 559),
    (0x04FA, 0x052F, 561),
    (0x0531, 0x0556, 615),
    (0x0561, 0x0586, 653),
    (0x05D0, 0x05EA, 691),
    (0x05F0, 0x05F2, 718),
    (0x0620, 0x0621, 721),
    (0x0627, 0x063F, 723),
    (0x0641, 0x064A, 748),
    (0x0660, 0x0669, 758),
    (0x066E, 0x066F, 768),
    (0x0671, 0x0674, 770),
    (0x0679, 0x06BF, 774),
    (0x06C1, 0x06C1, 845),
    (0x06C3, 0x06D2, 846),
    (0x06D5, 0x06D5, 862),
    (0x06EE, 0x06FC, 863),
    (0x06FF, 0x06FF, 878),
    (0x0710, 0x0710, 879),
    (0x0712, 0x072F, 880),
    (0x074D, 0x07A5, 910),
    (0x07B1, 0x07B1, 999),
    (0x07C0, 0x07EA, 1000),
    (0x0800, 0x0815, 1043),
    (0x0840, 0x0858, 1065),
    (0x0860, 0x086A, 1090),
    (0x08A0, 0x08B4, 1101),
    (0x08B6, 0x08BD, 1122),
    (0x0904, 0x0928, 1130),
    (0x092A, 0x0930, 1167),
    (0x0932, 0x0933, 1174),
    (0x0935, 0x0939, 1176),
    (0x093D, 0x093D, 1181),
    (0x0950, 0x0950, 1182),
    (0x0960, 0x0961, 1183),
    (0x0966, 0x096F, 1185),
    (0x0972, 0x0980, 1195),
    (0x0985, 0x098C, 1210),
    (0x098F, 0x0990, 1218),
    (0x0993, 0x09A8, 1220),
    (0x09AA, 0x09B0, 1242),
    (0x09B2, 0x09B2, 1249),
    (0x09B6, 0x09B9, 1250),
    (0x09BD, 0x09BD, 1254),
    (0x09CE, 0x09CE, 1255),
    (0x09E0, 0x09E1, 1256),
    (0x09E6, 0x09F1, 1258),
    (0x09F4, 0x09F9, 1270),
    (0x09FC, 0x09FC, 1276),
    (0x0A05, 0x0A0A, 1277),
    (0x0A0F, 0x0A10, 1283),
    (0x0A13, 0x0A28, 1285),
    (0x0A2A, 0x0A30, 1307),
    (0x0A32, 0x0A32, 1314),
    (0x0A35, 0x0A35, 1315),
    (0x0A38, 0x0A39, 1316),
    (0x0A5C, 0x0A5C, 1318),
    (0x0A66, 0x0A6F, 1319),
    (0x0A72, 0x0A74, 1329),
    (0x0A85, 0x0A8D, 1332),
    (0x0A8F, 0x0A91, 1341),
    (0x0A93, 0x0AA8, 1344),
    (0x0AAA, 0x0AB0, 1366),
    (0x0AB2, 0x0AB3, 1373),
    (0x0AB5, 0x0AB9, 1375),
    (0x0ABD, 0x0ABD, 1380),
    (0x0AD0, 0x0AD0, 1381),
    (0x0AE0, 0x0AE1, 1382),
    (0x0AE6, 0x0AEF, 1384),
    (0x0AF9, 0x0AF9, 1394),
    (0x0B05, 0x0B0C, 1395),
    (0x0B0F, 0x0B10, 1403),
    (0x0B13, 0x0B28, 1405),
    (0x0B2A, 0x0B30, 1427),
    (0x0B32, 0x0B33, 1434),
    (0x0B35, 0x0B39, 1436),
    (0x0B3D, 0x0B3D, 1441),
    (0x0B5F, 0x0B61, 1442),
    (0x0B66, 0x0B6F, 1445),
    (0x0B71, 0x0B77, 1455),
    (0x0B83, 0x0B83, 1462),
    (0x0B85, 0x0B8A, 1463),
    (0x0B8E, 0x0B90, 1469),
    (0x0B92, 0x0B93, 1472),
    (0x0B95, 0x0B95, 1474),
    (0x0B99, 0x0B9A, 1475),
    (0x0B9C, 0x0B9C, 1477),
    (0x0B9E, 0x0B9F, 1478),
    (0x0BA3, 0x0BA4, 1480),
    (0x0BA8, 0x0BAA, 1482),
    (0x0BAE, 0x0BB9, 1485),
    (0x0BD0, 0x0BD0, 1497),
    (0x0BE6, 0x0BF2, 1498),
    (0x0C05, 0x0C0C, 1511),
    (0x0C0E, 0x0C10, 1519),
    (0x0C12, 0x0C28, 1522),
    (0x0C2A, 0x0C39, 1545),
    (0x0C3D, 0x0C3D, 1561),
    (0x0C58, 0x0C5A, 1562),
    (0x0C60, 0x0C61, 1565),
    (0x0C66, 0x0C6F, 1567),
    (0x0C78, 0x0C7E, 1577),
    (0x0C80, 0x0C80, 1584),
    (0x0C85, 0x0C8C, 1585),
    (0x0C8E, 0x0C90, 1593),
    (0x0C92, 0x0CA8, 1596),
    (0x0CAA, 0x0CB3, 1619),
    (0x0CB5, 0x0CB9, 1629),
    (0x0CBD, 0x0CBD, 1634),
    (0x0CDE, 0x0CDE, 1635),
    (0x0CE0, 0x0CE1, 1636),
    (0x0CE6, 0x0CEF, 1638),
    (0x0CF1, 0x0CF2, 1648),
    (0x0D05, 0x0D0C, 1650),
    (0x0D0E, 0x0D10, 1658),
    (0x0D12, 0x0D3A, 1661),
    (0x0D3D, 0x0D3D, 1702),
    (0x0D4E, 0x0D4E, 1703),
    (0x0D54, 0x0D56, 1704),
    (0x0D58, 0x0D61, 1707),
    (0x0D66, 0x0D78, 1717),
    (0x0D7A, 0x0D7F, 1736),
    (0x0D85, 0x0D96, 1742),
    (0x0D9A, 0x0DB1, 1760),
    (0x0DB3, 0x0DBB, 1784),
    (0x0DBD, 0x0DBD, 1793),
    (0x0DC0, 0x0DC6, 1794),
    (0x0DE6, 0x0DEF, 1801),
    (0x0E01, 0x0E30, 1811),
    (0x0E32, 0x0E32, 1859),
    (0x0E40, 0x0E45, 1860),
    (0x0E50, 0x0E59, 1866),
    (0x0E81, 0x0E82, 1876),
    (0x0E84, 0x0E84, 1878),
    (0x0E87, 0x0E88, 1879),
    (0x0E8A, 0x0E8A, 1881),
    (0x0E8D, 0x0E8D, 1882),
    (0x0E94, 0x0E97, 1883),
    (0x0E99, 0x0E9F, 1887),
    (0x0EA1, 0x0EA3, 1894),
    (0x0EA5, 0x0EA5, 1897),
    (0x0EA7, 0x0EA7, 1898),
    (0x0EAA, 0x0EAB, 1899),
    (0x0EAD, 0x0EB0, 1901),
    (0x0EB2, 0x0EB2, 1905),
    (0x0EBD, 0x0EBD, 1906),
    (0x0EC0, 0x0EC4, 1907),
    (0x0ED0, 0x0ED9, 1912),
    (0x0EDE, 0x0EDF, 1922),
    (0x0F00, 0x0F00, 1924),
    (0x0F20, 0x0F33, 1925),
    (0x0F40, 0x0F42, 1945),
    (0x0F44, 0x0F47, 1948),
    (0x0F49, 0x0F4C, 1952),
    (0x0F4E, 0x0F51, 1956),
    (0x0F53, 0x0F56, 1960),
    (0x0F58, 0x0F5B, 1964),
    (0x0F5D, 0x0F68, 1968),
    (0x0F6A, 0x0F6C, 1980),
    (0x0F88, 0x0F8C, 1983),
    (0x1000, 0x1025, 1988),
    (0x1027, 0x102A, 2026),
    (0x103F, 0x1049, 2030),
    (0x1050, 0x1055, 2041),
    (0x105A, 0x105A, 2047),
];

const BASE2048_BITS: u32 = 11;
const BASE2048_TAIL_BITS: u32 = 3;
const BASE2048_TAIL: [char; 8] = ['0', '1', '2', '3', '4', '5', '6', '7'];

fn ones(bits: u32) -> u32 {
    (1 << bits) - 1
}

fn main_char(index: u32) -> char {
    let pos = BASE2048_RANGES.partition_point(|&(_, _, first)| first <= index) - 1;
    let (start, _, first) = BASE2048_RANGES[pos];
    // Every range lies below the surrogate block.
    char::from_u32(start + index - first).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn main_index(ch: char) -> Option<u32> {
    let code = u32::from(ch);
    let pos = BASE2048_RANGES.partition_point(|&(start, _, _)| start <= code);
    let (start, end, first) = *BASE2048_RANGES.get(pos.checked_sub(1)?)?;
    (code <= end).then(|| first + code - start)
}

fn tail_index(ch: char) -> Option<u32> {
    BASE2048_TAIL.iter().position(|&c| c == ch).map(|i| i as u32)
}

/// Encode bytes as base2048.
pub fn base2048_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 / 11 + 1) * 3);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= BASE2048_BITS {
            bits -= BASE2048_BITS;
            out.push(main_char((acc >> bits) & ones(BASE2048_BITS)));
        }
        acc &= ones(bits);
    }

    if bits > 0 {
        if bits <= BASE2048_TAIL_BITS {
            let pad = BASE2048_TAIL_BITS - bits;
            out.push(BASE2048_TAIL[((acc << pad) | ones(pad)) as usize]);
        } else {
            let pad = BASE2048_BITS - bits;
            out.push(main_char((acc << pad) | ones(pad)));
        }
    }

    out
}

/// Decode base2048 text. Foreign characters, a tail digit that is not last,
/// or padding bits that are not all ones are format errors.
pub fn base2048_decode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 11 / 16 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(index) = main_index(ch) {
            acc = (acc << BASE2048_BITS) | index;
            bits += BASE2048_BITS;
        } else if let Some(index) = tail_index(ch) {
            if chars.peek().is_some() {
                return Err(EnvelopeError::format("base2048 tail digit before end of text"));
            }
            acc = (acc << BASE2048_TAIL_BITS) | index;
            bits += BASE2048_TAIL_BITS;
        } else {
            return Err(EnvelopeError::format(format!(
                "character U+{:04X} is not in the base2048 repertoire",
                u32::from(ch)
            )));
        }

        while bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xff) as u8);
        }
        acc &= ones(bits);
    }

    if acc != ones(bits) {
        return Err(EnvelopeError::format("base2048 padding bits are not all ones"));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64url_alphabet_detection() {
        assert!(is_base64url("abcXYZ019-_"));
        assert!(!is_base64url(""));
        assert!(!is_base64url("abc+/"));
        assert!(!is_base64url("abc="));
        assert!(!is_base64url(&base2048_encode(b"hello")));
    }

    #[test]
    fn test_base64url_accepts_padding() {
        assert_eq!(base64url_decode("aGk").unwrap(), b"hi");
        assert_eq!(base64url_decode("aGk=").unwrap(), b"hi");
        assert_eq!(base64url_encode(b"hi"), "aGk");
        assert!(base64url_decode("a+b/").is_err());
    }

    #[test]
    fn test_repertoire_table_is_contiguous() {
        let mut next = 0;
        let mut prev_end = 0;
        for &(start, end, first) in BASE2048_RANGES.iter() {
            assert!(start <= end && (first == 0 || start > prev_end));
            assert_eq!(first, next);
            next += end - start + 1;
            prev_end = end;
        }
        assert_eq!(next, 1 << BASE2048_BITS);
        assert!(prev_end < 0x1100);
    }

    #[test]
    fn test_repertoire_lookup_is_a_bijection() {
        for index in 0..(1 << BASE2048_BITS) {
            let ch = main_char(index);
            assert_eq!(main_index(ch), Some(index), "index {index}");
            assert!(tail_index(ch).is_none());
        }
        assert_eq!(main_char(0), '8');
        assert_eq!(main_char(2), 'A');
        assert_eq!(main_char(28), 'a');
        assert_eq!(main_char(2047), '\u{105A}');
        assert_eq!(main_index('\u{03C2}'), None);
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(base2048_encode(b""), "");
        assert_eq!(base2048_encode(&[0x05]), "t");
        assert_eq!(base2048_encode(&[0x06, 0x00]), "u\u{0110}");
        assert_eq!(base2048_encode(&[1, 2, 3]), "G\u{01B7}7");
        assert_eq!(
            base2048_encode(b"hello"),
            "\u{06B6}\u{03E1}\u{0272}\u{0DBA}"
        );
        assert_eq!(base2048_decode("G\u{01B7}7").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_base2048_roundtrip_all_lengths() {
        let data: Vec<u8> = (0..=255u8).collect();
        for len in 0..64 {
            let slice = &data[..len];
            let text = base2048_encode(slice);
            assert_eq!(base2048_decode(&text).unwrap(), slice, "len {len}");
        }
    }

    #[test]
    fn test_base2048_is_shorter_than_base64url() {
        let data = vec![0xa5u8; 300];
        assert!(base2048_encode(&data).chars().count() < base64url_encode(&data).len());
    }

    #[test]
    fn test_base2048_rejects_foreign_and_misplaced_chars() {
        assert!(base2048_decode("ab-c").is_err());
        assert!(base2048_decode("\u{4E00}").is_err());
        assert!(base2048_decode("7A").is_err());
    }

    #[test]
    fn test_base2048_rejects_zero_padding() {
        // One main char carrying 0x00 must pad with ones, not zeros.
        assert!(base2048_decode("8").is_err());
        assert!(base2048_decode("9").is_err());
    }

    proptest! {
        #[test]
        fn base2048_roundtrips(data in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(base2048_decode(&base2048_encode(&data)).unwrap(), data);
        }

        #[test]
        fn base2048_decode_never_panics(text in "\\PC{0,64}") {
            let _ = base2048_decode(&text);
        }
    }
}
