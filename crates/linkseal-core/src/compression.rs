//! Plaintext compression applied before encryption.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression as GzLevel};

use crate::error::{EnvelopeError, Result};

/// Upper bound on decompressed plaintext.
pub const MAX_DECOMPRESSED_BYTES: u64 = 8 * 1024 * 1024;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_LG_WINDOW: u32 = 22;

/// Compression applied to the plaintext of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Brotli,
}

impl Compression {
    /// The tag used in JSON envelopes (`z` field).
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Brotli => Some("br"),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
                encoder
                    .write_all(data)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| EnvelopeError::Encryption(format!("gzip: {e}")))
            }
            Self::Brotli => {
                let mut writer = brotli::CompressorWriter::new(
                    Vec::new(),
                    BROTLI_BUFFER_SIZE,
                    BROTLI_QUALITY,
                    BROTLI_LG_WINDOW,
                );
                writer
                    .write_all(data)
                    .and_then(|_| writer.flush())
                    .map_err(|e| EnvelopeError::Encryption(format!("brotli: {e}")))?;
                Ok(writer.into_inner())
            }
        }
    }

    /// Inflate `data`. Corrupt input or output beyond
    /// [`MAX_DECOMPRESSED_BYTES`] is a format error.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => read_bounded(GzDecoder::new(data), "gzip"),
            Self::Brotli => read_bounded(brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE), "brotli"),
        }
    }
}

fn read_bounded<R: Read>(reader: R, name: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_BYTES + 1)
        .read_to_end(&mut out)
        .map_err(|e| EnvelopeError::format(format!("corrupt {name} payload: {e}")))?;
    if out.len() as u64 > MAX_DECOMPRESSED_BYTES {
        return Err(EnvelopeError::format(format!(
            "{name} payload exceeds {MAX_DECOMPRESSED_BYTES} bytes"
        )));
    }
    Ok(out)
}
