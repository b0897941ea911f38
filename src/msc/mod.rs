//! The Multi-Stream Codec (MSC): frames N independent zlib streams into one
//! self-delimiting byte blob, so bytes controlled by one principal never
//! share a compression dictionary with another's.

mod decoder;
mod encoder;
mod escape;

pub use decoder::MscDecoder;
pub use encoder::MscEncoder;

use crate::error::{Error, Result};

/// Default stream-switch delimiter: `[|`. Must not occur in any plaintext
/// fed to [`MscEncoder::compress`].
pub const DEFAULT_STREAM_SWITCH_DELIM: &[u8] = &[0x5B, 0x7C];

/// Default output-frame delimiter: a single byte that can never occur
/// unescaped in a framed record.
pub const DEFAULT_OUTPUT_DELIM: u8 = 0x7F;

/// Tunables for an [`MscEncoder`]/[`MscDecoder`] pair. Both ends of a given
/// blob must use the same options.
#[derive(Debug, Clone)]
pub struct MscOptions {
    /// Byte sequence appended after every `compress()` call's data, used to
    /// recover per-call boundaries inside a stream's decompressed plaintext.
    pub stream_switch_delim: Vec<u8>,
    /// Single byte used to delimit records at the framed-blob level.
    pub output_delim: u8,
    /// zlib compression level (0-9), passed through to each
    /// [`crate::stream::CompressionStream`].
    pub compression_level: u32,
}

impl Default for MscOptions {
    fn default() -> Self {
        Self {
            stream_switch_delim: DEFAULT_STREAM_SWITCH_DELIM.to_vec(),
            output_delim: DEFAULT_OUTPUT_DELIM,
            compression_level: flate2::Compression::default().level(),
        }
    }
}

impl MscOptions {
    /// Validates invariant 5: the stream-switch delimiter contains no
    /// duplicate bytes, so a stray single byte next to it can never be
    /// mistaken for the full delimiter.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for &b in &self.stream_switch_delim {
            if !seen.insert(b) {
                return Err(Error::DelimiterNotUnique(self.stream_switch_delim.clone()));
            }
        }
        Ok(())
    }
}

/// Encodes a sequence of `(bucket, data)` fragments with default options.
/// Equivalent to `MscEncoder::new(MscOptions::default())` fed in order and
/// then finished.
pub fn msc_encode(fragments: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut encoder = MscEncoder::new(MscOptions::default())?;
    for (bucket, data) in fragments {
        encoder.compress(bucket, data)?;
    }
    encoder.finish()
}

/// Decodes a blob produced by [`msc_encode`] (or an [`MscEncoder`] using
/// default options) back into the original concatenation of fragment data.
pub fn msc_decode(blob: &[u8]) -> Result<Vec<u8>> {
    MscDecoder::new(MscOptions::default()).decode(blob)
}
