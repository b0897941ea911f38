//! Thin state machines around zlib's streaming compress/decompress objects.
//!
//! Each stream is a linear state machine: `Open -> Finished`. `compress`
//! (resp. `decompress`) accumulates; `finish` flushes the underlying codec
//! once and transitions the stream to `Finished`. Any further call fails
//! with [`Error::StreamClosed`].

use std::io::Write;

use flate2::{Compression, write::ZlibDecoder, write::ZlibEncoder};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finished,
}

/// Wraps zlib's streaming deflate in the default configuration (no gzip
/// header). Bytes pushed via [`CompressionStream::compress`] are not
/// necessarily flushed out immediately; [`CompressionStream::finish`]
/// returns the complete compressed output.
pub struct CompressionStream {
    encoder: ZlibEncoder<Vec<u8>>,
    state: State,
}

impl CompressionStream {
    /// Builds a stream at the given zlib compression level (0-9).
    pub fn with_level(level: u32) -> Self {
        Self {
            encoder: ZlibEncoder::new(Vec::new(), Compression::new(level)),
            state: State::Open,
        }
    }

    /// Feeds `data` into the compression stream.
    pub fn compress(&mut self, data: &[u8]) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::StreamClosed);
        }
        self.encoder.write_all(data).map_err(Error::io)?;
        Ok(())
    }

    /// Flushes and closes the stream, returning the complete zlib-compressed
    /// output accumulated so far.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.state == State::Finished {
            return Err(Error::StreamClosed);
        }
        self.state = State::Finished;
        let empty = ZlibEncoder::new(Vec::new(), Compression::default());
        let encoder = std::mem::replace(&mut self.encoder, empty);
        encoder.finish().map_err(Error::io)
    }
}

impl Default for CompressionStream {
    fn default() -> Self {
        Self::with_level(Compression::default().level())
    }
}

/// Dual of [`CompressionStream`]: accumulates compressed bytes, flushes
/// plaintext on [`DecompressionStream::finish`].
pub struct DecompressionStream {
    decoder: ZlibDecoder<Vec<u8>>,
    state: State,
}

impl DecompressionStream {
    pub fn new() -> Self {
        Self {
            decoder: ZlibDecoder::new(Vec::new()),
            state: State::Open,
        }
    }

    /// Feeds a chunk of compressed bytes into the decompression stream.
    pub fn decompress(&mut self, data: &[u8]) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::StreamClosed);
        }
        self.decoder.write_all(data).map_err(Error::io)?;
        Ok(())
    }

    /// Flushes and closes the stream, returning the complete plaintext
    /// accumulated so far.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.state == State::Finished {
            return Err(Error::StreamClosed);
        }
        self.state = State::Finished;
        let empty = ZlibDecoder::new(Vec::new());
        let decoder = std::mem::replace(&mut self.decoder, empty);
        decoder.finish().map_err(Error::io)
    }
}

impl Default for DecompressionStream {
    fn default() -> Self {
        Self::new()
    }
}
