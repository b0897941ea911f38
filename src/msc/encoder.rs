use std::collections::HashMap;

use super::{MscOptions, escape::escape_output_delim};
use crate::{
    error::{Error, Result},
    principal::BucketLabel,
    stream::CompressionStream,
};

/// Multiplexes many independent zlib streams, one per bucket, into a single
/// framed blob. A bucket's compressor never observes bytes from another
/// bucket (isolation, spec invariant 2).
pub struct MscEncoder {
    options: MscOptions,
    streams: HashMap<BucketLabel, CompressionStream>,
    /// Buckets in first-use order; the order `finish` flushes streams in.
    first_seen: Vec<BucketLabel>,
    /// Every bucket label passed to `compress`, in call order. Carried in
    /// the blob's JSON header so the decoder can reconstruct global order.
    stream_switch: Vec<BucketLabel>,
    finished: bool,
}

impl MscEncoder {
    /// Builds a new encoder. Fails if `options.stream_switch_delim` contains
    /// a duplicate byte.
    pub fn new(options: MscOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            streams: HashMap::new(),
            first_seen: Vec::new(),
            stream_switch: Vec::new(),
            finished: false,
        })
    }

    /// Compresses `data` into `bucket`'s stream. Fails with
    /// [`Error::DelimiterInData`] if `data` contains the stream-switch
    /// delimiter, and with [`Error::StreamClosed`] once `finish` has run.
    pub fn compress(&mut self, bucket: &str, data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::StreamClosed);
        }
        if contains_subsequence(data, &self.options.stream_switch_delim) {
            return Err(Error::DelimiterInData);
        }
        if !self.streams.contains_key(bucket) {
            log::debug!("msc encoder: opening stream for bucket {bucket:?}");
            self.streams.insert(
                bucket.to_string(),
                CompressionStream::with_level(self.options.compression_level),
            );
            self.first_seen.push(bucket.to_string());
        }
        self.stream_switch.push(bucket.to_string());

        let mut payload = Vec::with_capacity(data.len() + self.options.stream_switch_delim.len());
        payload.extend_from_slice(data);
        payload.extend_from_slice(&self.options.stream_switch_delim);

        self.streams
            .get_mut(bucket)
            .expect("stream was just inserted above")
            .compress(&payload)
    }

    /// Flushes every stream and assembles the framed blob. Consuming-by-`&mut`
    /// so the encoder can be inspected for diagnostics before the borrow is
    /// dropped; a second call fails with [`Error::StreamClosed`].
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.finished {
            return Err(Error::StreamClosed);
        }
        self.finished = true;

        let header = serde_json::to_vec(&self.stream_switch)
            .map_err(|e| Error::other(format!("failed to serialize stream_switch: {e}")))?;

        let mut out = Vec::new();
        out.extend_from_slice(&header);
        out.push(self.options.output_delim);

        for bucket in &self.first_seen {
            let stream = self.streams.get_mut(bucket).expect("bucket recorded in first_seen");
            let compressed = stream.finish()?;
            let escaped = escape_output_delim(&compressed, self.options.output_delim);
            out.extend_from_slice(&escaped);
            out.push(self.options.output_delim);
        }

        log::info!(
            "msc encoder: finished with {} stream(s), {} compress() call(s), {} output byte(s)",
            self.first_seen.len(),
            self.stream_switch.len(),
            out.len()
        );
        Ok(out)
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
