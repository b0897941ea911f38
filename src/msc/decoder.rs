use std::collections::{HashMap, VecDeque};

use super::{MscOptions, escape::unescape_output_delim};
use crate::{
    error::{Error, Result},
    principal::BucketLabel,
    stream::DecompressionStream,
};

/// Parses a blob produced by [`super::MscEncoder`] and demultiplexes it back
/// into the original byte sequence, in the order `compress` was called.
pub struct MscDecoder {
    options: MscOptions,
}

impl MscDecoder {
    pub fn new(options: MscOptions) -> Self {
        Self { options }
    }

    /// Decodes a full framed blob in one call.
    pub fn decode(&self, blob: &[u8]) -> Result<Vec<u8>> {
        let mut records = blob.split(|&b| b == self.options.output_delim);
        let header = records.next().unwrap_or(&[]);
        let stream_switch: Vec<BucketLabel> =
            serde_json::from_slice(header).map_err(Error::MalformedHeader)?;

        let mut order: Vec<BucketLabel> = Vec::new();
        for bucket in &stream_switch {
            if !order.contains(bucket) {
                order.push(bucket.clone());
            }
        }

        let records: Vec<&[u8]> = records.collect();
        // The blob ends with a trailing OUTPUT_DELIM, so the final split
        // segment is always an empty sentinel; drop it.
        let records = match records.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        };
        if records.len() != order.len() {
            return Err(Error::Other(
                format!(
                    "expected {} stream record(s), found {}",
                    order.len(),
                    records.len()
                )
                .into(),
            ));
        }

        let mut streams: HashMap<BucketLabel, DecompressionStream> = HashMap::new();
        for (bucket, record) in order.iter().zip(records.iter().copied()) {
            let stream = streams.entry(bucket.clone()).or_insert_with(DecompressionStream::new);
            let unescaped = unescape_output_delim(record, self.options.output_delim)?;
            stream.decompress(&unescaped)?;
        }

        log::debug!(
            "msc decoder: parsed {} stream record(s), {} compress() call(s) in stream_switch",
            order.len(),
            stream_switch.len()
        );

        let mut queues: HashMap<BucketLabel, VecDeque<Vec<u8>>> = HashMap::new();
        for (bucket, mut stream) in streams {
            let plaintext = stream.finish()?;
            let fragments = split_on_subsequence(&plaintext, &self.options.stream_switch_delim);
            queues.insert(bucket, fragments.into());
        }

        let mut output = Vec::new();
        for bucket in &stream_switch {
            let queue = queues
                .get_mut(bucket)
                .ok_or_else(|| Error::Other(format!("no stream for bucket {bucket:?}").into()))?;
            let fragment = queue
                .pop_front()
                .ok_or_else(|| Error::Other(format!("stream for bucket {bucket:?} ran out of fragments").into()))?;
            output.extend_from_slice(&fragment);
        }

        log::info!("msc decoder: finished, {} output byte(s)", output.len());
        Ok(output)
    }
}

/// Splits `data` on every non-overlapping occurrence of `delim`, the way a
/// per-call boundary marker slices a stream's flushed plaintext back into
/// the fragments that were fed to `compress`.
fn split_on_subsequence(data: &[u8], delim: &[u8]) -> Vec<Vec<u8>> {
    if delim.is_empty() {
        return vec![data.to_vec()];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + delim.len() <= data.len() {
        if &data[i..i + delim.len()] == delim {
            pieces.push(data[start..i].to_vec());
            i += delim.len();
            start = i;
        } else {
            i += 1;
        }
    }
    pieces.push(data[start..].to_vec());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_header_is_rejected() {
        let decoder = MscDecoder::new(MscOptions::default());
        let blob = b"not json".to_vec();
        assert!(matches!(decoder.decode(&blob), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn split_on_subsequence_handles_runs_and_absence() {
        assert_eq!(
            split_on_subsequence(b"a[|b[|c", b"[|"),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(split_on_subsequence(b"abc", b"[|"), vec![b"abc".to_vec()]);
    }
}
