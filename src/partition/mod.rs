//! Format-aware partitioners: each walks one input format and splits it into
//! `(bucket, bytes)` fragments, in source order, ready to feed to
//! [`crate::msc::MscEncoder`].

#[cfg(feature = "filesystem")]
pub mod filesystem;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "xml")]
pub mod xml;

use crate::principal::BucketLabel;

/// Merges consecutive fragments that share a bucket into one, amortizing MSC
/// framing overhead.
#[cfg_attr(not(any(feature = "sqlite", feature = "xml")), allow(dead_code))]
pub(crate) fn coalesce_adjacent(fragments: Vec<(BucketLabel, Vec<u8>)>) -> Vec<(BucketLabel, Vec<u8>)> {
    let mut out: Vec<(BucketLabel, Vec<u8>)> = Vec::with_capacity(fragments.len());
    for (bucket, data) in fragments {
        if let Some(last) = out.last_mut() {
            if last.0 == bucket {
                last.1.extend_from_slice(&data);
                continue;
            }
        }
        out.push((bucket, data));
    }
    out
}
