//! Glue wiring each format-aware partitioner into the Multi-Stream Codec (or,
//! for the filesystem case, into [`crate::dedup`]) — the shape an embedding
//! application actually calls.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::msc::{MscDecoder, MscEncoder, MscOptions};
use crate::principal::{AccessControlPolicy, PartitionPolicy};

#[cfg(feature = "sqlite")]
use crate::partition::coalesce_adjacent;
#[cfg(feature = "sqlite")]
use crate::partition::sqlite::{partition_sqlite, SqliteDataUnit, SqlitePartitionOptions};
#[cfg(feature = "xml")]
use crate::partition::xml::{partition_xml, XmlDataUnit};
#[cfg(feature = "filesystem")]
use crate::partition::filesystem::{partition_fs, FsDataUnit};
#[cfg(feature = "filesystem")]
use crate::dedup::{checksum_comparison_function, dedup};

/// Partitions a SQLite database by row and compresses the result with an
/// [`MscEncoder`]. The companion of [`decompress_sqlite`].
#[cfg(feature = "sqlite")]
pub fn compress_sqlite(
    db_path: impl AsRef<Path>,
    access_control: &AccessControlPolicy<'_, SqliteDataUnit>,
    partition: &PartitionPolicy<'_>,
) -> Result<Vec<u8>> {
    let fragments = partition_sqlite(db_path, &SqlitePartitionOptions::default(), access_control, partition)?;
    encode_fragments(coalesce_adjacent(fragments))
}

/// Reverses [`compress_sqlite`], returning the original database file bytes.
#[cfg(feature = "sqlite")]
pub fn decompress_sqlite(blob: &[u8]) -> Result<Vec<u8>> {
    MscDecoder::new(MscOptions::default()).decode(blob)
}

/// Partitions an XML document by element and compresses the result with an
/// [`MscEncoder`]. The companion of [`decompress_xml`].
#[cfg(feature = "xml")]
pub fn compress_xml(
    xml: &[u8],
    access_control: &AccessControlPolicy<'_, XmlDataUnit>,
    partition: &PartitionPolicy<'_>,
) -> Result<Vec<u8>> {
    let fragments = partition_xml(xml, access_control, partition)?;
    encode_fragments(fragments)
}

/// Reverses [`compress_xml`], returning the original document bytes.
#[cfg(feature = "xml")]
pub fn decompress_xml(blob: &[u8]) -> Result<Vec<u8>> {
    MscDecoder::new(MscOptions::default()).decode(blob)
}

#[cfg(any(feature = "sqlite", feature = "xml"))]
fn encode_fragments(fragments: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut encoder = MscEncoder::new(MscOptions::default())?;
    for (bucket, data) in fragments {
        encoder.compress(&bucket, &data)?;
    }
    encoder.finish()
}

/// Deduplicates the regular files under `root`, restricted to comparisons
/// within the same bucket (spec invariant: dedup never merges files two
/// different principals could read identically-classified-but-distinct
/// copies of). Returns the surviving paths, grouped by bucket in first-seen
/// order.
#[cfg(feature = "filesystem")]
pub fn dedup_files(
    root: impl AsRef<Path>,
    access_control: &AccessControlPolicy<'_, FsDataUnit>,
    partition: &PartitionPolicy<'_>,
) -> Result<Vec<PathBuf>> {
    let bucketed = partition_fs(root, access_control, partition)?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<PathBuf>> = std::collections::HashMap::new();
    for (bucket, path) in bucketed {
        if !groups.contains_key(&bucket) {
            order.push(bucket.clone());
        }
        groups.entry(bucket).or_default().push(path);
    }

    let mut deduped = Vec::new();
    for bucket in order {
        let paths = groups.remove(&bucket).expect("bucket recorded in order");
        deduped.extend(dedup(|p| checksum_comparison_function(p), &paths)?);
    }

    log::info!("dedup_files: {} file(s) survive deduplication", deduped.len());
    Ok(deduped)
}

#[cfg(all(test, feature = "filesystem"))]
mod tests {
    use super::*;
    use crate::partition::filesystem::owner_prefix_principal;
    use crate::principal::attribute_partition_policy;
    use tempfile::tempdir;

    #[test]
    fn dedup_files_keeps_one_copy_per_bucket_equivalence_class() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("alice_1.txt"), b"same content").unwrap();
        std::fs::write(dir.path().join("alice_2.txt"), b"same content").unwrap();
        std::fs::write(dir.path().join("bob_1.txt"), b"same content").unwrap();

        let access = |du: &FsDataUnit| owner_prefix_principal(du);
        let partition = attribute_partition_policy("owner");
        let deduped = dedup_files(dir.path(), &access, &partition).unwrap();

        // alice's two identical files collapse to one; bob's copy survives
        // separately even though the bytes are identical, since dedup never
        // crosses a bucket boundary.
        assert_eq!(deduped.len(), 2);
    }
}
