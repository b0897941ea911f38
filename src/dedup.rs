//! Deduplication restricted to comparisons within a single partition: two
//! paths are interchangeable only if a caller-supplied comparison function
//! agrees on both of them, and only the first occurrence (in walk order) of
//! each equivalence class survives.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const CHECKSUM_CHUNK_SIZE: usize = 64 * 1024;

/// Groups `paths` by `comparison` and keeps only the first path seen in each
/// group, in the input's original order.
pub fn dedup<F>(mut comparison: F, paths: &[PathBuf]) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> Result<String>,
{
    let mut first_seen_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, PathBuf> = HashMap::new();

    for path in paths {
        let key = comparison(path)?;
        if !groups.contains_key(&key) {
            first_seen_order.push(key.clone());
            groups.insert(key, path.clone());
        }
    }

    let deduped: Vec<PathBuf> = first_seen_order
        .into_iter()
        .map(|key| groups.remove(&key).expect("key was just inserted"))
        .collect();

    log::debug!(
        "dedup: {} input path(s) reduced to {} after grouping",
        paths.len(),
        deduped.len()
    );
    Ok(deduped)
}

/// A [`dedup`] comparison function: the SHA-256 digest of a file's contents,
/// read in fixed-size chunks so memory use doesn't scale with file size.
pub fn checksum_comparison_function(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::file_open(e, path.display().to_string()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHECKSUM_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keeps_first_occurrence_of_each_equivalence_class() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        std::fs::write(&a, b"same").unwrap();
        std::fs::write(&b, b"same").unwrap();
        std::fs::write(&c, b"different").unwrap();

        let paths = vec![a.clone(), b, c.clone()];
        let deduped = dedup(|p| checksum_comparison_function(p), &paths).unwrap();

        assert_eq!(deduped, vec![a, c]);
    }

    #[test]
    fn empty_input_dedups_to_empty() {
        let deduped = dedup(|p| checksum_comparison_function(p), &[]).unwrap();
        assert!(deduped.is_empty());
    }

    #[test]
    fn checksum_matches_known_sha256_of_empty_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let digest = checksum_comparison_function(&path).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
