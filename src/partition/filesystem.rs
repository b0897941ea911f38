//! Filesystem partitioner: walks a directory tree in deterministic order and
//! classifies each regular file. Round-trip is not required for this
//! format — its output feeds [`crate::dedup`], not the MSC.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    error::Result,
    principal::{AccessControlPolicy, BucketLabel, PartitionPolicy, Principal},
};

/// The data unit classified by the filesystem partitioner: an absolute path
/// plus its leaf (file) name.
#[derive(Debug, Clone)]
pub struct FsDataUnit {
    pub path: PathBuf,
    pub file_name: String,
}

/// Walks `root` in lexicographic order at every directory level and emits
/// `(bucket, path)` for every regular file encountered.
pub fn partition_fs(
    root: impl AsRef<Path>,
    access_control: &AccessControlPolicy<'_, FsDataUnit>,
    partition: &PartitionPolicy<'_>,
) -> Result<Vec<(BucketLabel, PathBuf)>> {
    let mut fragments = Vec::new();
    let walker = WalkDir::new(root.as_ref())
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter();

    for entry in walker {
        let entry = entry.map_err(|e| crate::error::Error::other(format!("walk error: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let data_unit = FsDataUnit {
            path: path.clone(),
            file_name,
        };
        let principal = access_control(&data_unit);
        let bucket = partition(&principal);
        fragments.push((bucket, path));
    }

    log::debug!("filesystem partitioner: emitted {} fragment(s)", fragments.len());
    Ok(fragments)
}

/// A [`Principal`] derived purely from a path prefix, useful for tests and
/// simple demos: files named `<prefix>_...` belong to a principal whose
/// `owner` attribute is `<prefix>`.
pub fn owner_prefix_principal(data_unit: &FsDataUnit) -> Principal {
    let owner = data_unit
        .file_name
        .split('_')
        .next()
        .unwrap_or(&data_unit.file_name)
        .to_string();
    Principal::new([("owner".to_string(), owner.into())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::attribute_partition_policy;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_in_lexicographic_order_and_skips_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), b"c").unwrap();

        let access = |du: &FsDataUnit| owner_prefix_principal(du);
        let partition = attribute_partition_policy("owner");
        let fragments = partition_fs(dir.path(), &access, &partition).unwrap();

        let names: Vec<String> = fragments
            .iter()
            .map(|(_, p)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }
}
