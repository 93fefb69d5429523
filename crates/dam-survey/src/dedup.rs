//! Content-hash duplicate detection.
//!
//! Field cameras and manual copying produced byte-identical files under
//! different names. Hashing the full contents finds them regardless of
//! what the EXIF or the file name claims.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Byte-identical files sharing one digest.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateSet {
    pub digest: String,
    pub paths: Vec<PathBuf>,
}

/// SHA-256 of a file's contents, streamed in 64 KiB blocks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Group byte-identical files under `root`. Hidden files are skipped; every
/// other file is hashed regardless of extension.
pub fn find_content_duplicates(root: &Path) -> Result<Vec<DuplicateSet>> {
    let mut by_digest: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let mut hashed = 0usize;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        match hash_file(entry.path()) {
            Ok(digest) => {
                by_digest.entry(digest).or_default().push(entry.into_path());
                hashed += 1;
            }
            Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping file"),
        }
    }

    let mut sets: Vec<DuplicateSet> = by_digest
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(digest, paths)| DuplicateSet { digest, paths })
        .collect();
    sets.sort_by(|a, b| {
        b.paths
            .len()
            .cmp(&a.paths.len())
            .then_with(|| a.digest.cmp(&b.digest))
    });
    info!(files = hashed, duplicate_sets = sets.len(), "content hashing complete");
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn identical_files_group_together() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/one.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("b/two.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("b/other.jpg"), b"different bytes").unwrap();

        let sets = find_content_duplicates(dir.path()).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].paths.len(), 2);
    }

    #[test]
    fn hash_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        fs::write(&path, b"abc").unwrap();
        let a = hash_file(&path).unwrap();
        let b = hash_file(&path).unwrap();
        assert_eq!(a, b);
        // SHA-256 of "abc", a fixed vector.
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn unique_files_produce_no_sets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.jpg"), b"aaa").unwrap();
        fs::write(dir.path().join("two.jpg"), b"bbb").unwrap();
        let sets = find_content_duplicates(dir.path()).unwrap();
        assert!(sets.is_empty());
    }
}
