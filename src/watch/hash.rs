// src/watch/hash.rs

//! Content hashing for `use_hash` watch groups.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, warn};

use crate::fs::{CompiledFileSet, FileMatcher, FileSystem};

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {path:?}"))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash the contents of `paths`, in the order given.
///
/// Directories are skipped. Each file contributes its path and its content
/// hash, so renames change the result as well as edits.
pub fn compute_aggregate_hash(fs: &dyn FileSystem, paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Hasher::new();
    for path in paths {
        if !fs.is_file(path) {
            continue;
        }
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(compute_file_hash(fs, path)?.as_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Remembers the aggregate hash of a group's files as of the last trigger.
#[derive(Debug)]
pub struct ContentHasher {
    matcher: FileMatcher,
    files: CompiledFileSet,
    baseline: Option<String>,
}

impl ContentHasher {
    pub fn new(matcher: FileMatcher, files: CompiledFileSet) -> Self {
        Self {
            matcher,
            files,
            baseline: None,
        }
    }

    fn current(&self) -> Result<String> {
        let paths = self.matcher.resolve(&self.files)?;
        compute_aggregate_hash(self.matcher.fs().as_ref(), &paths)
    }

    /// Record the current contents as the baseline.
    pub fn prime(&mut self) {
        match self.current() {
            Ok(hash) => self.baseline = Some(hash),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to compute initial hash"),
        }
    }

    /// Whether contents differ from the baseline. Updates the baseline.
    ///
    /// Hashing failures count as a change.
    pub fn changed(&mut self) -> bool {
        let hash = match self.current() {
            Ok(hash) => hash,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to hash watched files; treating as changed");
                self.baseline = None;
                return true;
            }
        };

        let changed = self.baseline.as_deref() != Some(hash.as_str());
        debug!(hash = %hash, changed, "computed aggregate hash");
        self.baseline = Some(hash);
        changed
    }
}
