// src/watch/path_utils.rs

//! Path helpers for turning watcher events into pattern input.

use std::path::Path;

/// `path` relative to `root`, with forward slashes.
///
/// Tries a plain prefix strip first. Watch backends sometimes report a
/// different absolute spelling of the same directory (symlinked temp dirs,
/// `/private/var` on macOS), so both sides are canonicalized as a fallback.
/// Returns `None` for paths outside `root` and for `root` itself.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let root = root.canonicalize().ok()?;
            let path = path.canonicalize().ok()?;
            path.strip_prefix(&root).ok()?.to_path_buf()
        }
    };

    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { None } else { Some(s) }
}
