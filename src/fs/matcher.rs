// src/fs/matcher.rs

//! Glob-style file matching.
//!
//! Patterns are evaluated against paths relative to a base directory, using
//! forward slashes. `*` stays inside one path segment, `**` crosses segments,
//! and a leading `!` removes whatever earlier patterns matched. Patterns apply
//! in order, so a path is selected iff the *last* pattern matching it is a
//! positive one.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::fs::FileSystem;

/// Ordered list of glob patterns declared by a task or watch group.
///
/// Only the patterns are stored; matches are recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    patterns: Vec<String>,
}

impl FileSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Compile the patterns into matchers.
    pub fn compile(&self) -> Result<CompiledFileSet> {
        CompiledFileSet::new(&self.patterns)
    }
}

#[derive(Clone)]
struct Rule {
    include: bool,
    matcher: GlobMatcher,
}

/// A [`FileSet`] whose patterns have been compiled.
#[derive(Clone, Default)]
pub struct CompiledFileSet {
    rules: Vec<Rule>,
}

impl fmt::Debug for CompiledFileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFileSet")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl CompiledFileSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pat in patterns {
            let (include, glob) = match pat.strip_prefix('!') {
                Some(rest) => (false, rest),
                None => (true, pat.as_str()),
            };
            let matcher = GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid glob pattern: {pat}"))?
                .compile_matcher();
            rules.push(Rule { include, matcher });
        }
        Ok(Self { rules })
    }

    /// Whether a relative path (forward slashes) is selected by this set.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(rel_path))
            .is_some_and(|rule| rule.include)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolves file sets to concrete paths under a base directory.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    base_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileMatcher {
    pub fn new(base_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fs,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolve `patterns` against the base directory.
    ///
    /// Returns `base_dir`-joined paths (files and directories), deduplicated
    /// and sorted by their relative path. An empty result is not an error.
    pub fn matches(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let compiled = CompiledFileSet::new(patterns)?;
        self.resolve(&compiled)
    }

    /// Same as [`FileMatcher::matches`] for an already compiled set.
    pub fn resolve(&self, set: &CompiledFileSet) -> Result<Vec<PathBuf>> {
        if set.is_empty() {
            return Ok(Vec::new());
        }

        let selected: BTreeSet<String> = self
            .relative_entries()?
            .into_iter()
            .filter(|rel| set.matches(rel))
            .collect();

        debug!(
            base = ?self.base_dir,
            matched = selected.len(),
            "resolved file set"
        );

        Ok(selected
            .into_iter()
            .map(|rel| self.base_dir.join(rel))
            .collect())
    }

    /// Every file and directory below the base directory, as relative
    /// forward-slash paths. Symlinked directories are listed but not
    /// entered, so link cycles cannot loop the walk.
    fn relative_entries(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        if !self.fs.is_dir(&self.base_dir) {
            return Ok(entries);
        }

        let mut stack = vec![self.base_dir.clone()];
        while let Some(dir) = stack.pop() {
            for path in self.fs.read_dir(&dir)? {
                let Ok(rel) = path.strip_prefix(&self.base_dir) else {
                    continue;
                };
                entries.push(rel.to_string_lossy().replace('\\', "/"));
                if self.fs.is_dir(&path) && !self.fs.is_symlink(&path) {
                    stack.push(path);
                }
            }
        }

        Ok(entries)
    }
}
