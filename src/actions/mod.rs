// src/actions/mod.rs

//! Leaf actions.
//!
//! An [`Action`] is the opaque unit of work behind a leaf task. It resolves
//! its file sets through the [`FileMatcher`] it is handed, right when it
//! runs, so inputs are always fresh. It then reads them, writes its outputs
//! and reports what it touched.
//!
//! Built-in kinds:
//! - [`clean`]: delete matched files and directories.
//! - [`compile`]: run an external tool (style compiler, linter, ...).
//! - [`concat`]: `minify` and `bundle`, which join inputs into one output
//!   per target and optionally pipe the result through an external tool.
//!
//! [`tool`] holds the process plumbing shared by the tool-backed kinds.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::config::model::{OutputSpec, TaskSpec};
use crate::dag::TaskOptions;
use crate::fs::{FileMatcher, FileSet, FileSystem};

pub mod clean;
pub mod compile;
pub mod concat;
pub mod tool;

pub use clean::CleanAction;
pub use compile::CompileAction;
pub use concat::ConcatAction;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything an action gets for one invocation.
pub struct ActionInput<'a> {
    /// Name of the leaf task being executed.
    pub task: &'a str,
    pub matcher: &'a FileMatcher,
    pub options: &'a TaskOptions,
}

impl ActionInput<'_> {
    pub fn base_dir(&self) -> &Path {
        self.matcher.base_dir()
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.matcher.fs().as_ref()
    }

    /// Resolve `files` against the base directory.
    pub fn resolve(&self, files: &FileSet) -> Result<Vec<PathBuf>> {
        self.matcher.matches(files.patterns())
    }
}

/// Paths an action wrote or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Trait implemented by every leaf action.
///
/// Implementations must be idempotent: running twice with unchanged inputs
/// and options produces byte-identical outputs.
pub trait Action: Send + Sync {
    /// Kind label used in listings and logs (e.g. `"clean"`).
    fn kind(&self) -> &str;

    /// One-line description of what the action reads and writes, for
    /// listings.
    fn summary(&self) -> String;

    fn execute<'a>(&'a self, input: ActionInput<'a>) -> BoxFuture<'a, Result<ActionOutput>>;
}

/// Build the action for a leaf task spec. Returns `None` for aliases.
pub fn from_spec(spec: &TaskSpec) -> Option<Arc<dyn Action>> {
    let action: Arc<dyn Action> = match spec {
        TaskSpec::Alias { .. } => return None,
        TaskSpec::Clean(s) => Arc::new(CleanAction::new(FileSet::new(s.files.clone()))),
        TaskSpec::Compile(s) => Arc::new(CompileAction::new(
            s.cmd.clone(),
            FileSet::new(s.files.clone()),
        )),
        TaskSpec::Minify(s) => Arc::new(with_targets(
            ConcatAction::minify(s.cmd.clone()),
            &s.output,
        )),
        TaskSpec::Bundle(s) => {
            let mut action = with_targets(ConcatAction::bundle(s.cmd.clone()), &s.output);
            if let Some(sep) = &s.separator {
                action = action.with_separator(sep.clone());
            }
            if let Some(banner) = &s.banner {
                action = action.with_banner(banner.clone());
            }
            Arc::new(action)
        }
    };
    Some(action)
}

fn with_targets(action: ConcatAction, output: &OutputSpec) -> ConcatAction {
    output
        .targets()
        .into_iter()
        .fold(action, |action, (dest, files)| {
            action.with_target(dest, FileSet::new(files.iter().cloned()))
        })
}
