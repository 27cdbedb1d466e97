// src/actions/clean.rs

use anyhow::Result;
use tracing::{debug, info};

use crate::actions::{Action, ActionInput, ActionOutput, BoxFuture};
use crate::fs::FileSet;

/// Deletes every matched file and directory.
///
/// Paths are processed in matcher order, so a directory comes before its
/// own children; children already removed with their parent are skipped.
/// Nothing matched means nothing to do.
#[derive(Debug, Clone)]
pub struct CleanAction {
    files: FileSet,
}

impl CleanAction {
    pub fn new(files: FileSet) -> Self {
        Self { files }
    }
}

impl Action for CleanAction {
    fn kind(&self) -> &str {
        "clean"
    }

    fn summary(&self) -> String {
        self.files.patterns().join(", ")
    }

    fn execute<'a>(&'a self, input: ActionInput<'a>) -> BoxFuture<'a, Result<ActionOutput>> {
        Box::pin(async move {
            let mut output = ActionOutput::default();
            let fs = input.fs();

            for path in input.resolve(&self.files)? {
                if fs.is_dir(&path) {
                    fs.remove_dir_all(&path)?;
                } else if fs.is_file(&path) {
                    fs.remove_file(&path)?;
                } else {
                    debug!(task = %input.task, ?path, "already removed");
                    continue;
                }
                output.removed.push(path);
            }

            info!(task = %input.task, removed = output.removed.len(), "clean finished");
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::dag::TaskOptions;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::{FileMatcher, FileSystem};

    #[tokio::test]
    async fn removes_matched_entries_only() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/p/.tmp/css/style.css", b"x".to_vec());
        fs.add_file("/p/.tmp/js/main.js", b"y".to_vec());
        fs.add_file("/p/css/keep.css", b"k".to_vec());

        let action = CleanAction::new(FileSet::new([".tmp/*"]));
        let matcher = FileMatcher::new("/p", fs.clone());
        let options = TaskOptions::new();

        let out = action
            .execute(ActionInput {
                task: "clean",
                matcher: &matcher,
                options: &options,
            })
            .await
            .unwrap();

        assert_eq!(
            out.removed,
            vec![PathBuf::from("/p/.tmp/css"), PathBuf::from("/p/.tmp/js")]
        );
        assert_eq!(fs.file_paths(), vec![PathBuf::from("/p/css/keep.css")]);
        assert!(fs.is_dir(Path::new("/p/.tmp")));
    }

    #[tokio::test]
    async fn nothing_matched_is_success() {
        let matcher = FileMatcher::new("/p", Arc::new(MockFileSystem::new()));
        let options = TaskOptions::new();
        let out = CleanAction::new(FileSet::new(["out/*"]))
            .execute(ActionInput {
                task: "clean",
                matcher: &matcher,
                options: &options,
            })
            .await
            .unwrap();
        assert!(out.removed.is_empty());
    }
}
