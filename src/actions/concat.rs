// src/actions/concat.rs

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::info;

use crate::actions::tool::{option_env_vars, run_tool};
use crate::actions::{Action, ActionInput, ActionOutput, BoxFuture};
use crate::fs::FileSet;

/// One output file and the patterns feeding it.
#[derive(Debug, Clone)]
pub struct ConcatTarget {
    /// Relative to the base directory.
    pub dest: PathBuf,
    pub files: FileSet,
}

/// Joins matched files, in matcher order, into one output file per target.
///
/// Backs two kinds:
/// - `minify`: the joined content is piped through a required external
///   minifier (`cmd` reads stdin, writes stdout).
/// - `bundle`: optional banner and separator, optional external filter.
///
/// Targets are written in declaration order. Only regular files are read,
/// and a destination is never its own input. A target whose patterns match
/// no file is an error: an empty bundle is never intended.
///
/// The filter sees task options as `BUILDFLOW_OPT_<KEY>` and the output path
/// as `BUILDFLOW_DEST`.
#[derive(Debug, Clone)]
pub struct ConcatAction {
    kind: &'static str,
    targets: Vec<ConcatTarget>,
    cmd: Option<String>,
    separator: String,
    banner: Option<String>,
}

impl ConcatAction {
    pub fn minify(cmd: impl Into<String>) -> Self {
        Self::new("minify", Some(cmd.into()))
    }

    pub fn bundle(cmd: Option<String>) -> Self {
        Self::new("bundle", cmd)
    }

    fn new(kind: &'static str, cmd: Option<String>) -> Self {
        Self {
            kind,
            targets: Vec::new(),
            cmd,
            separator: "\n".to_string(),
            banner: None,
        }
    }

    pub fn with_target(mut self, dest: impl Into<PathBuf>, files: FileSet) -> Self {
        self.targets.push(ConcatTarget {
            dest: dest.into(),
            files,
        });
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    async fn build_target(
        &self,
        input: &ActionInput<'_>,
        target: &ConcatTarget,
    ) -> Result<PathBuf> {
        let fs = input.fs();
        let dest = input.base_dir().join(&target.dest);

        let sources: Vec<PathBuf> = input
            .resolve(&target.files)?
            .into_iter()
            .filter(|p| *p != dest && fs.is_file(p))
            .collect();

        if sources.is_empty() {
            bail!(
                "no input files matched {:?} for {}",
                target.files.patterns(),
                target.dest.display()
            );
        }

        let mut joined = Vec::new();
        if let Some(banner) = &self.banner {
            joined.extend_from_slice(banner.as_bytes());
            joined.push(b'\n');
        }
        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                joined.extend_from_slice(self.separator.as_bytes());
            }
            joined.extend_from_slice(&fs.read(source)?);
        }

        let contents = match &self.cmd {
            Some(cmd) => {
                let mut env = option_env_vars(input.options);
                env.push(("BUILDFLOW_TASK".to_string(), input.task.to_string()));
                env.push((
                    "BUILDFLOW_DEST".to_string(),
                    target.dest.to_string_lossy().into_owned(),
                ));
                run_tool(input.task, cmd, input.base_dir(), &env, Some(joined)).await?
            }
            None => joined,
        };

        fs.write(&dest, &contents)?;

        info!(
            task = %input.task,
            kind = self.kind,
            sources = sources.len(),
            bytes = contents.len(),
            dest = ?dest,
            "wrote output"
        );
        Ok(dest)
    }
}

impl Action for ConcatAction {
    fn kind(&self) -> &str {
        self.kind
    }

    fn summary(&self) -> String {
        self.targets
            .iter()
            .map(|t| format!("{} -> {}", t.files.patterns().join(", "), t.dest.display()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn execute<'a>(&'a self, input: ActionInput<'a>) -> BoxFuture<'a, Result<ActionOutput>> {
        Box::pin(async move {
            if self.targets.is_empty() {
                bail!("{} task '{}' has no output targets", self.kind, input.task);
            }

            let mut output = ActionOutput::default();
            for target in self.targets.iter() {
                output.written.push(self.build_target(&input, target).await?);
            }
            Ok(output)
        })
    }
}
