// src/actions/compile.rs

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};
use tracing::debug;

use crate::actions::tool::{option_env_vars, run_tool};
use crate::actions::{Action, ActionInput, ActionOutput, BoxFuture};
use crate::fs::FileSet;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(inputs|base)\}").expect("placeholder regex is valid"));

/// Runs an external tool, e.g. a style compiler or a linter.
///
/// The command line may contain:
/// - `{inputs}`: matched paths, relative to the base dir, shell-quoted and
///   space-separated.
/// - `{base}`: the base directory.
///
/// Task options are exported to the tool as `BUILDFLOW_OPT_<KEY>` environment
/// variables (`sassDir` becomes `BUILDFLOW_OPT_SASS_DIR`). The matched paths
/// are also available newline-separated in `BUILDFLOW_INPUTS`.
#[derive(Debug, Clone)]
pub struct CompileAction {
    cmd: String,
    files: FileSet,
}

impl CompileAction {
    pub fn new(cmd: impl Into<String>, files: FileSet) -> Self {
        Self {
            cmd: cmd.into(),
            files,
        }
    }
}

impl Action for CompileAction {
    fn kind(&self) -> &str {
        "compile"
    }

    fn summary(&self) -> String {
        if self.files.is_empty() {
            return self.cmd.clone();
        }
        format!("{} | {}", self.files.patterns().join(", "), self.cmd)
    }

    fn execute<'a>(&'a self, input: ActionInput<'a>) -> BoxFuture<'a, Result<ActionOutput>> {
        Box::pin(async move {
            let base_dir = input.base_dir();
            let rel_inputs: Vec<String> = input
                .resolve(&self.files)?
                .iter()
                .map(|p| relative_display(base_dir, p))
                .collect();

            let cmd = expand_placeholders(&self.cmd, &rel_inputs, base_dir);
            debug!(task = %input.task, inputs = rel_inputs.len(), cmd = %cmd, "expanded command");

            let mut env = option_env_vars(input.options);
            env.push(("BUILDFLOW_TASK".to_string(), input.task.to_string()));
            env.push(("BUILDFLOW_INPUTS".to_string(), rel_inputs.join("\n")));

            run_tool(input.task, &cmd, base_dir, &env, None).await?;

            // Compile tools decide their own outputs; nothing to report here.
            Ok(ActionOutput::default())
        })
    }
}

fn relative_display(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

fn expand_placeholders(cmd: &str, rel_inputs: &[String], base: &Path) -> String {
    PLACEHOLDER_RE
        .replace_all(cmd, |caps: &Captures| match &caps[1] {
            "inputs" => rel_inputs
                .iter()
                .map(|p| shell_quote(p))
                .collect::<Vec<_>>()
                .join(" "),
            _ => shell_quote(&base.to_string_lossy()),
        })
        .into_owned()
}

fn shell_quote(s: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn placeholders_expand_to_quoted_paths() {
        let inputs = vec!["sass/main.scss".to_string(), "sass/it's.scss".to_string()];
        let cmd = expand_placeholders("sassc {inputs} -o {base}/out", &inputs, Path::new("/p"));
        assert_eq!(cmd, r"sassc 'sass/main.scss' 'sass/it'\''s.scss' -o '/p'/out");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_tool_in_base_dir_with_inputs() {
        use std::sync::Arc;

        use crate::dag::TaskOptions;
        use crate::fs::{FileMatcher, RealFileSystem};

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sass")).unwrap();
        std::fs::write(dir.path().join("sass/a.scss"), "a{}").unwrap();
        std::fs::write(dir.path().join("sass/b.scss"), "b{}").unwrap();

        let action = CompileAction::new(
            "mkdir -p out && cat {inputs} > out/style.css",
            FileSet::new(["sass/*.scss"]),
        );
        let matcher = FileMatcher::new(dir.path(), Arc::new(RealFileSystem));
        let options = TaskOptions::new();

        action
            .execute(ActionInput {
                task: "compileStyles",
                matcher: &matcher,
                options: &options,
            })
            .await
            .unwrap();

        let css = std::fs::read_to_string(dir.path().join("out/style.css")).unwrap();
        assert_eq!(css, "a{}b{}");
    }
}
