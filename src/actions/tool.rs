// src/actions/tool.rs

//! External tool invocation.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::TaskOptions;

/// Number of trailing stderr lines quoted in failure messages.
const STDERR_TAIL_LINES: usize = 10;

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmd: &str) -> Command {
    let mut c = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    detach_from_terminal_signals(&mut c);
    c
}

/// Put the child in its own process group.
///
/// A terminal Ctrl-C signals the whole foreground group. Only the watcher
/// may see it, so an in-flight run can finish during a graceful stop.
pub fn detach_from_terminal_signals(command: &mut Command) {
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(not(unix))]
    let _ = command;
}

/// Run `cmd` through the shell in `cwd` and return its stdout.
///
/// - `env` is added to the child's environment.
/// - `stdin`, when given, is written to the child and then closed; the tool
///   is expected to act as a filter.
///
/// A non-zero exit is an error carrying the exit code and the tail of
/// stderr.
pub async fn run_tool(
    task: &str,
    cmd: &str,
    cwd: &Path,
    env: &[(String, String)],
    stdin: Option<Vec<u8>>,
) -> Result<Vec<u8>> {
    info!(task = %task, cmd = %cmd, "starting tool process");

    let mut command = shell_command(cmd);
    command
        .current_dir(cwd)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning tool process for task '{task}'"))?;

    // Feed stdin from a separate task so a tool that writes a lot before
    // reading everything cannot deadlock us.
    let writer = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => Some(tokio::spawn(async move {
            let res = pipe.write_all(&bytes).await;
            drop(pipe);
            res
        })),
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for tool process of task '{task}'"))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // The tool may legitimately exit without draining stdin; its exit
            // status below is what decides success.
            Ok(Err(e)) => debug!(task = %task, error = %e, "tool closed stdin early"),
            Err(e) => debug!(task = %task, error = %e, "stdin writer task failed"),
        }
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %task, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        task = %task,
        exit_code = code,
        success = output.status.success(),
        "tool process exited"
    );

    if !output.status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        if tail.is_empty() {
            bail!("`{cmd}` exited with code {code}");
        }
        bail!("`{cmd}` exited with code {code}:\n{}", tail.join("\n"));
    }

    Ok(output.stdout)
}

/// `sassDir` -> `SASS_DIR`, `debug-info` -> `DEBUG_INFO`.
fn env_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    }
    out
}

fn env_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items.iter().map(env_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Task options as `BUILDFLOW_OPT_<KEY>` environment variables.
pub fn option_env_vars(options: &TaskOptions) -> Vec<(String, String)> {
    options
        .iter()
        .map(|(k, v)| (format!("BUILDFLOW_OPT_{}", env_key(k)), env_value(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_are_screaming_snake_case() {
        assert_eq!(env_key("sassDir"), "SASS_DIR");
        assert_eq!(env_key("relativeAssets"), "RELATIVE_ASSETS");
        assert_eq!(env_key("debug-info"), "DEBUG_INFO");
        assert_eq!(env_key("css2Dir"), "CSS2_DIR");
    }

    #[test]
    fn option_values_are_stringified() {
        let mut options = TaskOptions::new();
        options.insert("sassDir".into(), toml::Value::String("sass".into()));
        options.insert("relativeAssets".into(), toml::Value::Boolean(true));
        options.insert(
            "paths".into(),
            toml::Value::Array(vec!["a".into(), "b".into()]),
        );
        let env = option_env_vars(&options);
        assert!(env.contains(&("BUILDFLOW_OPT_SASS_DIR".into(), "sass".into())));
        assert!(env.contains(&("BUILDFLOW_OPT_RELATIVE_ASSETS".into(), "true".into())));
        assert!(env.contains(&("BUILDFLOW_OPT_PATHS".into(), "a,b".into())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn filter_tool_receives_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool("t", "tr a-z A-Z", dir.path(), &[], Some(b"abc".to_vec()))
            .await
            .unwrap();
        assert_eq!(out, b"ABC");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let env = vec![("BUILDFLOW_OPT_NAME".to_string(), "styles".to_string())];
        let out = run_tool("t", "cat marker; printf \" $BUILDFLOW_OPT_NAME\"", dir.path(), &env, None)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "here styles");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn tool_leads_its_own_process_group() {
        let dir = tempfile::tempdir().unwrap();
        // Field 5 of /proc/<pid>/stat is the process group id.
        let out = run_tool("t", "echo $$; cut -d' ' -f5 /proc/$$/stat", dir.path(), &[], None)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{out}");
        assert_eq!(lines[0], lines[1], "shell pid should equal its pgid");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool("t", "echo broken >&2; exit 3", dir.path(), &[], None)
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }
}
