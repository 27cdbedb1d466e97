use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use buildflow::actions::{Action, ActionInput, ActionOutput, BoxFuture};

/// Shared, ordered record of executed leaf names.
pub type ActionLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> ActionLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &ActionLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A fake action that:
/// - records the leaf task name in a shared log
/// - optionally writes a fixed output file (relative to the base dir)
/// - optionally fails after recording
pub struct RecordingAction {
    log: ActionLog,
    output: Option<(PathBuf, Vec<u8>)>,
    fail: bool,
}

impl RecordingAction {
    pub fn new(log: ActionLog) -> Self {
        Self {
            log,
            output: None,
            fail: false,
        }
    }

    pub fn writing(mut self, rel: &str, contents: &[u8]) -> Self {
        self.output = Some((PathBuf::from(rel), contents.to_vec()));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn arc(self) -> Arc<dyn Action> {
        Arc::new(self)
    }
}

impl Action for RecordingAction {
    fn kind(&self) -> &str {
        "recording"
    }

    fn summary(&self) -> String {
        match &self.output {
            Some((rel, _)) => format!("-> {}", rel.display()),
            None => String::new(),
        }
    }

    fn execute<'a>(&'a self, input: ActionInput<'a>) -> BoxFuture<'a, Result<ActionOutput>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(input.task.to_string());

            if self.fail {
                bail!("{} failed on purpose", input.task);
            }

            let mut output = ActionOutput::default();
            if let Some((rel, contents)) = &self.output {
                let path = input.base_dir().join(rel);
                input.fs().write(&path, contents)?;
                output.written.push(path);
            }
            Ok(output)
        })
    }
}
