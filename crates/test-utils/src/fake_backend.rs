use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildflow::errors::Result;
use buildflow::exec::{RunBackend, RunStatus};
use buildflow::types::TaskName;

/// A fake run backend that:
/// - records the task list of every run
/// - takes `delay` (on the tokio clock) to finish, so tests can overlap runs
/// - reports a fixed status
/// - tracks the highest number of runs in flight at once
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    runs: Arc<Mutex<Vec<Vec<TaskName>>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Duration,
    status: RunStatus,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            status: RunStatus::Success,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Task lists of the runs started so far.
    pub fn runs(&self) -> Vec<Vec<TaskName>> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    /// Most runs that were ever in flight together.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn arc(&self) -> Arc<dyn RunBackend> {
        Arc::new(self.clone())
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RunBackend for RecordingBackend {
    fn run_tasks(
        &self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<RunStatus>> + Send + '_>> {
        self.runs.lock().unwrap().push(tasks);
        let delay = self.delay;
        let status = self.status;

        Box::pin(async move {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(status)
        })
    }
}
