// tests/watch_debounce.rs
//
// Watch group timing on a paused tokio clock: changes are fed straight into
// the group's channel, runs go to a recording backend that takes a fixed
// amount of (virtual) time.

mod common;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use buildflow::engine::{GroupRuntime, GroupStats, RunGate};
use buildflow::errors::Result;
use buildflow::exec::RunStatus;
use buildflow::fs::mock::MockFileSystem;
use buildflow::fs::{FileMatcher, FileSet, FileSystem};
use buildflow::pipeline::run_groups;
use buildflow::types::SpawnPolicy;
use buildflow::watch::{ContentHasher, WatchGroup};
use buildflow_test_utils::builders::{ConfigBuilder, WatchGroupBuilder};
use buildflow_test_utils::fake_backend::RecordingBackend;
use buildflow_test_utils::with_timeout;

const DEBOUNCE: Duration = Duration::from_millis(100);
const RUN_TIME: Duration = Duration::from_secs(1);

struct Harness {
    changes: mpsc::UnboundedSender<String>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<Result<GroupStats>>,
}

impl Harness {
    fn start(backend: &RecordingBackend) -> Self {
        Self::start_with(backend, |runtime| runtime)
    }

    fn start_with(
        backend: &RecordingBackend,
        configure: impl FnOnce(GroupRuntime) -> GroupRuntime,
    ) -> Self {
        common::init_tracing();
        let group = WatchGroup::new(
            "scripts",
            FileSet::new(["**/*.js".to_string()]),
            vec!["jshint".into(), "requirejs".into()],
            DEBOUNCE,
        )
        .unwrap();

        let (changes, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let runtime = configure(GroupRuntime::new(group, backend.arc(), rx, stop_rx));
        let handle = tokio::spawn(runtime.run());
        Self {
            changes,
            stop,
            handle,
        }
    }

    fn change(&self, path: &str) {
        self.changes.send(path.to_string()).unwrap();
    }

    async fn stop(self) -> GroupStats {
        self.stop.send(true).unwrap();
        with_timeout(self.handle).await.unwrap().unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn five_changes_in_one_window_trigger_one_run() {
    let backend = RecordingBackend::new().with_delay(RUN_TIME);
    let harness = Harness::start(&backend);

    for i in 0..5 {
        harness.change(&format!("js/{i}.js"));
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.run_count(), 0, "window still open");

    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.runs(), [vec!["jshint".to_string(), "requirejs".to_string()]]);

    sleep(Duration::from_secs(2)).await;
    let stats = harness.stop().await;
    assert_eq!(backend.run_count(), 1);
    assert_eq!(stats.runs_started, 1);
}

#[tokio::test(start_paused = true)]
async fn separate_windows_trigger_separate_runs() {
    let backend = RecordingBackend::new();
    let harness = Harness::start(&backend);

    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;
    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;

    let stats = harness.stop().await;
    assert_eq!(backend.run_count(), 2);
    assert_eq!(stats.runs_started, 2);
}

#[tokio::test(start_paused = true)]
async fn triggers_during_a_run_produce_exactly_one_rerun() {
    let backend = RecordingBackend::new().with_delay(RUN_TIME);
    let harness = Harness::start(&backend);

    // First run: window closes at ~100ms, runs until ~1100ms.
    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.run_count(), 1);

    // Two complete windows close while the run is in flight.
    harness.change("js/b.js");
    sleep(Duration::from_millis(200)).await;
    harness.change("js/c.js");
    harness.change("js/d.js");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.run_count(), 1, "serialized behind the in-flight run");

    // The rerun starts when the first run ends, and nothing follows it.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.run_count(), 2);

    let stats = harness.stop().await;
    assert_eq!(stats.runs_started, 2);
    assert_eq!(stats.triggers_superseded, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_run_finish_but_drops_the_rerun() {
    let backend = RecordingBackend::new().with_delay(RUN_TIME);
    let harness = Harness::start(&backend);

    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;
    harness.change("js/b.js");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.run_count(), 1);

    let started = tokio::time::Instant::now();
    let stats = harness.stop().await;

    assert!(started.elapsed() >= Duration::from_millis(500), "waited for the in-flight run");
    assert_eq!(backend.run_count(), 1);
    assert_eq!(stats.reruns_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_an_open_window() {
    let backend = RecordingBackend::new();
    let harness = Harness::start(&backend);

    harness.change("js/a.js");
    sleep(Duration::from_millis(20)).await;
    let stats = harness.stop().await;

    assert_eq!(backend.run_count(), 0);
    assert_eq!(stats.runs_started, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_runs_keep_the_group_watching() {
    let backend = RecordingBackend::new().with_status(RunStatus::Failed);
    let harness = Harness::start(&backend);

    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;
    harness.change("js/a.js");
    sleep(Duration::from_millis(300)).await;

    let stats = harness.stop().await;
    assert_eq!(backend.run_count(), 2);
    assert_eq!(stats.runs_failed, 2);
}

#[tokio::test(start_paused = true)]
async fn closed_change_feed_stops_the_group() {
    let backend = RecordingBackend::new();
    let harness = Harness::start(&backend);

    let Harness {
        changes,
        stop: _stop,
        handle,
    } = harness;
    drop(changes);

    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(stats.runs_started, 0);
}

#[tokio::test(start_paused = true)]
async fn use_hash_skips_triggers_without_content_changes() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/web/js/main.js", b"var main;".to_vec());
    let matcher = FileMatcher::new("/web", fs.clone());

    let backend = RecordingBackend::new();
    let harness = Harness::start_with(&backend, |runtime| {
        let files = runtime.group().compiled().clone();
        runtime.with_hasher(ContentHasher::new(matcher, files))
    });
    // Let the group record its baseline.
    sleep(Duration::from_millis(1)).await;

    // Touched, same bytes.
    fs.write(Path::new("/web/js/main.js"), b"var main;").unwrap();
    harness.change("js/main.js");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.run_count(), 0);

    fs.write(Path::new("/web/js/main.js"), b"var main = 1;").unwrap();
    harness.change("js/main.js");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.run_count(), 1);

    let stats = harness.stop().await;
    assert_eq!(stats.triggers_unchanged, 1);
}

/// Two groups, `scripts` and `styles`, sharing one run gate.
struct GatedGroups {
    changes: BTreeMap<String, mpsc::UnboundedSender<String>>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<Result<Vec<(String, GroupStats)>>>,
}

impl GatedGroups {
    fn start(backend: &RecordingBackend) -> Self {
        common::init_tracing();
        let cfg = ConfigBuilder::new()
            .clean("lintScripts", &[".tmp/lint"])
            .clean("compileStyles", &[".tmp/css"])
            .with_watch(
                "scripts",
                WatchGroupBuilder::new(&["js/**/*.js"], &["lintScripts"])
                    .debounce("100ms")
                    .spawn(SpawnPolicy::InProcess)
                    .build(),
            )
            .with_watch(
                "styles",
                WatchGroupBuilder::new(&["css/**/*.css"], &["compileStyles"])
                    .debounce("100ms")
                    .spawn(SpawnPolicy::InProcess)
                    .build(),
            )
            .build();

        let gate = RunGate::default();
        let (stop, stop_rx) = watch::channel(false);
        let mut changes = BTreeMap::new();
        let mut runtimes = Vec::new();
        for (id, group_cfg) in cfg.watch_groups() {
            let group = WatchGroup::from_config(id, group_cfg).unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            changes.insert(id.clone(), tx);
            runtimes.push(
                GroupRuntime::new(group, backend.arc(), rx, stop_rx.clone())
                    .with_run_gate(Arc::clone(&gate)),
            );
        }

        Self {
            changes,
            stop,
            handle: tokio::spawn(run_groups(runtimes)),
        }
    }

    fn change(&self, group: &str, path: &str) {
        self.changes[group].send(path.to_string()).unwrap();
    }

    async fn stop(self) -> Vec<(String, GroupStats)> {
        self.stop.send(true).unwrap();
        with_timeout(self.handle).await.unwrap().unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn groups_sharing_a_gate_never_run_together() {
    let backend = RecordingBackend::new().with_delay(RUN_TIME);
    let groups = GatedGroups::start(&backend);

    groups.change("scripts", "js/a.js");
    groups.change("styles", "css/a.css");

    // Both windows closed at ~100ms; one group holds the gate.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.run_count(), 1);

    // The other starts once the first run ends at ~1100ms.
    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.run_count(), 2);

    sleep(Duration::from_secs(2)).await;
    let stats = groups.stop().await;

    assert_eq!(backend.peak_concurrency(), 1);
    let mut runs: Vec<Vec<String>> = backend.runs();
    runs.sort();
    assert_eq!(runs, [vec!["compileStyles".to_string()], vec!["lintScripts".to_string()]]);
    assert!(stats.iter().all(|(_, s)| s.runs_started == 1), "{stats:?}");
}

#[tokio::test(start_paused = true)]
async fn stop_drops_a_run_still_waiting_for_the_gate() {
    let backend = RecordingBackend::new().with_delay(RUN_TIME);
    let groups = GatedGroups::start(&backend);

    groups.change("scripts", "js/a.js");
    groups.change("styles", "css/a.css");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.run_count(), 1);

    let started = tokio::time::Instant::now();
    let stats = groups.stop().await;

    assert!(started.elapsed() >= Duration::from_millis(800), "waited for the in-flight run");
    assert_eq!(backend.run_count(), 1, "the waiting run never started");
    assert_eq!(backend.peak_concurrency(), 1);
    assert_eq!(stats.len(), 2);
}
