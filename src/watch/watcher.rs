// src/watch/watcher.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::fs::CompiledFileSet;
use crate::watch::path_utils::relative_str;

/// Where changes for one watch group are delivered.
#[derive(Debug, Clone)]
pub struct GroupRoute {
    pub group: String,
    pub files: CompiledFileSet,
    pub tx: mpsc::UnboundedSender<String>,
}

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping it stops the
/// watcher, which closes every group's change channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Only content-level changes count: creation, edits, renames, removal.
pub fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Forward the paths of `event` to every group whose patterns match.
///
/// Returns how many (path, group) deliveries were made.
pub fn route_event(root: &Path, event: &Event, routes: &[GroupRoute]) -> usize {
    if !is_relevant(&event.kind) {
        trace!(kind = ?event.kind, "ignoring notify event");
        return 0;
    }

    let mut delivered = 0;
    for path in event.paths.iter() {
        let Some(rel) = relative_str(root, path) else {
            continue;
        };
        for route in routes.iter().filter(|r| r.files.matches(&rel)) {
            if route.tx.send(rel.clone()).is_ok() {
                debug!(group = %route.group, path = %rel, "change routed to group");
                delivered += 1;
            }
        }
    }
    delivered
}

/// Watch `root` recursively and feed matching changes into each group.
///
/// `root` is the directory patterns are relative to (the config file's
/// directory).
pub fn spawn_watcher(root: impl Into<PathBuf>, routes: Vec<GroupRoute>) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    warn!("failed to forward notify event: {err}");
                }
            }
            Err(err) => warn!("file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, groups = routes.len(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, "received notify event");
            route_event(&root, &event, &routes);
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};

    fn route(group: &str, patterns: &[&str]) -> (GroupRoute, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        let route = GroupRoute {
            group: group.to_string(),
            files: CompiledFileSet::new(&patterns).unwrap(),
            tx,
        };
        (route, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(p) = rx.try_recv() {
            out.push(p);
        }
        out
    }

    #[test]
    fn routes_paths_to_matching_groups_only() {
        let (styles, mut styles_rx) = route("styles", &["**/*.css", "!.tmp/**"]);
        let (scripts, mut scripts_rx) = route("scripts", &["**/*.js"]);
        let routes = vec![styles, scripts];

        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/proj/css/a.css"))
            .add_path(PathBuf::from("/proj/.tmp/css/style.css"))
            .add_path(PathBuf::from("/proj/js/main.js"))
            .add_path(PathBuf::from("/elsewhere/b.css"));

        assert_eq!(route_event(Path::new("/proj"), &event, &routes), 2);
        assert_eq!(drain(&mut styles_rx), ["css/a.css"]);
        assert_eq!(drain(&mut scripts_rx), ["js/main.js"]);
    }

    #[test]
    fn ignores_access_and_metadata_events() {
        let (styles, mut rx) = route("styles", &["**/*.css"]);
        let routes = vec![styles];

        for kind in [
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
        ] {
            let event = Event::new(kind).add_path(PathBuf::from("/proj/a.css"));
            assert_eq!(route_event(Path::new("/proj"), &event, &routes), 0);
        }
        assert!(drain(&mut rx).is_empty());

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/proj/a.css"));
        assert_eq!(route_event(Path::new("/proj"), &event, &routes), 1);
    }
}
