// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Describing watch groups (patterns, bound tasks, debounce, spawn policy).
//! - Wiring up a cross-platform filesystem watcher (`notify`) that routes
//!   relevant changes to each group's channel.
//! - Content hashing for `use_hash` groups, so touching a file without
//!   changing it does not re-run anything.
//!
//! It does not know how tasks run; debounce and serialization live in
//! `engine`.

pub mod group;
pub mod hash;
pub mod path_utils;
pub mod watcher;

pub use group::WatchGroup;
pub use hash::{compute_aggregate_hash, compute_file_hash, ContentHasher};
pub use watcher::{route_event, spawn_watcher, GroupRoute, WatcherHandle};
