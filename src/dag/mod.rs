// src/dag/mod.rs

//! Task model and resolution.
//!
//! - [`task`] defines alias and leaf tasks.
//! - [`registry`] stores tasks by name and flattens aliases into an ordered
//!   list of leaves.
//! - [`graph`] detects alias cycles up front so configuration errors are
//!   reported before anything runs.

pub mod graph;
pub mod registry;
pub mod task;

pub use graph::alias_cycles;
pub use registry::TaskRegistry;
pub use task::{Task, TaskKind, TaskOptions};
