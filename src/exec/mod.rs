// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`runner`] resolves a task into leaves and executes them in order.
//! - [`report`] holds the per-invocation [`RunResult`].
//! - [`backend`] provides the [`RunBackend`] trait used by watch groups,
//!   with an in-process and a subprocess implementation.

pub mod backend;
pub mod report;
pub mod runner;

pub use backend::{InProcessBackend, RunBackend, SubprocessBackend};
pub use report::{LeafReport, RunResult, RunStatus};
pub use runner::TaskRunner;
