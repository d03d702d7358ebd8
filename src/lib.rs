//! Frof — declarative dependency graphs of shell jobs.
//!
//! A small DSL describes jobs, their ordering and parameter-driven job
//! families; the executor runs the graph in level-synchronous rounds with
//! per-family concurrency caps.

pub mod cli;
pub mod core;
pub mod monitor;
pub mod transport;

pub use crate::core::error::{FrofError, FrofResult};
pub use crate::core::executor::{Executor, ExecutorConfig};
pub use crate::core::graph::{Graph, JobNode};
pub use crate::core::job::{Job, JobOutcome};
pub use crate::core::plan::Plan;
pub use crate::core::types::{RunReport, RunState};
pub use crate::monitor::{StatusMonitor, StatusSnapshot};
