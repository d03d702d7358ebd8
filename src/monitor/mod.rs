//! Run progress observers.
//!
//! The executor calls `launch_status` once before the first round and
//! `emit_status` once after every round. Monitors are passive: they cannot
//! influence scheduling.

pub mod line;
pub mod log;

pub use line::OneLineStatusMonitor;
pub use log::LogStatusMonitor;

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Progress at a round boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub run_id: String,

    /// Effective plan id (parent-composed when nested)
    pub plan_id: String,

    /// Rounds completed so far
    pub round: usize,

    /// Ids the next round would dispatch, in dispatch order
    pub next_jobs: Vec<String>,

    /// Nodes not yet retired
    pub remaining: usize,

    pub total: usize,

    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl StatusSnapshot {
    /// Share of retired nodes, 0–100. An empty plan counts as complete.
    pub fn percent_complete(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        let done = self.total.saturating_sub(self.remaining);
        ((done * 100) / self.total) as u32
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub trait StatusMonitor: Send {
    fn launch_status(&mut self, snapshot: &StatusSnapshot);
    fn emit_status(&mut self, snapshot: &StatusSnapshot);
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusMonitor;

impl StatusMonitor for NullStatusMonitor {
    fn launch_status(&mut self, _snapshot: &StatusSnapshot) {}
    fn emit_status(&mut self, _snapshot: &StatusSnapshot) {}
}

/// Keeps every snapshot. Clones share the same buffer, so a clone kept by
/// the caller can inspect what the executor reported.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusMonitor {
    launched: Arc<Mutex<Vec<StatusSnapshot>>>,
    emitted: Arc<Mutex<Vec<StatusSnapshot>>>,
}

impl RecordingStatusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<StatusSnapshot> {
        self.launched.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn emitted(&self) -> Vec<StatusSnapshot> {
        self.emitted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl StatusMonitor for RecordingStatusMonitor {
    fn launch_status(&mut self, snapshot: &StatusSnapshot) {
        if let Ok(mut v) = self.launched.lock() {
            v.push(snapshot.clone());
        }
    }

    fn emit_status(&mut self, snapshot: &StatusSnapshot) {
        if let Ok(mut v) = self.emitted.lock() {
            v.push(snapshot.clone());
        }
    }
}

/// Monitor selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MonitorKind {
    /// Single status line on stderr, rewritten in place
    #[default]
    Line,
    /// Snapshots as tracing events
    Log,
    /// No progress output
    None,
}

impl MonitorKind {
    pub fn build(self) -> Box<dyn StatusMonitor> {
        match self {
            Self::Line => Box::new(OneLineStatusMonitor::stderr()),
            Self::Log => Box::new(LogStatusMonitor),
            Self::None => Box::new(NullStatusMonitor),
        }
    }
}

#[cfg(test)]
pub(crate) fn snapshot(round: usize, next: &[&str], remaining: usize, total: usize) -> StatusSnapshot {
    StatusSnapshot {
        run_id: "run".into(),
        plan_id: "plan".into(),
        round,
        next_jobs: next.iter().map(|s| s.to_string()).collect(),
        remaining,
        total,
        elapsed: Duration::from_millis(1500),
    }
}
