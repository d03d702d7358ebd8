//! Shared types — parameter tables, declarations, environment keys, run reports.
//!
//! Graph and job types live in their own modules; this module holds the
//! plain data that flows between parser, resolver, executor and monitors.

use super::error::{JobFailure, Position};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

// ============================================================================
// Environment keys
// ============================================================================

pub const ENV_RUN_ID: &str = "FROF_RUN_ID";
pub const ENV_PLAN_ID: &str = "FROF_PLAN_ID";
pub const ENV_VERSION: &str = "FROF_VERSION";
pub const ENV_BATCH_ITER: &str = "FROF_BATCH_ITER";
pub const ENV_JOB_NAME: &str = "FROF_JOB_NAME";
pub const ENV_PARENT_PLAN_ID: &str = "FROF_PARENT_PLAN_ID";
pub const ENV_PARENT_RUN_ID: &str = "FROF_PARENT_RUN_ID";
/// Carries the bound option value of a parameter-expanded job.
pub const ENV_JOB_PARAM: &str = "FROF_JOB_PARAM";

/// Version tag handed to every job.
pub const FROF_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Parameters
// ============================================================================

/// Parameter name → ordered option values. Order drives expansion order.
pub type ParameterTable = IndexMap<String, Vec<String>>;

/// A job reference of the form `Name(&Param)` or `Name(&Param[cap])`,
/// recorded during parsing and consumed by expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedDeclaration {
    pub job_id: String,
    pub param: String,
    pub cap: Option<NonZeroUsize>,
    /// Where the binding was written
    pub at: Position,
}

// ============================================================================
// Parent context
// ============================================================================

/// Identity of the run that launched this one, when frof is nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentContext {
    pub plan_id: String,
    pub run_id: Option<String>,
}

impl ParentContext {
    /// Read `FROF_PARENT_PLAN_ID` / `FROF_PARENT_RUN_ID` from this process.
    pub fn from_env() -> Option<Self> {
        let plan_id = std::env::var(ENV_PARENT_PLAN_ID)
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            plan_id,
            run_id: std::env::var(ENV_PARENT_RUN_ID).ok(),
        })
    }

    /// Compose the effective plan id reported by a child run.
    pub fn compose_plan_id(&self, child_plan_id: &str) -> String {
        format!("{}--{}", self.plan_id, child_plan_id)
    }
}

// ============================================================================
// Execution state and reports
// ============================================================================

/// Executor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One scheduling iteration: what was admitted and what failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    /// 0-based round index
    pub index: usize,

    /// Admitted job ids, in dispatch order
    pub jobs: Vec<String>,

    /// Failures observed in this round
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JobFailure>,

    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

/// Outcome of a run, complete or partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,

    /// Effective plan id (parent-composed when nested)
    pub plan_id: String,

    pub state: RunState,

    pub rounds: Vec<RoundRecord>,

    /// Jobs that finished successfully, in retirement order
    pub succeeded: Vec<String>,

    /// Jobs never dispatched because the run stopped early
    pub not_started: Vec<String>,

    #[serde(with = "duration_secs")]
    pub total_duration: Duration,
}

impl RunReport {
    /// All failures across every recorded round.
    pub fn failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.rounds.iter().flat_map(|r| r.failures.iter())
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ExitInfo;

    #[test]
    fn test_compose_plan_id() {
        let parent = ParentContext {
            plan_id: "abc".into(),
            run_id: Some("r1".into()),
        };
        assert_eq!(parent.compose_plan_id("def"), "abc--def");
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
    }

    #[test]
    fn test_report_failures_flatten_rounds() {
        let report = RunReport {
            run_id: "r".into(),
            plan_id: "p".into(),
            state: RunState::Failed,
            rounds: vec![
                RoundRecord {
                    index: 0,
                    jobs: vec!["A".into()],
                    failures: vec![],
                    duration: Duration::from_millis(5),
                },
                RoundRecord {
                    index: 1,
                    jobs: vec!["B".into(), "C".into()],
                    failures: vec![JobFailure {
                        job_id: "C".into(),
                        detail: ExitInfo::Exit { code: 1 },
                    }],
                    duration: Duration::from_millis(5),
                },
            ],
            succeeded: vec!["A".into(), "B".into()],
            not_started: vec![],
            total_duration: Duration::from_millis(10),
        };
        let ids: Vec<_> = report.failures().map(|f| f.job_id.as_str()).collect();
        assert_eq!(ids, vec!["C"]);
        assert!(!report.is_success());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("\"kind\":\"exit\""));
    }
}
