//! Error taxonomy for parsing, plan construction and execution.

use super::types::RunReport;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type FrofResult<T> = Result<T, FrofError>;

/// A 1-based line/column position in DSL source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

fn fmt_position(pos: &Option<Position>) -> String {
    pos.map(|p| format!(" at {}", p)).unwrap_or_default()
}

/// Why a single job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitInfo {
    /// Process exited with a non-zero status.
    Exit { code: i32 },
    /// Process was terminated by a signal.
    Signal,
    /// Process could not be spawned or awaited.
    Spawn { message: String },
    /// Environment could not be handed to a process.
    InvalidEnv { message: String },
    /// Job was not started, or stopped early, because the run was cancelled.
    Cancelled,
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit { code } => write!(f, "exit code {}", code),
            Self::Signal => write!(f, "terminated by signal"),
            Self::Spawn { message } => write!(f, "spawn error: {}", message),
            Self::InvalidEnv { message } => write!(f, "invalid environment: {}", message),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A failed job within a round.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobFailure {
    pub job_id: String,
    pub detail: ExitInfo,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.job_id, self.detail)
    }
}

/// Aggregate of every failure observed in the terminating round.
#[derive(Debug, Clone)]
pub struct ExecutionFailed {
    pub failures: Vec<JobFailure>,
    pub report: RunReport,
}

impl fmt::Display for ExecutionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = self
            .failures
            .iter()
            .map(|jf| jf.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(
            f,
            "{} job(s) failed in round {}: {}",
            self.failures.len(),
            self.report.rounds.len(),
            list
        )
    }
}

#[derive(Debug, Error)]
pub enum FrofError {
    #[error("parse error at {at}: {message}")]
    Parse { at: Position, message: String },

    #[error("undefined parameter '&{param}' bound to job '{job_id}' at {at}")]
    UndefinedParameter {
        param: String,
        job_id: String,
        at: Position,
    },

    #[error("duplicate job '{id}'{}", fmt_position(.at))]
    DuplicateJob { id: String, at: Option<Position> },

    #[error("duplicate parameter '&{name}' at {at}")]
    DuplicateParameter { name: String, at: Position },

    #[error("dependency cycle detected involving: {}", .members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("unknown job '{0}'")]
    UnknownNode(String),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    ExecutionFailed(Box<ExecutionFailed>),

    #[error("run cancelled after {} round(s)", .0.rounds.len())]
    Cancelled(Box<RunReport>),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl FrofError {
    pub(crate) fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            at: Position::new(line, column),
            message: message.into(),
        }
    }

    /// Source position for construction-time errors, when known.
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Parse { at, .. }
            | Self::UndefinedParameter { at, .. }
            | Self::DuplicateParameter { at, .. } => Some(*at),
            Self::DuplicateJob { at, .. } => *at,
            _ => None,
        }
    }

    /// The partial run report carried by execution-time errors.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::ExecutionFailed(failed) => Some(&failed.report),
            Self::Cancelled(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_carries_position() {
        let e = FrofError::parse(3, 7, "expected '->'");
        assert_eq!(e.to_string(), "parse error at 3:7: expected '->'");
        assert_eq!(e.position(), Some(Position::new(3, 7)));
    }

    #[test]
    fn test_duplicate_job_display_with_and_without_position() {
        let e = FrofError::DuplicateJob {
            id: "A".into(),
            at: Some(Position::new(4, 1)),
        };
        assert_eq!(e.to_string(), "duplicate job 'A' at 4:1");
        let e = FrofError::DuplicateJob {
            id: "A".into(),
            at: None,
        };
        assert_eq!(e.to_string(), "duplicate job 'A'");
        assert_eq!(e.position(), None);
    }

    #[test]
    fn test_cycle_lists_members() {
        let e = FrofError::Cycle {
            members: vec!["a".into(), "b".into()],
        };
        assert!(e.to_string().contains("a, b"));
    }

    #[test]
    fn test_exit_info_display() {
        assert_eq!(ExitInfo::Exit { code: 3 }.to_string(), "exit code 3");
        assert_eq!(ExitInfo::Cancelled.to_string(), "cancelled");
        let jf = JobFailure {
            job_id: "B".into(),
            detail: ExitInfo::Signal,
        };
        assert_eq!(jf.to_string(), "B: terminated by signal");
    }
}
