//! Jobs — the unit of work a graph node carries.
//!
//! `Job` is a closed set of kinds dispatched through [`Job::run`]. The
//! executor only ever calls `run`; a new kind is a new variant plus an arm
//! in `run`.

use super::error::ExitInfo;
use crate::transport::{self, local};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of running a job once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(ExitInfo),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Shell command run through `sh -c`.
    Shell {
        command: String,
        /// Node-level variables; win over round-supplied ones on conflict
        extra_env: BTreeMap<String, String>,
    },
    /// Succeeds after an optional delay.
    NoOp { delay: Duration },
}

impl Job {
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell {
            command: command.into(),
            extra_env: BTreeMap::new(),
        }
    }

    pub fn noop() -> Self {
        Self::NoOp {
            delay: Duration::ZERO,
        }
    }

    pub fn delay(delay: Duration) -> Self {
        Self::NoOp { delay }
    }

    /// Add a node-level environment variable (builder style).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Shell { extra_env, .. } = &mut self {
            extra_env.insert(key.into(), value.into());
        }
        self
    }

    /// Command text for shell jobs.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Shell { command, .. } => Some(command),
            Self::NoOp { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Shell { .. } => "shell",
            Self::NoOp { .. } => "noop",
        }
    }

    /// Run the job with the round-supplied environment.
    ///
    /// A cancelled token prevents a shell job from being spawned; once a
    /// process is running it is left to finish.
    pub async fn run(&self, env: &BTreeMap<String, String>, cancel: &CancellationToken) -> JobOutcome {
        match self {
            Self::Shell { command, extra_env } => {
                if cancel.is_cancelled() {
                    return JobOutcome::Failure(ExitInfo::Cancelled);
                }
                let mut merged = env.clone();
                merged.extend(extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
                if let Err(message) = transport::validate_env(&merged) {
                    return JobOutcome::Failure(ExitInfo::InvalidEnv { message });
                }
                match local::exec_shell(command, &merged).await {
                    Ok(out) if out.success() => JobOutcome::Success,
                    Ok(out) if out.signalled() => JobOutcome::Failure(ExitInfo::Signal),
                    Ok(out) => JobOutcome::Failure(ExitInfo::Exit {
                        code: out.exit_code,
                    }),
                    Err(message) => JobOutcome::Failure(ExitInfo::Spawn { message }),
                }
            }
            Self::NoOp { delay } => {
                if delay.is_zero() {
                    return JobOutcome::Success;
                }
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => JobOutcome::Success,
                    _ = cancel.cancelled() => JobOutcome::Failure(ExitInfo::Cancelled),
                }
            }
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell { command, .. } => {
                let short: String = command.chars().take(10).collect();
                write!(f, "<{}>", short)
            }
            Self::NoOp { delay } => write!(f, "<noop {:?}>", delay),
        }
    }
}
