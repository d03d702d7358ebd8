//! Level-synchronous executor.
//!
//! Each round admits every ready node (subject to per-group caps), runs the
//! admitted jobs concurrently under a global worker limit, waits for all of
//! them, then retires them. The first round with a failure is the last.
//!
//! Working graph: arena indices in plan order, a remaining in-degree counter
//! per node and a retired flag. Edges are never deleted.

use super::error::{ExecutionFailed, ExitInfo, FrofError, FrofResult, JobFailure};
use super::graph::{Graph, JobNode};
use super::job::JobOutcome;
use super::plan::Plan;
use super::types::*;
use crate::monitor::{NullStatusMonitor, StatusMonitor, StatusSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Variables forwarded from the launching process by default.
pub const DEFAULT_PASSTHROUGH_ENV: &[&str] = &["HOME", "PATH"];

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Global worker limit across a round
    pub max_jobs: NonZeroUsize,
    /// Names copied from the process environment into every job
    pub passthrough_env: Vec<String>,
    pub parent: Option<ParentContext>,
    pub cancel: CancellationToken,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_jobs: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            passthrough_env: DEFAULT_PASSTHROUGH_ENV.iter().map(|s| s.to_string()).collect(),
            parent: ParentContext::from_env(),
            cancel: CancellationToken::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_jobs(mut self, max_jobs: NonZeroUsize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_passthrough_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passthrough_env = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent: Option<ParentContext>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// ============================================================================
// Working graph
// ============================================================================

#[derive(Debug, Clone)]
struct WorkingGraph {
    nodes: Vec<JobNode>,
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    retired: Vec<bool>,
    remaining: usize,
}

impl WorkingGraph {
    fn new(graph: &Graph) -> Self {
        let nodes: Vec<JobNode> = graph.nodes().cloned().collect();
        let successors: Vec<Vec<usize>> = nodes
            .iter()
            .map(|n| graph.successors(&n.id).filter_map(|s| graph.index_of(s)).collect())
            .collect();
        let in_degree: Vec<usize> = nodes.iter().map(|n| graph.predecessors(&n.id).count()).collect();
        let remaining = nodes.len();
        Self {
            retired: vec![false; remaining],
            nodes,
            successors,
            in_degree,
            remaining,
        }
    }

    /// Ready nodes in graph order, filtered by per-group caps.
    fn admit(&self) -> Vec<usize> {
        let mut per_group: HashMap<&str, usize> = HashMap::new();
        let mut admitted = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.retired[i] || self.in_degree[i] > 0 {
                continue;
            }
            if let (Some(group), Some(cap)) = (&node.parallelism_group, node.max_parallel_count) {
                let taken = per_group.entry(group.as_str()).or_insert(0);
                if *taken >= cap.get() {
                    continue;
                }
                *taken += 1;
            }
            admitted.push(i);
        }
        admitted
    }

    fn retire(&mut self, i: usize) {
        if self.retired[i] {
            return;
        }
        self.retired[i] = true;
        self.remaining -= 1;
        for &s in &self.successors[i] {
            self.in_degree[s] = self.in_degree[s].saturating_sub(1);
        }
    }

    fn ids(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.nodes[i].id.clone()).collect()
    }

    fn unretired(&self) -> Vec<String> {
        self.nodes
            .iter()
            .zip(&self.retired)
            .filter(|(_, &r)| !r)
            .map(|(n, _)| n.id.clone())
            .collect()
    }
}

// ============================================================================
// Executor
// ============================================================================

pub struct Executor {
    plan: Plan,
    config: ExecutorConfig,
    monitor: Box<dyn StatusMonitor>,
    state: RunState,
    working: WorkingGraph,
    run_id: Option<String>,
}

impl Executor {
    pub fn new(plan: Plan) -> Self {
        Self::with_config(plan, ExecutorConfig::default())
    }

    pub fn with_config(plan: Plan, config: ExecutorConfig) -> Self {
        let working = WorkingGraph::new(plan.graph());
        Self {
            plan,
            config,
            monitor: Box::new(NullStatusMonitor),
            state: RunState::Idle,
            working,
            run_id: None,
        }
    }

    /// Replace the status monitor (builder style).
    pub fn with_monitor(mut self, monitor: Box<dyn StatusMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Id of the current or last run.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Plan id reported to jobs: parent-composed when nested.
    pub fn effective_plan_id(&self) -> String {
        match &self.config.parent {
            Some(parent) => parent.compose_plan_id(self.plan.plan_id()),
            None => self.plan.plan_id().to_string(),
        }
    }

    /// Ids the next round would dispatch. Empty once the run has ended.
    pub fn next_jobs(&self) -> Vec<String> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.working.ids(&self.working.admit())
    }

    pub fn remaining_count(&self) -> usize {
        self.working.remaining
    }

    pub fn total_job_count(&self) -> usize {
        self.plan.len()
    }

    /// Rounds the plan would take if every job succeeded.
    pub fn predict_rounds(&self) -> Vec<Vec<String>> {
        let mut working = WorkingGraph::new(self.plan.graph());
        let mut rounds = Vec::new();
        while working.remaining > 0 {
            let admitted = working.admit();
            if admitted.is_empty() {
                break;
            }
            for &i in &admitted {
                working.retire(i);
            }
            rounds.push(working.ids(&admitted));
        }
        rounds
    }

    /// Run on a fresh multi-thread tokio runtime.
    pub fn run_blocking(&mut self) -> FrofResult<RunReport> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| FrofError::Runtime(e.to_string()))?;
        runtime.block_on(self.execute())
    }

    fn base_env(&self, run_id: &str, plan_id: &str) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for name in &self.config.passthrough_env {
            if let Ok(value) = std::env::var(name) {
                env.insert(name.clone(), value);
            }
        }
        env.insert(ENV_RUN_ID.to_string(), run_id.to_string());
        env.insert(ENV_PLAN_ID.to_string(), plan_id.to_string());
        env.insert(ENV_VERSION.to_string(), FROF_VERSION.to_string());
        if let Some(parent) = &self.config.parent {
            env.insert(ENV_PARENT_PLAN_ID.to_string(), parent.plan_id.clone());
            if let Some(run) = &parent.run_id {
                env.insert(ENV_PARENT_RUN_ID.to_string(), run.clone());
            }
        }
        env
    }

    fn snapshot(&self, report: &RunReport, start: Instant) -> StatusSnapshot {
        StatusSnapshot {
            run_id: report.run_id.clone(),
            plan_id: report.plan_id.clone(),
            round: report.rounds.len(),
            next_jobs: self.next_jobs(),
            remaining: self.remaining_count(),
            total: self.total_job_count(),
            elapsed: start.elapsed(),
        }
    }

    fn finish(&mut self, mut report: RunReport, state: RunState, start: Instant) -> RunReport {
        self.state = state;
        report.state = state;
        report.not_started = self.working.unretired();
        report.total_duration = start.elapsed();
        report
    }

    /// Drive the plan to completion.
    ///
    /// Returns the run report on success, `ExecutionFailed` with every
    /// failure of the terminating round, or `Cancelled` when the token fired.
    /// Both errors carry the partial report.
    pub async fn execute(&mut self) -> FrofResult<RunReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let plan_id = self.effective_plan_id();
        let env = self.base_env(&run_id, &plan_id);
        let cancel = self.config.cancel.clone();
        let workers = Arc::new(Semaphore::new(self.config.max_jobs.get()));

        self.working = WorkingGraph::new(self.plan.graph());
        self.state = RunState::Running;
        self.run_id = Some(run_id.clone());

        let mut report = RunReport {
            run_id,
            plan_id,
            state: RunState::Running,
            rounds: Vec::new(),
            succeeded: Vec::new(),
            not_started: Vec::new(),
            total_duration: Default::default(),
        };

        info!(
            run_id = %report.run_id,
            plan_id = %report.plan_id,
            jobs = self.total_job_count(),
            max_jobs = self.config.max_jobs.get(),
            "run starting"
        );
        let launch = self.snapshot(&report, start);
        self.monitor.launch_status(&launch);

        while self.working.remaining > 0 {
            if cancel.is_cancelled() {
                info!(rounds = report.rounds.len(), "run cancelled");
                let report = self.finish(report, RunState::Cancelled, start);
                return Err(FrofError::Cancelled(Box::new(report)));
            }

            let admitted = self.working.admit();
            if admitted.is_empty() {
                // unreachable for a validated plan
                self.state = RunState::Failed;
                return Err(FrofError::Cycle {
                    members: self.working.unretired(),
                });
            }

            let index = report.rounds.len();
            info!(
                round = index,
                admitted = admitted.len(),
                remaining = self.working.remaining,
                "dispatching round"
            );
            let round_start = Instant::now();

            let mut handles = Vec::with_capacity(admitted.len());
            for (iter, &i) in admitted.iter().enumerate() {
                let node = &self.working.nodes[i];
                let mut job_env = env.clone();
                job_env.insert(ENV_BATCH_ITER.to_string(), iter.to_string());
                job_env.insert(ENV_JOB_NAME.to_string(), node.id.clone());
                debug!(job = %node.id, kind = node.job.kind(), batch_iter = iter, "dispatching job");

                let job = node.job.clone();
                let workers = Arc::clone(&workers);
                let cancel = cancel.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return JobOutcome::Failure(ExitInfo::Cancelled),
                        permit = workers.acquire_owned() => match permit {
                            Ok(p) => p,
                            Err(_) => return JobOutcome::Failure(ExitInfo::Cancelled),
                        },
                    };
                    job.run(&job_env, &cancel).await
                }));
            }

            // Barrier: every admitted job finishes before anything retires.
            let mut failures = Vec::new();
            for (handle, &i) in handles.into_iter().zip(&admitted) {
                let job_id = self.working.nodes[i].id.clone();
                let outcome = handle.await.unwrap_or_else(|e| {
                    JobOutcome::Failure(ExitInfo::Spawn {
                        message: format!("job task failed: {}", e),
                    })
                });
                match outcome {
                    JobOutcome::Success => report.succeeded.push(job_id),
                    JobOutcome::Failure(detail) => {
                        warn!(job = %job_id, error = %detail, "job failed");
                        failures.push(JobFailure { job_id, detail });
                    }
                }
            }

            for &i in &admitted {
                self.working.retire(i);
            }
            report.rounds.push(RoundRecord {
                index,
                jobs: self.working.ids(&admitted),
                failures: failures.clone(),
                duration: round_start.elapsed(),
            });

            let real_failure = failures
                .iter()
                .any(|f| f.detail != ExitInfo::Cancelled);
            let outcome = if real_failure {
                Some(RunState::Failed)
            } else if cancel.is_cancelled() {
                Some(RunState::Cancelled)
            } else if !failures.is_empty() {
                Some(RunState::Failed)
            } else {
                None
            };

            if let Some(state) = outcome {
                self.state = state;
            }
            let status = self.snapshot(&report, start);
            self.monitor.emit_status(&status);

            match outcome {
                Some(RunState::Cancelled) => {
                    info!(rounds = report.rounds.len(), "run cancelled");
                    let report = self.finish(report, RunState::Cancelled, start);
                    return Err(FrofError::Cancelled(Box::new(report)));
                }
                Some(_) => {
                    let report = self.finish(report, RunState::Failed, start);
                    return Err(FrofError::ExecutionFailed(Box::new(ExecutionFailed {
                        failures,
                        report,
                    })));
                }
                None => {}
            }
        }

        let report = self.finish(report, RunState::Completed, start);
        info!(
            rounds = report.rounds.len(),
            elapsed_ms = report.total_duration.as_millis() as u64,
            "run completed"
        );
        Ok(report)
    }
}
