//! CLI subcommands — run, validate, plan, completions.

use crate::core::error::{FrofError, FrofResult};
use crate::core::executor::{Executor, ExecutorConfig};
use crate::core::plan::Plan;
use crate::core::types::RunReport;
use crate::monitor::MonitorKind;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::num::NonZeroUsize;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "frof",
    version,
    about = "Run dependency graphs of shell jobs described in the frof DSL"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); FROF_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan
    Run {
        /// Inline DSL text or path to a .frof file
        source: String,

        /// Global worker limit (default: available parallelism)
        #[arg(short = 'j', long, env = "FROF_MAX_JOBS")]
        max_jobs: Option<NonZeroUsize>,

        /// Progress display
        #[arg(long, value_enum, env = "FROF_MONITOR", default_value_t = MonitorKind::Line)]
        monitor: MonitorKind,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a plan without running it
    Validate {
        /// Inline DSL text or path to a .frof file
        source: String,
    },

    /// Show the plan id and the rounds a successful run would take
    Plan {
        /// Inline DSL text or path to a .frof file
        source: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> FrofResult<()> {
    match cmd {
        Commands::Run {
            source,
            max_jobs,
            monitor,
            json,
        } => cmd_run(&source, max_jobs, monitor, json),
        Commands::Validate { source } => cmd_validate(&source),
        Commands::Plan { source, json } => cmd_plan(&source, json),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

fn cmd_run(source: &str, max_jobs: Option<NonZeroUsize>, monitor: MonitorKind, json: bool) -> FrofResult<()> {
    let plan = Plan::resolve(source)?;
    let mut config = ExecutorConfig::default();
    if let Some(n) = max_jobs {
        config = config.with_max_jobs(n);
    }
    let cancel = config.cancel.clone();
    let mut executor = Executor::with_config(plan, config).with_monitor(monitor.build());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| FrofError::Runtime(e.to_string()))?;
    let result = runtime.block_on(async {
        let interrupt = tokio::spawn(cancel_on_interrupt(cancel));
        let result = executor.execute().await;
        interrupt.abort();
        result
    });

    if json {
        let report = match &result {
            Ok(report) => Some(report),
            Err(e) => e.report(),
        };
        if let Some(report) = report {
            print_json(report)?;
        }
    } else if let Ok(report) = &result {
        print_summary(report);
    }
    result.map(|_| ())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received, stopping after the current round");
        cancel.cancel();
    }
}

fn print_summary(report: &RunReport) {
    println!(
        "{}: {} jobs in {} rounds ({:.2}s)",
        report.state,
        report.succeeded.len(),
        report.rounds.len(),
        report.total_duration.as_secs_f64()
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> FrofResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| FrofError::Runtime(format!("cannot serialize report: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn cmd_validate(source: &str) -> FrofResult<()> {
    let plan = Plan::resolve(source)?;
    println!(
        "OK: {} jobs, {} edges (plan {})",
        plan.len(),
        plan.graph().edge_count(),
        plan.plan_id()
    );
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct PlanSummary<'a> {
    plan_id: &'a str,
    jobs: usize,
    rounds: Vec<Vec<String>>,
}

fn cmd_plan(source: &str, json: bool) -> FrofResult<()> {
    let plan = Plan::resolve(source)?;
    let executor = Executor::with_config(plan, ExecutorConfig::default());
    let summary = PlanSummary {
        plan_id: executor.plan().plan_id(),
        jobs: executor.total_job_count(),
        rounds: executor.predict_rounds(),
    };
    if json {
        return print_json(&summary);
    }

    println!("Plan {} ({} jobs)", summary.plan_id, summary.jobs);
    for (i, round) in summary.rounds.iter().enumerate() {
        println!("  round {}: {}", i, round.join(", "));
    }
    Ok(())
}

fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_plan(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("pipeline.frof");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from(["frof", "-vv", "run", "A -> B", "-j", "3", "--monitor", "none", "--json"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                source,
                max_jobs,
                monitor,
                json,
            } => {
                assert_eq!(source, "A -> B");
                assert_eq!(max_jobs, NonZeroUsize::new(3));
                assert_eq!(monitor, MonitorKind::None);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_zero_max_jobs() {
        assert!(Cli::try_parse_from(["frof", "run", "A", "--max-jobs", "0"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_success_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let src = write_plan(&dir, &format!("A -> B\nA: true\nB: touch '{}'\n", marker.display()));
        dispatch(Commands::Run {
            source: src,
            max_jobs: None,
            monitor: MonitorKind::None,
            json: false,
        })
        .unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_run_failure_is_error() {
        let err = dispatch(Commands::Run {
            source: "A -> B\nA: exit 2\n".to_string(),
            max_jobs: NonZeroUsize::new(1),
            monitor: MonitorKind::None,
            json: true,
        })
        .unwrap_err();
        assert!(matches!(err, FrofError::ExecutionFailed(_)));
        assert!(err.to_string().contains("A: exit code 2"));
    }

    #[test]
    fn test_validate_ok_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_plan(&dir, "A -> B\n");
        cmd_validate(&src).unwrap();

        let err = cmd_validate("A -> B\nB -> A\n").unwrap_err();
        assert!(matches!(err, FrofError::Cycle { .. }));
    }

    #[test]
    fn test_plan_text_and_json() {
        cmd_plan("&x: range(3)\nS -> T(&x[2])\n", false).unwrap();
        cmd_plan("&x: range(3)\nS -> T(&x[2])\n", true).unwrap();
        assert!(cmd_plan("A -> T(&missing)\n", false).is_err());
    }

    #[test]
    fn test_dispatch_completions() {
        dispatch(Commands::Completions { shell: Shell::Bash }).unwrap();
    }
}
