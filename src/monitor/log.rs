//! Progress as `tracing` events.

use super::{StatusMonitor, StatusSnapshot};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusMonitor;

impl StatusMonitor for LogStatusMonitor {
    fn launch_status(&mut self, s: &StatusSnapshot) {
        info!(
            run_id = %s.run_id,
            plan_id = %s.plan_id,
            total = s.total,
            "run started"
        );
    }

    fn emit_status(&mut self, s: &StatusSnapshot) {
        info!(
            run_id = %s.run_id,
            round = s.round,
            next = s.next_jobs.len(),
            remaining = s.remaining,
            percent = s.percent_complete(),
            elapsed_ms = s.elapsed.as_millis() as u64,
            "round finished"
        );
    }
}
