//! Single-line terminal progress.

use super::{StatusMonitor, StatusSnapshot};
use std::io::{self, Write};

/// Prints a header at launch, then rewrites one status line in place after
/// every round. Write errors are ignored.
pub struct OneLineStatusMonitor<W: Write + Send> {
    out: W,
}

impl OneLineStatusMonitor<io::Stderr> {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write + Send> OneLineStatusMonitor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> StatusMonitor for OneLineStatusMonitor<W> {
    fn launch_status(&mut self, snapshot: &StatusSnapshot) {
        let _ = writeln!(self.out, "Starting job with {} jobs total.", snapshot.total);
    }

    fn emit_status(&mut self, snapshot: &StatusSnapshot) {
        let _ = write!(
            self.out,
            "\r{} jobs running, {} remaining ({}%).",
            snapshot.next_jobs.len(),
            snapshot.remaining,
            snapshot.percent_complete()
        );
        if snapshot.remaining == 0 || snapshot.next_jobs.is_empty() {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }
}
