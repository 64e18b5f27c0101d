//! Events a running compression emits to its driver.

use crate::core::{RunProgress, RunSummary};

#[derive(Debug)]
pub enum RunEvent {
    /// Sent after every processed file, whatever its outcome.
    Progress(RunProgress),
    /// Terminal: the run completed and its report is available.
    Finished(Box<RunSummary>),
    /// Terminal: the run could not complete (unreadable root, cancellation).
    Failed(String),
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Progress(_))
    }
}
