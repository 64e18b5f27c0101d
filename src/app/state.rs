//! Defines the shared, mutable state of the application.

use crate::config::CompressorConfig;
use crate::core::{RunProgress, RunSummary};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Holds the complete, mutable state of the application.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so the driver and the
/// background run task can both reach it. At most one run is active at a time.
pub struct AppState {
    /// The application's configuration settings.
    pub config: CompressorConfig,
    /// The root directory of the current or most recent run.
    pub current_directory: Option<PathBuf>,
    /// `true` while a compression run is in progress.
    pub is_running: bool,
    /// The latest progress snapshot of the current run.
    pub progress: RunProgress,
    /// The summary of the most recent completed run.
    pub last_summary: Option<RunSummary>,
    /// Why the most recent run failed, if it did.
    pub last_error: Option<String>,
    /// A handle to the currently running task.
    pub run_task: Option<JoinHandle<()>>,
    /// A flag used to signal cancellation to the run, checked between files.
    pub cancellation_flag: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: CompressorConfig) -> Self {
        Self {
            config,
            current_directory: None,
            is_running: false,
            progress: RunProgress::idle(),
            last_summary: None,
            last_error: None,
            run_task: None,
            cancellation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks a new run as active and hands out its fresh cancellation flag.
    pub(crate) fn begin_run(&mut self, directory: PathBuf) -> Arc<AtomicBool> {
        self.is_running = true;
        self.current_directory = Some(directory.clone());
        self.config.last_directory = Some(directory);
        self.progress = RunProgress::idle();
        self.last_error = None;
        self.cancellation_flag = Arc::new(AtomicBool::new(false));
        self.cancellation_flag.clone()
    }

    /// Returns the state to idle once the run task is done.
    pub(crate) fn end_run(&mut self) {
        self.is_running = false;
        self.run_task = None;
    }

    /// Requests cancellation of the current run.
    ///
    /// The run stops before its next file and reports `Failed`; the file being
    /// compressed at that moment is finished first.
    pub fn cancel_current_run(&mut self) {
        if self.is_running {
            tracing::info!("Cancellation requested for the current run.");
            self.cancellation_flag.store(true, Ordering::SeqCst);
        } else {
            tracing::warn!("cancel_current_run called, but no run is active.");
        }
    }
}
