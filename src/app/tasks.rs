use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use super::events::RunEvent;
use super::proxy::EventProxy;
use super::state::AppState;

use crate::core::{CompressionEngine, CoreError, RunOptions, RunSummary};

enum RunMode {
    PerFile,
    Batch(String),
}

/// Starts a compression run over `directory` in the background.
///
/// Fails immediately, without touching the state, when another run is active
/// or `directory` cannot be read. Otherwise the run proceeds on the blocking
/// pool and reports through `proxy`: one `Progress` per file, then exactly one
/// `Finished` or `Failed`. Must be called from within a tokio runtime.
pub fn start_run<P: EventProxy>(
    directory: PathBuf,
    delete_originals: bool,
    preserve_extension: bool,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Result<(), CoreError> {
    let options = RunOptions {
        delete_originals,
        preserve_extension,
    };
    launch(directory, options, RunMode::PerFile, proxy, state)
}

/// Like [`start_run`], but writes every eligible file into the single archive
/// `<directory>/<archive_name>`.
pub fn start_batch_run<P: EventProxy>(
    directory: PathBuf,
    delete_originals: bool,
    archive_name: String,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Result<(), CoreError> {
    let options = RunOptions {
        delete_originals,
        preserve_extension: false,
    };
    launch(directory, options, RunMode::Batch(archive_name), proxy, state)
}

/// Starts a run whose events arrive on the returned channel.
pub fn start_run_with_channel(
    directory: PathBuf,
    delete_originals: bool,
    preserve_extension: bool,
    state: Arc<Mutex<AppState>>,
) -> Result<mpsc::UnboundedReceiver<RunEvent>, CoreError> {
    let (sender, receiver) = mpsc::unbounded_channel();
    start_run(directory, delete_originals, preserve_extension, sender, state)?;
    Ok(receiver)
}

fn launch<P: EventProxy>(
    directory: PathBuf,
    options: RunOptions,
    mode: RunMode,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Result<(), CoreError> {
    let mut state_guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    if state_guard.is_running {
        tracing::warn!("Rejected run on {:?}: a run is already active", directory);
        return Err(CoreError::RunInProgress);
    }
    if !directory.is_dir() {
        return Err(CoreError::NotADirectory(directory));
    }
    std::fs::read_dir(&directory).map_err(|source| CoreError::RootUnreadable {
        path: directory.clone(),
        source,
    })?;
    let engine = state_guard.config.build_engine()?;

    let cancel_flag = state_guard.begin_run(directory.clone());
    tracing::info!("Spawning compression run for {:?}", directory);
    let handle = tokio::spawn(run_task(
        directory,
        options,
        mode,
        engine,
        proxy,
        state.clone(),
        cancel_flag,
    ));
    state_guard.run_task = Some(handle);
    Ok(())
}

async fn run_task<P: EventProxy>(
    directory: PathBuf,
    options: RunOptions,
    mode: RunMode,
    engine: CompressionEngine,
    proxy: P,
    state: Arc<Mutex<AppState>>,
    cancel_flag: Arc<AtomicBool>,
) {
    let progress_proxy = proxy.clone();
    let progress_state = state.clone();

    let joined = tokio::task::spawn_blocking(move || -> Result<RunSummary, CoreError> {
        let on_progress = |progress: crate::core::RunProgress| {
            if let Ok(mut state_lock) = progress_state.lock() {
                state_lock.progress = progress.clone();
            }
            progress_proxy.send_event(RunEvent::Progress(progress));
        };
        match mode {
            RunMode::PerFile => engine.run(&directory, options, &cancel_flag, on_progress),
            RunMode::Batch(archive_name) => {
                engine.run_batch(&directory, options, &archive_name, &cancel_flag, on_progress)
            }
        }
    })
    .await;
    let result = joined.map_err(CoreError::from).and_then(|result| result);

    let mut state_lock = state.lock().unwrap_or_else(PoisonError::into_inner);
    state_lock.end_run();
    match result {
        Ok(summary) => {
            tracing::info!("Run finished: {}", summary.report.summary_text().replace('\n', " "));
            state_lock.last_summary = Some(summary.clone());
            proxy.send_event(RunEvent::Finished(Box::new(summary)));
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            state_lock.last_error = Some(e.to_string());
            proxy.send_event(RunEvent::Failed(e.to_string()));
        }
    }
}
