//! Orchestrates one compression run: traversal, per-file archiving, progress
//! accounting and the final report.

use super::progress::percent;
use super::{
    ArchiveWriter, CompressionTask, CoreError, DirectoryScanner, FailureKind, Outcome,
    OutcomeMap, ProgressAccumulator, RunOptions, RunProgress, RunReport, RunSummary,
    TraversalVisitor,
};
use crate::core::report::DEFAULT_LOG_FILE_NAME;
use crate::utils::paths::ARCHIVE_EXTENSION;
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Mutable state of exactly one run. Every run builds a fresh one.
#[derive(Debug, Default)]
pub struct RunState {
    progress: ProgressAccumulator,
    outcomes: Mutex<OutcomeMap>,
    /// Archive path -> the source that writes it.
    targets: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> &ProgressAccumulator {
        &self.progress
    }

    /// Stores the outcome for `path` and counts the file as processed.
    pub fn record(&self, path: PathBuf, outcome: Outcome) -> RunProgress {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), outcome);
        let processed = self.progress.complete_one();
        let total_eligible = self.progress.total_eligible();
        RunProgress {
            processed,
            total_eligible,
            percent: percent(processed, total_eligible),
            current_file: path,
        }
    }

    /// Reserves `target` for `source`. If another source already holds it,
    /// returns that source and leaves the reservation unchanged.
    pub fn claim_target(&self, target: PathBuf, source: &Path) -> Result<(), PathBuf> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        match targets.entry(target) {
            Entry::Occupied(owner) if owner.get().as_path() != source => Err(owner.get().clone()),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(source.to_path_buf());
                Ok(())
            }
        }
    }

    pub fn into_outcomes(self) -> OutcomeMap {
        self.outcomes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct CompressionEngine {
    scanner: DirectoryScanner,
    writer: ArchiveWriter,
    parallel: bool,
    prescan: bool,
    log_file_name: String,
}

impl CompressionEngine {
    pub fn new(scanner: DirectoryScanner, writer: ArchiveWriter) -> Self {
        Self {
            scanner,
            writer,
            parallel: false,
            prescan: false,
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
        }
    }

    /// Compress independent files on the rayon pool instead of one at a time.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Count every eligible file before compressing anything, so the
    /// percentage never dips when deep directories are reached.
    pub fn with_prescan(mut self, prescan: bool) -> Self {
        self.prescan = prescan;
        self
    }

    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    /// Compresses every eligible file under `root` into its own archive and
    /// writes the run log into `root`.
    ///
    /// Per-file failures end up in the report. The run fails only when `root`
    /// cannot be read or the cancel flag is raised between files.
    pub fn run<F>(
        &self,
        root: &Path,
        options: RunOptions,
        cancel_flag: &AtomicBool,
        on_progress: F,
    ) -> Result<RunSummary, CoreError>
    where
        F: Fn(RunProgress) + Sync,
    {
        let started_at = Local::now();
        tracing::info!(
            "Starting compression run in {:?} (delete: {}, keep extension: {}, parallel: {})",
            root,
            options.delete_originals,
            options.preserve_extension,
            self.parallel
        );

        let state = RunState::new();
        self.prescan_if_enabled(root, &state)?;

        if self.parallel {
            let tasks = self.collect_tasks(root, options, cancel_flag, &state)?;
            tasks.par_iter().try_for_each(|task| {
                if cancel_flag.load(Ordering::Relaxed) {
                    return Err(CoreError::Cancelled);
                }
                let outcome = compress_claimed(&self.writer, task, &state);
                on_progress(state.record(task.source_path.clone(), outcome));
                Ok(())
            })?;
        } else {
            let mut visitor = SequentialCompressor {
                writer: &self.writer,
                state: &state,
                options,
                cancel_flag,
                on_progress: &on_progress,
                count_discoveries: !self.prescan,
            };
            self.scanner.traverse(root, &mut visitor)?;
        }

        Ok(self.finish(root, state, started_at))
    }

    /// Compresses every eligible file under `root` into the single archive
    /// `<root>/<archive_name>`. Every member shares the batch's one outcome.
    pub fn run_batch<F>(
        &self,
        root: &Path,
        options: RunOptions,
        archive_name: &str,
        cancel_flag: &AtomicBool,
        on_progress: F,
    ) -> Result<RunSummary, CoreError>
    where
        F: Fn(RunProgress),
    {
        let started_at = Local::now();
        tracing::info!("Starting batch compression run in {:?}", root);

        let state = RunState::new();
        self.prescan_if_enabled(root, &state)?;
        let tasks = self.collect_tasks(root, options, cancel_flag, &state)?;

        if tasks.is_empty() {
            tracing::info!("No eligible files under {:?}; no batch archive written", root);
        } else {
            let archive_path = root.join(batch_archive_name(archive_name));
            let outcome = self.writer.compress_batch(&tasks, &archive_path, root);
            for task in tasks {
                on_progress(state.record(task.source_path, outcome.clone()));
            }
        }

        Ok(self.finish(root, state, started_at))
    }

    fn prescan_if_enabled(&self, root: &Path, state: &RunState) -> Result<(), CoreError> {
        if self.prescan {
            let total = self.scanner.count_eligible(root)?;
            tracing::debug!("Prescan found {} eligible files", total);
            state.progress().set_total(total);
        }
        Ok(())
    }

    fn collect_tasks(
        &self,
        root: &Path,
        options: RunOptions,
        cancel_flag: &AtomicBool,
        state: &RunState,
    ) -> Result<Vec<CompressionTask>, CoreError> {
        let mut collector = TaskCollector {
            tasks: Vec::new(),
            state,
            options,
            cancel_flag,
            count_discoveries: !self.prescan,
        };
        self.scanner.traverse(root, &mut collector)?;
        Ok(collector.tasks)
    }

    fn finish(&self, root: &Path, state: RunState, started_at: DateTime<Local>) -> RunSummary {
        let progress = state.progress();
        let (processed, total) = (progress.processed(), progress.total_eligible());
        if !progress.is_complete() {
            tracing::warn!(
                "Run finished with {} of {} eligible files processed; the tree changed during the run",
                processed,
                total
            );
        }

        let report = RunReport::build(&state.into_outcomes());
        let log_path = root.join(&self.log_file_name);
        let log_error = match report.write_log(root, &self.log_file_name) {
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Failed to write compression log: {}", e);
                Some(e.to_string())
            }
        };

        tracing::info!(
            "Compression run finished: {}/{} processed, {} succeeded, {} failed",
            processed,
            total,
            report.success_count(),
            report.failure_count()
        );

        RunSummary {
            report,
            log_path,
            log_error,
            started_at,
            finished_at: Local::now(),
        }
    }
}

/// Compresses `task` unless another source of this run already owns its archive path.
fn compress_claimed(writer: &ArchiveWriter, task: &CompressionTask, state: &RunState) -> Outcome {
    let target = task.target_path();
    if let Err(owner) = state.claim_target(target.clone(), &task.source_path) {
        tracing::warn!(
            "Not compressing {:?}: {:?} already belongs to {:?}",
            task.source_path,
            target,
            owner
        );
        return Outcome::failure(
            FailureKind::Unexpected,
            format!(
                "archive {} already written for {}",
                target.display(),
                owner.display()
            ),
        );
    }
    writer.compress(task)
}

fn batch_archive_name(name: &str) -> String {
    let suffix = format!(".{}", ARCHIVE_EXTENSION);
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Compresses each eligible file the moment traversal reaches it.
struct SequentialCompressor<'a, F> {
    writer: &'a ArchiveWriter,
    state: &'a RunState,
    options: RunOptions,
    cancel_flag: &'a AtomicBool,
    on_progress: &'a F,
    count_discoveries: bool,
}

impl<F: Fn(RunProgress)> TraversalVisitor for SequentialCompressor<'_, F> {
    fn on_directory_listed(&mut self, _directory: &Path, eligible: usize) {
        if self.count_discoveries {
            self.state.progress().discover(eligible);
        }
    }

    fn on_eligible(&mut self, path: &Path) -> Result<(), CoreError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            tracing::info!("Compression run cancelled before {:?}", path);
            return Err(CoreError::Cancelled);
        }
        let task = CompressionTask::new(path.to_path_buf(), self.options);
        let outcome = compress_claimed(self.writer, &task, self.state);
        (self.on_progress)(self.state.record(task.source_path, outcome));
        Ok(())
    }
}

/// Gathers tasks for modes that compress after traversal finishes.
struct TaskCollector<'a> {
    tasks: Vec<CompressionTask>,
    state: &'a RunState,
    options: RunOptions,
    cancel_flag: &'a AtomicBool,
    count_discoveries: bool,
}

impl TraversalVisitor for TaskCollector<'_> {
    fn on_directory_listed(&mut self, _directory: &Path, eligible: usize) {
        if self.count_discoveries {
            self.state.progress().discover(eligible);
        }
    }

    fn on_eligible(&mut self, path: &Path) -> Result<(), CoreError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(CoreError::Cancelled);
        }
        self.tasks
            .push(CompressionTask::new(path.to_path_buf(), self.options));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExtensionAllowList;
    use std::fs;
    use std::io::Read;
    use std::sync::Mutex as StdMutex;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn engine() -> CompressionEngine {
        CompressionEngine::new(
            DirectoryScanner::with_allow_list(ExtensionAllowList::default()),
            ArchiveWriter::default(),
        )
    }

    /// One save at the top, three in a nested directory.
    fn nested_tree() -> TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "top.sav", "top");
        write(dir.path(), "deep/one.sav", "1");
        write(dir.path(), "deep/two.sav", "2");
        write(dir.path(), "deep/three.sav", "3");
        dir
    }

    fn run_collecting(
        engine: &CompressionEngine,
        root: &Path,
    ) -> (RunSummary, Vec<RunProgress>) {
        let events = StdMutex::new(Vec::new());
        let summary = engine
            .run(root, RunOptions::default(), &AtomicBool::new(false), |p| {
                events.lock().unwrap().push(p)
            })
            .unwrap();
        (summary, events.into_inner().unwrap())
    }

    #[test]
    fn test_record_last_write_wins() {
        let state = RunState::new();
        state.progress().discover(2);
        let path = PathBuf::from("/a.sav");
        state.record(path.clone(), Outcome::failure(FailureKind::Unexpected, "x"));
        let progress = state.record(path.clone(), Outcome::Success);

        assert_eq!(progress.processed, 2);
        assert_eq!(progress.percent, 100);
        let outcomes = state.into_outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[&path], Outcome::Success);
    }

    #[test]
    fn test_sequential_progress_ends_complete() {
        let dir = nested_tree();
        let (summary, events) = run_collecting(&engine(), dir.path());

        assert_eq!(events.len(), 4);
        for event in &events {
            assert!(event.processed <= event.total_eligible);
        }
        let last = events.last().unwrap();
        assert_eq!(last.processed, 4);
        assert_eq!(last.total_eligible, 4);
        assert_eq!(last.percent, 100);
        assert_eq!(summary.report.success_count(), 4);
        assert!(summary.log_error.is_none());
    }

    #[test]
    fn test_prescan_fixes_total_from_the_start() {
        let dir = nested_tree();
        let (_, events) = run_collecting(&engine().with_prescan(true), dir.path());

        assert!(events.iter().all(|event| event.total_eligible == 4));
        let percents: Vec<u8> = events.iter().map(|event| event.percent).collect();
        assert_eq!(percents, vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let dir = nested_tree();
        let (summary, events) = run_collecting(&engine().with_parallel(true), dir.path());

        assert_eq!(events.len(), 4);
        assert_eq!(events.iter().map(|e| e.processed).max(), Some(4));
        assert_eq!(summary.report.success_count(), 4);
        assert!(dir.path().join("deep/two.zip").exists());
    }

    #[test]
    fn test_cancelled_run_stops_without_log() {
        let dir = nested_tree();
        let result = engine().run(
            dir.path(),
            RunOptions::default(),
            &AtomicBool::new(true),
            |_| {},
        );

        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(!dir.path().join("log.txt").exists());
    }

    #[test]
    fn test_batch_run_records_every_member() {
        let dir = nested_tree();
        let summary = engine()
            .run_batch(
                dir.path(),
                RunOptions::default(),
                "saves",
                &AtomicBool::new(false),
                |_| {},
            )
            .unwrap();

        assert_eq!(summary.report.success_count(), 4);
        assert!(dir.path().join("saves.zip").exists());
        assert!(!dir.path().join("top.zip").exists());
    }

    #[test]
    fn test_batch_archive_name() {
        assert_eq!(batch_archive_name("saves"), "saves.zip");
        assert_eq!(batch_archive_name("saves.zip"), "saves.zip");
    }

    #[test]
    fn test_custom_log_file_name() {
        let dir = nested_tree();
        let (summary, _) = run_collecting(&engine().with_log_file_name("run.log"), dir.path());

        assert_eq!(summary.log_path, dir.path().join("run.log"));
        assert!(summary.log_path.exists());
        assert!(!dir.path().join("log.txt").exists());
    }

    #[test]
    fn test_claim_target_keeps_first_owner() {
        let state = RunState::new();
        let target = PathBuf::from("/saves/a.zip");
        let first = Path::new("/saves/a.sav");

        assert_eq!(state.claim_target(target.clone(), first), Ok(()));
        assert_eq!(state.claim_target(target.clone(), first), Ok(()));
        assert_eq!(
            state.claim_target(target, Path::new("/saves/a.3dsav")),
            Err(first.to_path_buf())
        );
    }

    /// `a.sav` and `a.3dsav` both map to `a.zip` when extensions are not kept.
    fn colliding_tree() -> TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.sav", "SAV-DATA");
        write(dir.path(), "a.3dsav", "3DSAV-DATA");
        dir
    }

    fn content_for(path: &Path) -> &'static [u8] {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sav") => &b"SAV-DATA"[..],
            _ => &b"3DSAV-DATA"[..],
        }
    }

    fn assert_one_archive_per_target(dir: &TempDir, summary: &RunSummary, delete: bool) {
        assert_eq!(summary.report.success_count(), 1);
        assert_eq!(summary.report.failure_count(), 1);

        let winner = summary.report.success_files.iter().next().unwrap();
        let (loser, cause) = summary.report.failed_files.iter().next().unwrap();
        assert!(cause.starts_with("Unexpected: archive "));
        assert!(cause.contains(&format!("already written for {}", winner.display())));

        let mut archive = zip::ZipArchive::new(fs::File::open(dir.path().join("a.zip")).unwrap())
            .unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        assert_eq!(Some(entry.name()), winner.file_name().and_then(|n| n.to_str()));
        assert_eq!(bytes, content_for(winner));

        assert!(loser.exists(), "the colliding source must be left alone");
        assert_eq!(fs::read(loser).unwrap(), content_for(loser));
        assert_eq!(winner.exists(), !delete);
    }

    #[test]
    fn test_colliding_targets_keep_both_sources_recoverable() {
        for delete in [false, true] {
            let dir = colliding_tree();
            let options = RunOptions {
                delete_originals: delete,
                preserve_extension: false,
            };

            let summary = engine()
                .run(dir.path(), options, &AtomicBool::new(false), |_| {})
                .unwrap();

            assert_one_archive_per_target(&dir, &summary, delete);
        }
    }

    #[test]
    fn test_colliding_targets_in_parallel_mode() {
        let dir = colliding_tree();
        let options = RunOptions {
            delete_originals: true,
            preserve_extension: false,
        };

        let summary = engine()
            .with_parallel(true)
            .run(dir.path(), options, &AtomicBool::new(false), |_| {})
            .unwrap();

        assert_one_archive_per_target(&dir, &summary, true);
    }

    #[test]
    fn test_preserved_extensions_do_not_collide() {
        let dir = colliding_tree();
        let options = RunOptions {
            delete_originals: false,
            preserve_extension: true,
        };

        let summary = engine()
            .run(dir.path(), options, &AtomicBool::new(false), |_| {})
            .unwrap();

        assert_eq!(summary.report.success_count(), 2);
        assert!(dir.path().join("a.sav.zip").exists());
        assert!(dir.path().join("a.3dsav.zip").exists());
    }

    #[test]
    fn test_empty_batch_writes_no_archive() {
        let dir = tempdir().unwrap();
        write(dir.path(), "notes.txt", "not a save");

        let summary = engine()
            .run_batch(
                dir.path(),
                RunOptions::default(),
                "saves",
                &AtomicBool::new(false),
                |_| {},
            )
            .unwrap();

        assert_eq!(summary.report.total(), 0);
        assert!(!dir.path().join("saves.zip").exists());
        assert!(dir.path().join("log.txt").exists());
    }
}
