pub mod archive;
pub mod clean;
pub mod error;
pub mod ignore;
pub mod progress;
pub mod report;
pub mod run;
pub mod scanner;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::paths;

/// One eligible file, queued for exactly one pass through the archive writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionTask {
    pub source_path: PathBuf,
    pub preserve_original_extension: bool,
    pub delete_source_on_success: bool,
}

impl CompressionTask {
    pub fn new(source_path: PathBuf, options: RunOptions) -> Self {
        Self {
            source_path,
            preserve_original_extension: options.preserve_extension,
            delete_source_on_success: options.delete_originals,
        }
    }

    /// The archive path this task writes to.
    pub fn target_path(&self) -> PathBuf {
        paths::archive_target_path(&self.source_path, self.preserve_original_extension)
    }
}

/// The two per-run flags supplied by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub delete_originals: bool,
    pub preserve_extension: bool,
}

/// Classification of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// The archive could not be constructed as a valid zip.
    BadArchive,
    /// The entry or the archive exceeds the zip format's size limits.
    ArchiveTooLarge,
    /// Anything else: permissions, I/O, disk full, vanished files.
    Unexpected,
    /// The archive was written but the source could not be removed.
    PostDeleteFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::BadArchive => "BadArchive",
            FailureKind::ArchiveTooLarge => "ArchiveTooLarge",
            FailureKind::Unexpected => "Unexpected",
            FailureKind::PostDeleteFailed => "PostDeleteFailed",
        };
        f.write_str(name)
    }
}

/// Terminal result of compressing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { kind: FailureKind, detail: String },
}

impl Outcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The `"<FailureKind>: <detail>"` cause string used in reports, if this is a failure.
    pub fn cause(&self) -> Option<String> {
        match self {
            Outcome::Success => None,
            Outcome::Failure { kind, detail } => Some(format!("{}: {}", kind, detail)),
        }
    }
}

/// Outcomes of one run keyed by source path. Re-inserting a path replaces its outcome.
pub type OutcomeMap = BTreeMap<PathBuf, Outcome>;

/// A snapshot of run progress, emitted after every completed file.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RunProgress {
    pub processed: usize,
    pub total_eligible: usize,
    pub percent: u8,
    pub current_file: PathBuf,
}

impl RunProgress {
    pub fn idle() -> Self {
        Self {
            processed: 0,
            total_eligible: 0,
            percent: 0,
            current_file: PathBuf::new(),
        }
    }
}

/// The fixed set of dotted file extensions eligible for compression.
///
/// Matching is exact and case-sensitive: `.sav` does not match `.SAV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAllowList {
    extensions: BTreeSet<String>,
}

impl ExtensionAllowList {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| paths::normalize_extension(ext.as_ref()))
            .collect();
        Self { extensions }
    }

    pub fn contains(&self, path: &Path) -> bool {
        paths::dotted_extension(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }
}

impl Default for ExtensionAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

pub const DEFAULT_EXTENSIONS: [&str; 3] = [".sav", ".3dsav", ".f3sav"];

pub use archive::ArchiveWriter;
pub use error::CoreError;
pub use progress::ProgressAccumulator;
pub use report::{RunReport, RunSummary};
pub use run::{CompressionEngine, RunState};
pub use scanner::{DirectoryScanner, TraversalStats, TraversalVisitor};
pub use ignore::build_globset_from_patterns;
