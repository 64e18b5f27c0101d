//! Writes deflate zip archives for eligible files and classifies every failure.
//!
//! Nothing in this module returns an error past [`ArchiveWriter::compress`] or
//! [`ArchiveWriter::compress_batch`]: each call ends in an [`Outcome`].

use super::{CompressionTask, FailureKind, Outcome};
use crate::utils::paths;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Largest entry a zip archive can hold without zip64 extensions.
pub const ZIP32_ENTRY_LIMIT: u64 = u32::MAX as u64;

/// Per-file failures. The `Display` text becomes the outcome's detail.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to {operation} {path}: {source}")]
    Zip {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("{path} is {size} bytes, exceeding the {limit} byte zip entry limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("archive written but failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(operation: &'static str, path: &Path, source: ZipError) -> Self {
        ArchiveError::Zip {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ArchiveError::Io { source, .. } if is_size_limit(source) => FailureKind::ArchiveTooLarge,
            ArchiveError::Io { .. } => FailureKind::Unexpected,
            ArchiveError::Zip {
                source: ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_),
                ..
            } => FailureKind::BadArchive,
            ArchiveError::Zip {
                source: ZipError::Io(source),
                ..
            } if is_size_limit(source) => FailureKind::ArchiveTooLarge,
            ArchiveError::Zip { .. } => FailureKind::Unexpected,
            ArchiveError::TooLarge { .. } => FailureKind::ArchiveTooLarge,
            ArchiveError::Delete { .. } => FailureKind::PostDeleteFailed,
        }
    }

    pub fn into_outcome(self) -> Outcome {
        Outcome::failure(self.kind(), self.to_string())
    }
}

/// Removes a source whose archive is complete.
fn remove_source(path: &Path) -> Result<(), ArchiveError> {
    fs::remove_file(path).map_err(|source| ArchiveError::Delete {
        path: path.to_path_buf(),
        source,
    })
}

/// The zip writer reports an oversized entry without zip64 as a plain I/O error.
fn is_size_limit(error: &io::Error) -> bool {
    error.to_string().contains("Large file option")
}

#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    compression_level: Option<i32>,
    allow_zip64: bool,
    entry_limit: u64,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new(None, true)
    }
}

impl ArchiveWriter {
    pub fn new(compression_level: Option<i32>, allow_zip64: bool) -> Self {
        Self {
            compression_level,
            allow_zip64,
            entry_limit: ZIP32_ENTRY_LIMIT,
        }
    }

    /// Overrides the size above which an entry needs zip64.
    pub fn with_entry_limit(mut self, limit: u64) -> Self {
        self.entry_limit = limit;
        self
    }

    /// Compresses one file into its own single-entry archive.
    ///
    /// The entry is stored under the source's base name. The source is removed
    /// only after the archive is complete, and only if the task asks for it.
    pub fn compress(&self, task: &CompressionTask) -> Outcome {
        let source = &task.source_path;
        let target = task.target_path();

        if let Err(e) = self.write_single(source, &target) {
            tracing::warn!("Failed to compress {:?}: {}", source, e);
            return e.into_outcome();
        }

        if task.delete_source_on_success {
            if let Err(e) = remove_source(source) {
                tracing::warn!("{}", e);
                return e.into_outcome();
            }
        }

        tracing::debug!("Compressed {:?} -> {:?}", source, target);
        Outcome::Success
    }

    /// Compresses every task into one shared archive at `archive_path`.
    ///
    /// Entries are named relative to `base_dir`. Sources flagged for deletion
    /// are removed only once the whole archive is written.
    pub fn compress_batch(
        &self,
        tasks: &[CompressionTask],
        archive_path: &Path,
        base_dir: &Path,
    ) -> Outcome {
        let written = Self::with_archive(archive_path, |zip| {
            for task in tasks {
                let entry_name = paths::relative_entry_name(&task.source_path, base_dir);
                self.append_entry(zip, &task.source_path, entry_name)?;
            }
            Ok(())
        });
        if let Err(e) = written {
            tracing::warn!("Failed to write batch archive {:?}: {}", archive_path, e);
            return e.into_outcome();
        }

        let delete_failures: Vec<String> = tasks
            .iter()
            .filter(|task| task.delete_source_on_success)
            .filter_map(|task| remove_source(&task.source_path).err())
            .map(|e| e.to_string())
            .collect();
        if !delete_failures.is_empty() {
            tracing::warn!(
                "Batch archive {:?} written, but {} sources could not be deleted",
                archive_path,
                delete_failures.len()
            );
            return Outcome::failure(FailureKind::PostDeleteFailed, delete_failures.join("; "));
        }

        tracing::info!(
            "Compressed {} files into {:?}",
            tasks.len(),
            archive_path
        );
        Outcome::Success
    }

    fn write_single(&self, source: &Path, target: &Path) -> Result<(), ArchiveError> {
        // Open the source before touching the target so a missing source leaves no archive.
        let input = File::open(source).map_err(|e| ArchiveError::io("open", source, e))?;
        Self::with_archive(target, |zip| {
            self.append_open_entry(zip, source, input, paths::archive_entry_name(source))
        })
    }

    fn append_entry<W: Write + io::Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        source: &Path,
        entry_name: String,
    ) -> Result<(), ArchiveError> {
        let input = File::open(source).map_err(|e| ArchiveError::io("open", source, e))?;
        self.append_open_entry(zip, source, input, entry_name)
    }

    fn append_open_entry<W: Write + io::Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        source: &Path,
        mut input: File,
        entry_name: String,
    ) -> Result<(), ArchiveError> {
        let size = input
            .metadata()
            .map_err(|e| ArchiveError::io("read metadata of", source, e))?
            .len();
        if size > self.entry_limit && !self.allow_zip64 {
            return Err(ArchiveError::TooLarge {
                path: source.to_path_buf(),
                size,
                limit: self.entry_limit,
            });
        }

        zip.start_file(entry_name, self.file_options(size))
            .map_err(|e| ArchiveError::zip("start entry for", source, e))?;
        io::copy(&mut input, zip).map_err(|e| ArchiveError::io("compress", source, e))?;
        Ok(())
    }

    fn file_options(&self, size: u64) -> FileOptions {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(self.compression_level)
            .large_file(self.allow_zip64 && size > self.entry_limit)
    }

    /// Creates `target`, lets `fill` add entries, and finishes the archive.
    /// A partially written archive is removed when anything fails.
    fn with_archive<F>(target: &Path, fill: F) -> Result<(), ArchiveError>
    where
        F: FnOnce(&mut ZipWriter<BufWriter<File>>) -> Result<(), ArchiveError>,
    {
        let output = File::create(target).map_err(|e| ArchiveError::io("create", target, e))?;

        // The writer is dropped before any cleanup below.
        let result = {
            let mut zip = ZipWriter::new(BufWriter::new(output));
            fill(&mut zip).and_then(|()| {
                let mut inner = zip
                    .finish()
                    .map_err(|e| ArchiveError::zip("finish", target, e))?;
                inner
                    .flush()
                    .map_err(|e| ArchiveError::io("flush", target, e))
            })
        };

        if result.is_err() {
            if let Err(e) = fs::remove_file(target) {
                tracing::debug!("Could not remove partial archive {:?}: {}", target, e);
            }
        }
        result
    }
}
