//! Housekeeping for test trees: removing run artifacts and generating fixtures.

use super::CoreError;
use crate::utils::paths::{normalize_extension, ARCHIVE_EXTENSION};
use serde::Serialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub archives_removed: usize,
    pub logs_removed: usize,
    pub failures: usize,
}

/// Recursively removes `*.zip` archives and run logs named `log_file_name` under `root`.
pub fn clean_artifacts(root: &Path, log_file_name: &str) -> Result<CleanStats, CoreError> {
    if !root.is_dir() {
        return Err(CoreError::NotADirectory(root.to_path_buf()));
    }

    let mut stats = CleanStats::default();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let path = entry.path();
        let is_archive = path
            .extension()
            .is_some_and(|ext| ext == ARCHIVE_EXTENSION);
        let is_log = entry.file_name() == log_file_name;
        if !is_archive && !is_log {
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) if is_archive => stats.archives_removed += 1,
            Ok(()) => stats.logs_removed += 1,
            Err(e) => {
                tracing::warn!("Could not remove {:?}: {}", path, e);
                stats.failures += 1;
            }
        }
    }

    tracing::info!(
        "Cleaned {:?}: {} archives and {} logs removed",
        root,
        stats.archives_removed,
        stats.logs_removed
    );
    Ok(stats)
}

/// Fills `dir` with `count` files named `0<ext>`, `1<ext>`, ... whose content is
/// the decimal numbers `0..ints_per_file` written back to back.
pub fn generate_fixture(
    dir: &Path,
    count: usize,
    extension: &str,
    ints_per_file: usize,
) -> Result<Vec<std::path::PathBuf>, CoreError> {
    let extension = normalize_extension(extension).unwrap_or_default();
    fs::create_dir_all(dir).map_err(|e| CoreError::Io(e, dir.to_path_buf()))?;

    let content: String = (0..ints_per_file).map(|i| i.to_string()).collect();
    let mut written = Vec::with_capacity(count);
    for i in 0..count {
        let path = dir.join(format!("{}{}", i, extension));
        fs::write(&path, &content).map_err(|e| CoreError::Io(e, path.clone()))?;
        written.push(path);
    }

    tracing::info!("Generated {} fixture files in {:?}", count, dir);
    Ok(written)
}
