//! Depth-first traversal that classifies entries against the extension allow-list.

use super::{CoreError, ExtensionAllowList};
use globset::GlobSet;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Receives traversal callbacks.
///
/// For every listed directory, `on_directory_listed` fires once before any of
/// its entries are visited, carrying the number of entries that will later be
/// passed to `on_eligible`. Returning an error from `on_eligible` stops the
/// traversal and propagates the error.
pub trait TraversalVisitor {
    fn on_directory_listed(&mut self, directory: &Path, eligible: usize);
    fn on_eligible(&mut self, path: &Path) -> Result<(), CoreError>;
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Every entry seen, directories included.
    pub entries_visited: usize,
    pub directories_listed: usize,
    pub eligible: usize,
    /// Sub-directories that could not be listed and were skipped.
    pub unreadable_directories: usize,
}

struct ListedEntry {
    path: PathBuf,
    is_dir: bool,
}

pub struct DirectoryScanner {
    allow_list: ExtensionAllowList,
    exclude: GlobSet,
}

impl DirectoryScanner {
    pub fn new(
        allow_list: ExtensionAllowList,
        exclude_patterns: &HashSet<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            allow_list,
            exclude: super::build_globset_from_patterns(exclude_patterns)?,
        })
    }

    pub fn with_allow_list(allow_list: ExtensionAllowList) -> Self {
        Self {
            allow_list,
            exclude: GlobSet::empty(),
        }
    }

    /// An entry is eligible when its final extension is in the allow-list.
    ///
    /// Directories are tested the same way as files; a directory whose name
    /// carries an allowed extension is therefore eligible too.
    pub fn is_eligible(&self, path: &Path) -> bool {
        self.allow_list.contains(path)
    }

    /// Exclusions match the path relative to the run root, so the root's own
    /// ancestors never exclude anything.
    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        self.exclude.is_match(path.strip_prefix(root).unwrap_or(path))
    }

    /// Walks `root` depth-first.
    ///
    /// Each directory entry is recursed into first and then classified. Entry
    /// order within a directory is whatever the OS returns. Sub-directories
    /// that cannot be listed are logged and skipped; an unreadable `root` is an
    /// error.
    pub fn traverse<V: TraversalVisitor>(
        &self,
        root: &Path,
        visitor: &mut V,
    ) -> Result<TraversalStats, CoreError> {
        let entries = Self::list_directory(root).map_err(|source| CoreError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let mut stats = TraversalStats::default();
        self.visit_entries(root, root, entries, visitor, &mut stats)?;

        tracing::debug!(
            "Traversed {:?}: {} entries, {} eligible, {} unreadable directories",
            root,
            stats.entries_visited,
            stats.eligible,
            stats.unreadable_directories
        );
        Ok(stats)
    }

    fn visit_directory<V: TraversalVisitor>(
        &self,
        root: &Path,
        directory: &Path,
        visitor: &mut V,
        stats: &mut TraversalStats,
    ) -> Result<(), CoreError> {
        match Self::list_directory(directory) {
            Ok(entries) => self.visit_entries(root, directory, entries, visitor, stats),
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {:?}: {}", directory, e);
                stats.unreadable_directories += 1;
                Ok(())
            }
        }
    }

    fn visit_entries<V: TraversalVisitor>(
        &self,
        root: &Path,
        directory: &Path,
        entries: Vec<ListedEntry>,
        visitor: &mut V,
        stats: &mut TraversalStats,
    ) -> Result<(), CoreError> {
        let entries: Vec<ListedEntry> = entries
            .into_iter()
            .filter(|entry| !self.is_excluded(root, &entry.path))
            .collect();

        let eligible = entries
            .iter()
            .filter(|entry| self.is_eligible(&entry.path))
            .count();
        stats.directories_listed += 1;
        stats.eligible += eligible;
        visitor.on_directory_listed(directory, eligible);

        for entry in entries {
            stats.entries_visited += 1;
            if entry.is_dir {
                self.visit_directory(root, &entry.path, visitor, stats)?;
            }
            if self.is_eligible(&entry.path) {
                visitor.on_eligible(&entry.path)?;
            }
        }
        Ok(())
    }

    fn list_directory(directory: &Path) -> io::Result<Vec<ListedEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(directory)? {
            match entry {
                Ok(entry) => {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    entries.push(ListedEntry {
                        path: entry.path(),
                        is_dir,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", directory, e);
                }
            }
        }
        Ok(entries)
    }

    /// Counts the entries `traverse` would report as eligible, without visiting them.
    pub fn count_eligible(&self, root: &Path) -> Result<usize, CoreError> {
        fs::read_dir(root).map_err(|source| CoreError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let count = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(root, entry.path()))
            .filter_map(Result::ok)
            .filter(|entry| self.is_eligible(entry.path()))
            .count();
        Ok(count)
    }
}
