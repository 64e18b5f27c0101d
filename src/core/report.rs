//! Partitions a finished run's outcomes and renders the summary and log text.

use super::{CoreError, OutcomeMap};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE_NAME: &str = "log.txt";

/// Successes and failures of one completed run.
///
/// Built from an [`OutcomeMap`] and never mutated afterwards. Both collections
/// are path-ordered, so every rendering is a pure function of the outcomes.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub success_files: BTreeSet<PathBuf>,
    /// Failed path -> `"<FailureKind>: <detail>"`.
    pub failed_files: BTreeMap<PathBuf, String>,
}

impl RunReport {
    pub fn build(outcomes: &OutcomeMap) -> Self {
        let mut report = RunReport::default();
        for (path, outcome) in outcomes {
            match outcome.cause() {
                None => {
                    report.success_files.insert(path.clone());
                }
                Some(cause) => {
                    report.failed_files.insert(path.clone(), cause);
                }
            }
        }
        report
    }

    pub fn success_count(&self) -> usize {
        self.success_files.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed_files.len()
    }

    pub fn total(&self) -> usize {
        self.success_count() + self.failure_count()
    }

    pub fn summary_text(&self) -> String {
        format!(
            "Successfully wrote {} files.\nFailed to write {} files.",
            self.success_count(),
            self.failure_count()
        )
    }

    /// Failed files with their causes, then successful files.
    pub fn detail_text(&self) -> String {
        let mut text = String::from("Failed files:\n\n");
        for (path, cause) in &self.failed_files {
            text.push_str(&format!("File: {}\nError cause: {}\n", path.display(), cause));
        }
        text.push_str("\nSuccessful Files:\n\n");
        for path in &self.success_files {
            text.push_str(&format!("File: {}\n", path.display()));
        }
        text
    }

    /// The full contents of the run log.
    pub fn log_text(&self) -> String {
        format!("{}\n\n{}", self.summary_text(), self.detail_text())
    }

    /// Writes the log into `directory` and returns its path.
    pub fn write_log(&self, directory: &Path, file_name: &str) -> Result<PathBuf, CoreError> {
        let log_path = directory.join(file_name);
        fs::write(&log_path, self.log_text()).map_err(|e| CoreError::Io(e, log_path.clone()))?;
        tracing::info!("Wrote compression log to {:?}", log_path);
        Ok(log_path)
    }
}

/// What a finished run hands back to its driver.
#[derive(Serialize, Clone, Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub log_path: PathBuf,
    /// Set when the log could not be written to `log_path`.
    pub log_error: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunSummary {
    /// A single human-readable completion message.
    pub fn message(&self) -> String {
        match &self.log_error {
            None => format!(
                "Compression complete.\n{}\nCompression log can be found at {}",
                self.report.summary_text(),
                self.log_path.display()
            ),
            Some(error) => format!(
                "Compression complete.\n{}\nCompression log could not be written: {}",
                self.report.summary_text(),
                error
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, Outcome};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn sample_outcomes() -> OutcomeMap {
        let mut outcomes = OutcomeMap::new();
        outcomes.insert(PathBuf::from("/saves/b.sav"), Outcome::Success);
        outcomes.insert(
            PathBuf::from("/saves/locked/c.sav"),
            Outcome::failure(FailureKind::Unexpected, "permission denied"),
        );
        outcomes.insert(PathBuf::from("/saves/a.sav"), Outcome::Success);
        outcomes
    }

    #[test]
    fn test_build_partitions_outcomes() {
        let report = RunReport::build(&sample_outcomes());

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(
            report.failed_files[&PathBuf::from("/saves/locked/c.sav")],
            "Unexpected: permission denied"
        );
    }

    #[test]
    fn test_summary_text() {
        let report = RunReport::build(&sample_outcomes());
        insta::assert_snapshot!(report.summary_text(), @r"
        Successfully wrote 2 files.
        Failed to write 1 files.
        ");
    }

    #[test]
    fn test_log_text_lists_failures_first() {
        let report = RunReport::build(&sample_outcomes());
        let expected = "Successfully wrote 2 files.\n\
                        Failed to write 1 files.\n\
                        \n\
                        Failed files:\n\
                        \n\
                        File: /saves/locked/c.sav\n\
                        Error cause: Unexpected: permission denied\n\
                        \n\
                        Successful Files:\n\
                        \n\
                        File: /saves/a.sav\n\
                        File: /saves/b.sav\n";
        assert_eq!(report.log_text(), expected);
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::build(&OutcomeMap::new());
        assert_eq!(
            report.summary_text(),
            "Successfully wrote 0 files.\nFailed to write 0 files."
        );
        assert_eq!(report.detail_text(), "Failed files:\n\n\nSuccessful Files:\n\n");
    }

    #[test]
    fn test_building_twice_is_identical() {
        let outcomes = sample_outcomes();
        let first = RunReport::build(&outcomes);
        let second = RunReport::build(&outcomes);
        assert_eq!(first, second);
        assert_eq!(first.summary_text(), second.summary_text());
        assert_eq!(first.detail_text(), second.detail_text());
    }

    #[test]
    #[traced_test]
    fn test_write_log_and_summary_message() {
        let dir = tempdir().unwrap();
        let report = RunReport::build(&sample_outcomes());

        let log_path = report.write_log(dir.path(), DEFAULT_LOG_FILE_NAME).unwrap();

        assert_eq!(log_path, dir.path().join("log.txt"));
        assert_eq!(fs::read_to_string(&log_path).unwrap(), report.log_text());
        assert!(logs_contain("Wrote compression log"));

        let now = Local::now();
        let summary = RunSummary {
            report,
            log_path: log_path.clone(),
            log_error: None,
            started_at: now,
            finished_at: now,
        };
        assert_eq!(
            summary.message(),
            format!(
                "Compression complete.\nSuccessfully wrote 2 files.\nFailed to write 1 files.\nCompression log can be found at {}",
                log_path.display()
            )
        );
    }
}
