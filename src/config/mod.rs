pub mod settings;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::core::report::DEFAULT_LOG_FILE_NAME;
use crate::core::{
    ArchiveWriter, CompressionEngine, CoreError, DirectoryScanner, ExtensionAllowList,
    DEFAULT_EXTENSIONS,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressorConfig {
    /// Dotted extensions eligible for compression.
    pub extensions: BTreeSet<String>,
    pub exclude_patterns: HashSet<String>,
    pub delete_originals: bool,
    pub preserve_extension: bool,
    pub compression_level: Option<i32>,
    pub allow_zip64: bool,
    pub parallel: bool,
    pub prescan: bool,
    pub log_file_name: String,
    pub last_directory: Option<PathBuf>,
}

impl CompressorConfig {
    pub fn allow_list(&self) -> ExtensionAllowList {
        ExtensionAllowList::new(&self.extensions)
    }

    /// Builds an engine configured from these settings.
    pub fn build_engine(&self) -> Result<CompressionEngine, CoreError> {
        let scanner = DirectoryScanner::new(self.allow_list(), &self.exclude_patterns)?;
        let writer = ArchiveWriter::new(self.compression_level, self.allow_zip64);
        Ok(CompressionEngine::new(scanner, writer)
            .with_parallel(self.parallel)
            .with_prescan(self.prescan)
            .with_log_file_name(self.log_file_name.clone()))
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            exclude_patterns: HashSet::new(),
            delete_originals: false,
            preserve_extension: false,
            compression_level: None,
            allow_zip64: true,
            parallel: false,
            prescan: false,
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            last_directory: None,
        }
    }
}
