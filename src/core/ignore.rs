use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;

/// Builds a `GlobSet` from `.gitignore`-style exclusion patterns.
///
/// Blank lines and `#` comments are skipped. A trailing `/` marks a directory
/// pattern, which matches the directory itself and everything beneath it.
/// Every other pattern matches at any depth.
pub fn build_globset_from_patterns(patterns: &HashSet<String>) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let trimmed_pattern = pattern.trim();
        if trimmed_pattern.is_empty() || trimmed_pattern.starts_with('#') {
            continue;
        }

        if let Some(dir_pattern) = trimmed_pattern.strip_suffix('/') {
            builder.add(Glob::new(&format!("**/{}", dir_pattern))?);
            builder.add(Glob::new(&format!("**/{}/**", dir_pattern))?);
        } else {
            builder.add(Glob::new(&format!("**/{}", trimmed_pattern))?);
        }
    }

    builder.build()
}
