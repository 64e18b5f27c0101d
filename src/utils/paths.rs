//! Path helpers shared by the scanner and the archive writer.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub const ARCHIVE_EXTENSION: &str = "zip";

/// Returns the final extension of `path` with a leading dot, e.g. `.sav`.
///
/// Dotfiles without a further extension (`.sav`) have no extension.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
}

/// Normalizes a configured extension to its dotted form. Blank entries are dropped.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if bare.is_empty() {
        None
    } else {
        Some(format!(".{}", bare))
    }
}

/// Derives the archive path for a source file.
///
/// With `preserve_extension` the `.zip` suffix is appended to the full file
/// name (`a.sav` -> `a.sav.zip`); otherwise the final extension is replaced
/// (`a.sav` -> `a.zip`).
pub fn archive_target_path(source: &Path, preserve_extension: bool) -> PathBuf {
    if preserve_extension {
        let mut name = OsString::from(source.as_os_str());
        name.push(".");
        name.push(ARCHIVE_EXTENSION);
        PathBuf::from(name)
    } else {
        source.with_extension(ARCHIVE_EXTENSION)
    }
}

/// The name a single-file archive stores its entry under: the base name only.
pub fn archive_entry_name(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string_lossy().into_owned())
}

/// Entry name for a batch archive: `source` relative to `base_dir`, `/`-separated.
/// Falls back to the base name when `source` is not under `base_dir`.
pub fn relative_entry_name(source: &Path, base_dir: &Path) -> String {
    match source.strip_prefix(base_dir) {
        Ok(relative) => relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => archive_entry_name(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension(Path::new("a.sav")), Some(".sav".to_string()));
        assert_eq!(dotted_extension(Path::new("dir/b.tar.gz")), Some(".gz".to_string()));
        assert_eq!(dotted_extension(Path::new(".sav")), None);
        assert_eq!(dotted_extension(Path::new("Makefile")), None);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("sav"), Some(".sav".to_string()));
        assert_eq!(normalize_extension(" .3dsav "), Some(".3dsav".to_string()));
        assert_eq!(normalize_extension("."), None);
        assert_eq!(normalize_extension(""), None);
    }

    #[test]
    fn test_archive_target_path_replaces_last_extension() {
        assert_eq!(
            archive_target_path(Path::new("/root/sub/c.3dsav"), false),
            PathBuf::from("/root/sub/c.zip")
        );
        assert_eq!(
            archive_target_path(Path::new("/root/save.v2.sav"), false),
            PathBuf::from("/root/save.v2.zip")
        );
    }

    #[test]
    fn test_archive_target_path_preserves_extension() {
        assert_eq!(
            archive_target_path(Path::new("/root/a.sav"), true),
            PathBuf::from("/root/a.sav.zip")
        );
    }

    #[test]
    fn test_entry_names() {
        assert_eq!(archive_entry_name(Path::new("/root/sub/c.3dsav")), "c.3dsav");
        assert_eq!(
            relative_entry_name(Path::new("/root/sub/c.3dsav"), Path::new("/root")),
            "sub/c.3dsav"
        );
        assert_eq!(
            relative_entry_name(Path::new("/elsewhere/c.3dsav"), Path::new("/root")),
            "c.3dsav"
        );
    }

    proptest! {
        #[test]
        fn prop_target_keeps_directory_and_ends_in_zip(
            stem in "[a-z0-9_]{1,12}",
            ext in "[a-z0-9]{1,6}",
            preserve in any::<bool>(),
        ) {
            let source = PathBuf::from(format!("/data/{}.{}", stem, ext));
            let target = archive_target_path(&source, preserve);
            prop_assert_eq!(target.parent(), source.parent());
            prop_assert_eq!(target.extension().and_then(|e| e.to_str()), Some("zip"));
            let expected = if preserve {
                format!("{}.{}.zip", stem, ext)
            } else {
                format!("{}.zip", stem)
            };
            prop_assert_eq!(target.file_name().and_then(|n| n.to_str()), Some(expected.as_str()));
        }
    }
}
