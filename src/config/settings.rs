use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::CompressorConfig;

const APP_NAME: &str = "FileCompressor";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "filecompressor", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the configuration, from `override_path` or the platform config file.
///
/// A missing file is created with defaults. A file that does not parse is
/// migrated field by field if possible, otherwise replaced by defaults in memory.
pub fn load_config(override_path: Option<&Path>) -> Result<CompressorConfig> {
    let config_path = resolve_config_path(override_path)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = CompressorConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {:?}", config_path))?;

    match serde_json::from_str::<CompressorConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            migrate_legacy_config(&config_content).or_else(|_| Ok(CompressorConfig::default()))
        }
    }
}

/// Fills fields that are missing or null in an older config with their defaults.
fn migrate_legacy_config(config_content: &str) -> Result<CompressorConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = serde_json::to_value(CompressorConfig::default())?;
    let Value::Object(default_fields) = defaults else {
        anyhow::bail!("Default config did not serialize to an object");
    };

    for (key, default_val) in default_fields {
        // `Option` fields stay null; everything else gets its default.
        let missing = !obj.contains_key(&key);
        let null_but_required = obj.get(&key) == Some(&Value::Null) && !default_val.is_null();
        if missing || null_but_required {
            obj.insert(key, default_val);
        }
    }

    let migrated_config: CompressorConfig = serde_json::from_value(value)?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the configuration to `override_path` or the platform config file.
pub fn save_config(config: &CompressorConfig, override_path: Option<&Path>) -> Result<()> {
    let config_path = resolve_config_path(override_path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)
        .with_context(|| format!("Failed to write config file {:?}", config_path))?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the configuration to a user-specified JSON file.
pub fn export_config(config: &CompressorConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)
        .with_context(|| format!("Failed to export config to {:?}", export_path))?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a configuration from a user-specified JSON file, migrating older formats.
pub fn import_config(import_path: &Path) -> Result<CompressorConfig> {
    let config_content = fs::read_to_string(import_path)
        .with_context(|| format!("Failed to read config file {:?}", import_path))?;
    match serde_json::from_str::<CompressorConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.filecompressor.FileCompressor/
// Linux:   ~/.config/filecompressor/
// Windows: %APPDATA%/filecompressor/FileCompressor/config/

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config, CompressorConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = CompressorConfig {
            delete_originals: true,
            parallel: true,
            compression_level: Some(9),
            last_directory: Some(PathBuf::from("/saves")),
            ..Default::default()
        };

        save_config(&config, Some(&path)).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_legacy_config_is_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "extensions": [".sav"], "delete_originals": true, "log_file_name": null }"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.extensions.len(), 1);
        assert!(config.delete_originals);
        assert_eq!(config.log_file_name, "log.txt");
        assert!(config.allow_zip64);
    }

    #[test]
    fn test_corrupt_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json at all").unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), CompressorConfig::default());
    }

    #[test]
    fn test_export_and_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        let config = CompressorConfig {
            prescan: true,
            ..Default::default()
        };

        export_config(&config, &path).unwrap();

        assert_eq!(import_config(&path).unwrap(), config);
    }
}
