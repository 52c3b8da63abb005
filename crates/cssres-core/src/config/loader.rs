//! Configuration file discovery and loading

use super::compiler_config::CssResConfig;
use crate::error::CssResError;
use crate::result::{Result, ResultExt};
use std::path::{Path, PathBuf};

/// File names searched by [`ConfigLoader::auto_discover`], in priority order
pub const CONFIG_FILE_NAMES: &[&str] = &[".cssresrc.toml", "cssres.toml"];

/// Configuration loader for discovering and loading config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover config file by traversing upward from start_path
    ///
    /// Starts from the given directory and moves up the directory tree until
    /// a config is found or the filesystem root is reached.
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path
            .canonicalize()
            .map_err(|e| CssResError::config_error(format!("Invalid path: {e}")))?;

        loop {
            for filename in CONFIG_FILE_NAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<CssResConfig> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CssResError::io_error(path, e))?;
        CssResConfig::from_toml(&content).map_err(|e| {
            CssResError::config_error(format!(
                "Failed to load config from '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load config from path or auto-discover
    ///
    /// If a custom path is provided, loads from that path. Otherwise searches
    /// upward from `start_dir` (or the current directory) and falls back to
    /// the defaults when no file exists.
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<CssResConfig> {
        if let Some(path) = custom_path {
            if !path.exists() {
                return Err(CssResError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        match Self::auto_discover(search_dir)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(CssResConfig::default()),
        }
    }

    /// Like [`ConfigLoader::load`], but logs a broken file and continues with
    /// the defaults
    pub fn load_or_default(start_dir: &Path) -> CssResConfig {
        Self::load(None, Some(start_dir))
            .log_and_continue()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_temp_config(dir: &Path, filename: &str, content: &str) -> PathBuf {
        let path = dir.join(filename);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path =
            create_temp_config(temp_dir.path(), "cssres.toml", "strict = true\nemit-rtl = false\n");

        let config = ConfigLoader::load_from_file(&config_path).unwrap();
        assert!(config.compiler.strict);
        assert!(!config.compiler.emit_rtl);
    }

    #[test]
    fn test_auto_discover_from_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("src/styles");
        fs::create_dir_all(&nested).unwrap();
        create_temp_config(temp_dir.path(), "cssres.toml", "strict = true");

        let found = ConfigLoader::auto_discover(&nested).unwrap();
        assert_eq!(found.unwrap().file_name().unwrap(), "cssres.toml");
    }

    #[test]
    fn test_auto_discover_priority() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_config(temp_dir.path(), "cssres.toml", "strict = false");
        create_temp_config(temp_dir.path(), ".cssresrc.toml", "strict = true");

        let found = ConfigLoader::auto_discover(temp_dir.path()).unwrap();
        assert_eq!(found.unwrap().file_name().unwrap(), ".cssresrc.toml");
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_temp_config(temp_dir.path(), "cssres.toml", "strict = [");

        let err = ConfigLoader::load_from_file(&config_path).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Failed to load config"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Some(Path::new("nonexistent.toml")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_recovers_from_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_config(temp_dir.path(), "cssres.toml", "cache-capacity = 0");

        let config = ConfigLoader::load_or_default(temp_dir.path());
        assert_eq!(config, CssResConfig::default());
    }
}
