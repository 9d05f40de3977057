//! Store configuration
//!
//! Application constants live at the top; runtime settings are read from a
//! TOML file into `StoreConfig`.

use crate::error::{Result, StoreError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// FILE NAMES
// ============================================================================

/// Extension shared by the state file and cookie files
pub const EXT: &str = "tix";

/// Primary state file name, placed in the module directory
pub const STATE_FILE_NAME: &str = "bookmarks.tix";

/// Cookie file prefix; the index directory timestamp follows it
pub const COOKIE_PREFIX: &str = "indexer";

/// Sub-directory of the module directory holding the search index
pub const INDEX_DIR_NAME: &str = "index";

// ============================================================================
// SNAPSHOT FORMAT
// ============================================================================

/// Leading bytes of every snapshot file
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"TIDX";

/// Per-item bit vector layout
pub const FORMAT_LEGACY: u16 = 1;

/// Compressed bitmap layout
pub const FORMAT_CURRENT: u16 = 2;

// ============================================================================
// RUNTIME SETTINGS
// ============================================================================

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "tagindex";

/// Config file name inside `CONFIG_DIR_NAME`
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Runtime settings for opening a store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the state file and the `index` directory
    pub module_dir: PathBuf,
    /// Where cookie files go; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Whether convenience saves write on the calling thread
    pub sync_save: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("."),
            temp_dir: None,
            sync_save: false,
        }
    }
}

impl StoreConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// `<config dir>/tagindex/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Directory used for cookie files
    pub fn cookie_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let cfg = StoreConfig::from_toml(
            r#"
            module_dir = "/cases/c1/module"
            temp_dir = "/scratch"
            sync_save = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.module_dir, PathBuf::from("/cases/c1/module"));
        assert_eq!(cfg.cookie_dir(), PathBuf::from("/scratch"));
        assert!(cfg.sync_save);
    }

    #[test]
    fn test_parse_defaults() {
        let cfg = StoreConfig::from_toml("").unwrap();
        assert_eq!(cfg.module_dir, PathBuf::from("."));
        assert_eq!(cfg.cookie_dir(), std::env::temp_dir());
        assert!(!cfg.sync_save);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            StoreConfig::from_toml("module_dir = 3"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert!(!cfg.sync_save);
    }
}
