//! Database configuration
//!
//! Looked up, in order, from:
//! - a `<database file>.config` JSON sidecar next to the database
//! - `~/.config/sparse_merkle/config.json` (platform config dir)
//! - built-in defaults

use crate::store::StoreOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunables for a database
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delete nodes as soon as an update orphans them. Turn off to keep
    /// historical roots provable.
    pub prune_orphans: bool,
    /// zstd level for stored records
    pub compression_level: i32,
    /// Records below this size are stored raw
    pub compression_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        let store = StoreOptions::default();
        Config {
            prune_orphans: true,
            compression_level: store.compression_level,
            compression_threshold: store.compression_threshold,
        }
    }
}

impl Config {
    /// Load the config that applies to the database at `db_path`
    pub fn load(db_path: &Path) -> Result<Self> {
        let sidecar = Self::config_path(db_path);
        if sidecar.exists() {
            return Self::load_file(&sidecar);
        }

        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                return Self::load_file(&user);
            }
        }

        Ok(Self::default())
    }

    /// Read a config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save as the sidecar of the database at `db_path`
    pub fn save(&self, db_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::config_path(db_path), content)?;
        Ok(())
    }

    /// Record encoding options for the file store
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            compression_level: self.compression_level,
            compression_threshold: self.compression_threshold,
        }
    }

    /// Sidecar path for a database file (`tree.smt` → `tree.smt.config`)
    pub fn config_path(db_path: &Path) -> PathBuf {
        let mut config_path = db_path.to_path_buf();
        let file_name = db_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "tree.smt".to_string());
        config_path.set_file_name(format!("{}.config", file_name));
        config_path
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sparse_merkle").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_path() {
        let path = Config::config_path(Path::new("/tmp/state/tree.smt"));
        assert_eq!(path, PathBuf::from("/tmp/state/tree.smt.config"));
    }

    #[test]
    fn test_sidecar_roundtrip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tree.smt");

        let config = Config {
            prune_orphans: false,
            compression_level: 9,
            compression_threshold: 64,
        };
        config.save(&db_path).unwrap();

        assert_eq!(Config::load(&db_path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tree.smt");
        std::fs::write(Config::config_path(&db_path), r#"{"prune_orphans": false}"#).unwrap();

        let config = Config::load(&db_path).unwrap();
        assert!(!config.prune_orphans);
        assert_eq!(config.compression_level, Config::default().compression_level);
    }

    #[test]
    fn test_malformed_sidecar_is_config_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tree.smt");
        std::fs::write(Config::config_path(&db_path), "not json").unwrap();

        assert!(matches!(Config::load(&db_path), Err(Error::Config(_))));
    }
}
