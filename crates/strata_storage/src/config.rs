//! Storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Where and how a world is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding all worlds.
    pub root: PathBuf,
    /// World directory name under `root`.
    pub world_name: String,
    /// Keep chunks in one archive file instead of one file each.
    pub archive_chunks: bool,
    /// Seconds between automatic saves, 0 disables them.
    pub auto_save_interval_secs: u64,
    /// LZ4-compress store payloads.
    pub compress: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("saves"),
            world_name: "world".into(),
            archive_chunks: false,
            auto_save_interval_secs: 300,
            compress: true,
        }
    }
}

impl StorageConfig {
    /// Directory of this world.
    #[must_use]
    pub fn world_dir(&self) -> PathBuf {
        self.root.join(&self.world_name)
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the world name is empty or
    /// is not a plain directory name.
    pub fn validate(&self) -> StorageResult<()> {
        if self.world_name.is_empty() {
            return Err(StorageError::InvalidConfig("world_name must not be empty".into()));
        }
        if !is_plain_name(&self.world_name) {
            return Err(StorageError::InvalidConfig(format!(
                "world_name {:?} must be a plain directory name",
                self.world_name
            )));
        }
        Ok(())
    }
}

/// Letters, digits, `-`, `_` and `.`, not starting with a dot.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StorageConfig::default().validate().is_ok());
    }

    #[test]
    fn test_world_name_must_be_plain() {
        for bad in ["", "../escape", "a/b", ".hidden"] {
            let config = StorageConfig {
                world_name: bad.into(),
                ..StorageConfig::default()
            };
            assert!(config.validate().is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StorageConfig = toml::from_str("archive_chunks = true").unwrap();
        assert!(config.archive_chunks);
        assert_eq!(config.world_name, "world");
    }
}
