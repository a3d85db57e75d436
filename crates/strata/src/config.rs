//! # World Configuration
//!
//! One TOML file, read once at startup. Every field has a default.
//!
//! ```toml
//! seed = 1337
//!
//! [streaming]
//! cache_budget = 2048
//! worker_threads = 8
//!
//! [storage]
//! root = "saves"
//! world_name = "valley"
//! archive_chunks = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_storage::StorageConfig;
use strata_world::StreamingConfig;

use crate::error::{SessionError, SessionResult};

/// Everything a [`WorldSession`](crate::WorldSession) needs to start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunk streaming.
    pub streaming: StreamingConfig,
    /// Persistence.
    pub storage: StorageConfig,
    /// Generator seed, recorded in the manifest.
    pub seed: u64,
}

impl WorldConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the text is not valid TOML for
    /// this shape, or any other error from [`WorldConfig::validate`].
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks both sections.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> SessionResult<()> {
        self.streaming.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(WorldConfig::from_toml_str("").unwrap(), WorldConfig::default());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = WorldConfig::from_toml_str(
            r#"
            seed = 9

            [streaming]
            worker_threads = 2

            [storage]
            world_name = "valley"
            archive_chunks = true
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.streaming.worker_threads, 2);
        assert_eq!(config.streaming.cache_budget, StreamingConfig::default().cache_budget);
        assert_eq!(config.storage.world_name, "valley");
        assert!(config.storage.archive_chunks);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            WorldConfig::from_toml_str("[streaming]\nworker_threads = 0"),
            Err(SessionError::World(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("[storage]\nworld_name = \"../x\""),
            Err(SessionError::Storage(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("seed = \"not a number\""),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            WorldConfig::from_toml_file("/nonexistent/strata.toml"),
            Err(SessionError::Config(_))
        ));
    }
}
