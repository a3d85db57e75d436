//! World manifest - `manifest.toml` in the world directory.
//!
//! ```toml
//! world_name = "world"
//! seed = 42
//! saved_at = 1760000000
//! chunk_count = 120
//! player_count = 2
//! global_entity_count = 17
//! format_version = 1
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::archive::write_atomic;
use crate::error::{StorageError, StorageResult};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Store format written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Summary of the last save of a world.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldManifest {
    /// World name.
    pub world_name: String,
    /// Generator seed.
    pub seed: u64,
    /// Save time, seconds since the Unix epoch.
    pub saved_at: u64,
    /// Chunk stores written by the save.
    pub chunk_count: usize,
    /// Player stores written by the save.
    pub player_count: usize,
    /// Entities in the global store.
    pub global_entity_count: usize,
    /// Store format version.
    pub format_version: u32,
}

impl WorldManifest {
    /// Manifest for a world that was never saved.
    #[must_use]
    pub fn new(world_name: impl Into<String>, seed: u64) -> Self {
        Self {
            world_name: world_name.into(),
            seed,
            format_version: FORMAT_VERSION,
            ..Self::default()
        }
    }

    /// Stamps the current time.
    pub fn touch(&mut self) {
        self.saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
    }

    /// Reads the manifest of the world at `dir`. `Ok(None)` for a world that
    /// has no manifest yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Manifest`] if the file exists but cannot be
    /// read or parsed, or was written by a newer format.
    pub fn read(dir: &Path) -> StorageResult<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Manifest(format!("{}: {e}", path.display()))),
        };
        let manifest: Self =
            toml::from_str(&text).map_err(|e| StorageError::Manifest(format!("{}: {e}", path.display())))?;
        if manifest.format_version > FORMAT_VERSION {
            return Err(StorageError::Manifest(format!(
                "format version {} is newer than {FORMAT_VERSION}",
                manifest.format_version
            )));
        }
        Ok(Some(manifest))
    }

    /// Writes the manifest into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Manifest`] if it cannot be rendered, or
    /// [`StorageError::Io`] if it cannot be written.
    pub fn write(&self, dir: &Path) -> StorageResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| StorageError::Manifest(e.to_string()))?;
        write_atomic(&dir.join(MANIFEST_FILE), text.as_bytes())
    }
}
