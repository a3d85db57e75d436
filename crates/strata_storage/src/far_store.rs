//! # Far-Store
//!
//! Durable byte storage keyed by chunk coordinate, player id or the single
//! global key.
//!
//! ## On-disk layout
//!
//! ```text
//! <world>/global.dat
//! <world>/players/<id>.dat
//! <world>/chunks/<x>_<y>_<z>.dat     loose mode
//! <world>/chunks.archive             archive mode
//! ```
//!
//! Writes to one key are serialized by a per-key lock. The archive is
//! rewritten under the world directory write lock; every other access holds
//! the read lock.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use strata_world::ChunkCoord;
use tracing::debug;

use crate::archive::{write_atomic, ArchiveEntries, ChunkArchive};
use crate::config::is_plain_name;
use crate::error::{StorageError, StorageResult};

/// Address of one store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    /// Chunk store at a coordinate.
    Chunk(ChunkCoord),
    /// Player store by id.
    Player(String),
    /// The world-scoped store.
    Global,
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk(coord) => write!(f, "chunk {coord}"),
            Self::Player(id) => write!(f, "player {id}"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Durable medium the storage manager writes to.
pub trait FarStore: Send + Sync {
    /// Bytes stored under `key`. `Ok(None)` when nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, key: &StoreKey) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn put(&self, key: &StoreKey, bytes: &[u8]) -> StorageResult<()>;

    /// Whether anything is stored under `key`.
    fn contains(&self, key: &StoreKey) -> bool;

    /// Writes a batch of chunk stores. Returns how many were written and the
    /// failures, keyed by coordinate.
    fn put_chunks(&self, chunks: Vec<(ChunkCoord, Vec<u8>)>) -> (usize, Vec<(ChunkCoord, StorageError)>) {
        let mut written = 0;
        let mut failed = Vec::new();
        for (coord, bytes) in chunks {
            match self.put(&StoreKey::Chunk(coord), &bytes) {
                Ok(()) => written += 1,
                Err(e) => failed.push((coord, e)),
            }
        }
        (written, failed)
    }
}

/// File-backed far-store rooted at one world directory.
pub struct DiskStore {
    dir: PathBuf,
    archive: Option<ChunkArchive>,
    /// Archive contents as last read or written.
    archive_index: Mutex<Option<ArchiveEntries>>,
    dir_lock: RwLock<()>,
    key_locks: Mutex<HashMap<StoreKey, Arc<Mutex<()>>>>,
}

impl DiskStore {
    /// Opens the world directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directories cannot be created.
    pub fn open(dir: impl Into<PathBuf>, archive_chunks: bool) -> StorageResult<Self> {
        let dir = dir.into();
        let players = dir.join("players");
        fs::create_dir_all(&players).map_err(|e| StorageError::io(&players, &e))?;
        if !archive_chunks {
            let chunks = dir.join("chunks");
            fs::create_dir_all(&chunks).map_err(|e| StorageError::io(&chunks, &e))?;
        }
        debug!(dir = %dir.display(), archive = archive_chunks, "disk store opened");
        Ok(Self::attach(dir, archive_chunks))
    }

    /// Uses the world directory as it is, creating nothing. Missing files
    /// read as absent; the first write creates what it needs.
    #[must_use]
    pub fn attach(dir: impl Into<PathBuf>, archive_chunks: bool) -> Self {
        let dir = dir.into();
        let archive = archive_chunks.then(|| ChunkArchive::new(dir.join("chunks.archive")));
        Self {
            dir,
            archive,
            archive_index: Mutex::new(None),
            dir_lock: RwLock::new(()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// World directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether chunks go to the archive.
    #[must_use]
    pub const fn is_archive(&self) -> bool {
        self.archive.is_some()
    }

    /// File holding `key` in loose mode.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for a player id that is not a
    /// plain file name.
    pub fn path_for(&self, key: &StoreKey) -> StorageResult<PathBuf> {
        match key {
            StoreKey::Global => Ok(self.dir.join("global.dat")),
            StoreKey::Player(id) => {
                if is_plain_name(id) {
                    Ok(self.dir.join("players").join(format!("{id}.dat")))
                } else {
                    Err(StorageError::InvalidKey(format!("player id {id:?}")))
                }
            }
            StoreKey::Chunk(coord) => Ok(self.dir.join("chunks").join(format!("{}.dat", coord.file_stem()))),
        }
    }

    fn key_lock(&self, key: &StoreKey) -> Arc<Mutex<()>> {
        Arc::clone(self.key_locks.lock().entry(key.clone()).or_default())
    }

    fn archive_entry(&self, archive: &ChunkArchive, coord: ChunkCoord) -> Option<Vec<u8>> {
        let mut index = self.archive_index.lock();
        index.get_or_insert_with(|| archive.read_all()).get(&coord).cloned()
    }
}

fn read_file(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, &e)),
    }
}

impl FarStore for DiskStore {
    fn get(&self, key: &StoreKey) -> StorageResult<Option<Vec<u8>>> {
        let _dir = self.dir_lock.read();
        if let (StoreKey::Chunk(coord), Some(archive)) = (key, &self.archive) {
            return Ok(self.archive_entry(archive, *coord));
        }
        let path = self.path_for(key)?;
        let lock = self.key_lock(key);
        let _key = lock.lock();
        read_file(&path)
    }

    fn put(&self, key: &StoreKey, bytes: &[u8]) -> StorageResult<()> {
        if let StoreKey::Chunk(coord) = key {
            if self.archive.is_some() {
                let (_, mut failed) = self.put_chunks(vec![(*coord, bytes.to_vec())]);
                return failed.pop().map_or(Ok(()), |(_, e)| Err(e));
            }
        }
        let path = self.path_for(key)?;
        let _dir = self.dir_lock.read();
        let lock = self.key_lock(key);
        let _key = lock.lock();
        write_atomic(&path, bytes)
    }

    fn contains(&self, key: &StoreKey) -> bool {
        let _dir = self.dir_lock.read();
        if let (StoreKey::Chunk(coord), Some(archive)) = (key, &self.archive) {
            let mut index = self.archive_index.lock();
            return index.get_or_insert_with(|| archive.read_all()).contains_key(coord);
        }
        self.path_for(key).is_ok_and(|p| p.is_file())
    }

    fn put_chunks(&self, chunks: Vec<(ChunkCoord, Vec<u8>)>) -> (usize, Vec<(ChunkCoord, StorageError)>) {
        let Some(archive) = &self.archive else {
            let mut written = 0;
            let mut failed = Vec::new();
            for (coord, bytes) in chunks {
                match self.put(&StoreKey::Chunk(coord), &bytes) {
                    Ok(()) => written += 1,
                    Err(e) => failed.push((coord, e)),
                }
            }
            return (written, failed);
        };
        if chunks.is_empty() {
            return (0, Vec::new());
        }

        let _dir = self.dir_lock.write();
        let count = chunks.len();
        let coords: Vec<_> = chunks.iter().map(|(c, _)| *c).collect();
        let updates: ArchiveEntries = chunks.into_iter().collect();
        let mut index = self.archive_index.lock();
        match archive.write_merged(updates) {
            Ok(_) => {
                *index = None;
                (count, Vec::new())
            }
            Err(e) => (0, coords.into_iter().map(|c| (c, e.clone())).collect()),
        }
    }
}

impl fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskStore")
            .field("dir", &self.dir)
            .field("archive", &self.archive.is_some())
            .finish_non_exhaustive()
    }
}

/// Keeps every store in memory.
#[derive(Debug, Default)]
pub struct MemoryFarStore {
    entries: Mutex<HashMap<StoreKey, Vec<u8>>>,
}

impl MemoryFarStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl FarStore for MemoryFarStore {
    fn get(&self, key: &StoreKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &StoreKey, bytes: &[u8]) -> StorageResult<()> {
        self.entries.lock().insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.entries.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_world() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("test_far_store_{id}"))
    }

    #[test]
    fn test_loose_layout() {
        let dir = temp_world();
        let store = DiskStore::open(&dir, false).unwrap();
        let coord = ChunkCoord::new(1, -2, 3);

        assert_eq!(store.get(&StoreKey::Chunk(coord)).unwrap(), None);
        store.put(&StoreKey::Chunk(coord), b"chunk").unwrap();
        store.put(&StoreKey::Player("alice".into()), b"player").unwrap();
        store.put(&StoreKey::Global, b"global").unwrap();

        assert!(dir.join("chunks").join("1_-2_3.dat").is_file());
        assert!(dir.join("players").join("alice.dat").is_file());
        assert!(dir.join("global.dat").is_file());
        assert!(store.contains(&StoreKey::Chunk(coord)));
        assert_eq!(store.get(&StoreKey::Global).unwrap(), Some(b"global".to_vec()));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_player_id_must_be_file_name() {
        let dir = temp_world();
        let store = DiskStore::open(&dir, false).unwrap();
        let key = StoreKey::Player("../../etc/passwd".into());
        assert!(matches!(store.put(&key, b"x"), Err(StorageError::InvalidKey(_))));
        assert!(!store.contains(&key));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_archive_mode_batches_chunks() {
        let dir = temp_world();
        let store = DiskStore::open(&dir, true).unwrap();
        let a = ChunkCoord::new(0, 0, 0);
        let b = ChunkCoord::new(5, 5, 5);

        let (written, failed) = store.put_chunks(vec![(a, vec![1]), (b, vec![2])]);
        assert_eq!(written, 2);
        assert!(failed.is_empty());
        store.put(&StoreKey::Chunk(a), &[3]).unwrap();

        assert!(dir.join("chunks.archive").is_file());
        assert!(!dir.join("chunks").exists());
        assert_eq!(store.get(&StoreKey::Chunk(a)).unwrap(), Some(vec![3]));
        assert_eq!(store.get(&StoreKey::Chunk(b)).unwrap(), Some(vec![2]));

        // A second store over the same directory sees the archive.
        let reopened = DiskStore::open(&dir, true).unwrap();
        assert!(reopened.contains(&StoreKey::Chunk(b)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_concurrent_writers_to_one_key() {
        let dir = temp_world();
        let store = Arc::new(DiskStore::open(&dir, false).unwrap());
        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.put(&StoreKey::Global, &[i; 64]).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let bytes = store.get(&StoreKey::Global).unwrap().unwrap();
        assert_eq!(bytes.len(), 64);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
        fs::remove_dir_all(&dir).ok();
    }
}
