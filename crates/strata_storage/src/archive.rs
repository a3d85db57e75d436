//! # Chunk Archive
//!
//! All chunk stores of a world in one file, used when archival mode is on.
//!
//! ## Format
//!
//! ```text
//! [magic:4 "SCAR"][version:4][count:4]
//! count x [x:4][y:4][z:4][len:4][bytes:len]
//! [crc32:4]   over everything before it
//! ```
//!
//! All integers are little-endian. Entries are sorted by coordinate.
//!
//! A save rewrites the archive: entries written in this save replace their
//! old versions, every other old entry is carried over.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use strata_world::ChunkCoord;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Archive magic bytes.
const ARCHIVE_MAGIC: &[u8; 4] = b"SCAR";

/// Archive format version.
const ARCHIVE_VERSION: u32 = 1;

const HEADER_LEN: usize = 12;
const ENTRY_HEADER_LEN: usize = 16;

/// Archive contents, keyed by coordinate.
pub type ArchiveEntries = BTreeMap<ChunkCoord, Vec<u8>>;

/// Serializes `entries` into one archive image.
///
/// # Errors
///
/// Returns [`StorageError::TooLarge`] if the entry count or an entry does
/// not fit a 32-bit length field.
pub fn encode_archive(entries: &ArchiveEntries) -> StorageResult<Vec<u8>> {
    let body: usize = entries.values().map(|b| ENTRY_HEADER_LEN + b.len()).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + body + 4);
    out.extend_from_slice(ARCHIVE_MAGIC);
    out.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
    out.extend_from_slice(&length_field(entries.len(), "entry count")?.to_le_bytes());
    for (coord, bytes) in entries {
        out.extend_from_slice(&coord.x.to_le_bytes());
        out.extend_from_slice(&coord.y.to_le_bytes());
        out.extend_from_slice(&coord.z.to_le_bytes());
        out.extend_from_slice(&length_field(bytes.len(), "entry")?.to_le_bytes());
        out.extend_from_slice(bytes);
    }
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

fn length_field(len: usize, what: &str) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| StorageError::TooLarge(format!("archive {what} of {len}")))
}

fn corrupt(reason: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        what: "chunk archive".into(),
        reason: reason.into(),
    }
}

fn read_u32(bytes: &[u8], at: usize) -> StorageResult<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| corrupt("truncated"))
}

fn read_i32(bytes: &[u8], at: usize) -> StorageResult<i32> {
    bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .map(i32::from_le_bytes)
        .ok_or_else(|| corrupt("truncated"))
}

/// Parses an archive image.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] for a bad magic, version or checksum,
/// or a truncated image.
pub fn decode_archive(bytes: &[u8]) -> StorageResult<ArchiveEntries> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(corrupt("shorter than header"));
    }
    let (content, crc_bytes) = bytes.split_at(bytes.len() - 4);
    let stored = read_u32(crc_bytes, 0)?;
    let computed = crc32fast::hash(content);
    if stored != computed {
        return Err(corrupt(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    if &content[..4] != ARCHIVE_MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = read_u32(content, 4)?;
    if version != ARCHIVE_VERSION {
        return Err(corrupt(format!("unsupported version {version}")));
    }
    let count = read_u32(content, 8)? as usize;

    let mut entries = BTreeMap::new();
    let mut at = HEADER_LEN;
    for _ in 0..count {
        let coord = ChunkCoord::new(
            read_i32(content, at)?,
            read_i32(content, at + 4)?,
            read_i32(content, at + 8)?,
        );
        let len = read_u32(content, at + 12)? as usize;
        at += ENTRY_HEADER_LEN;
        let data = content
            .get(at..at + len)
            .ok_or_else(|| corrupt(format!("entry {coord} runs past the end")))?;
        entries.insert(coord, data.to_vec());
        at += len;
    }
    if at != content.len() {
        return Err(corrupt("trailing bytes after last entry"));
    }
    Ok(entries)
}

/// The archive file of one world. Callers serialize access.
#[derive(Clone, Debug)]
pub struct ChunkArchive {
    path: PathBuf,
}

impl ChunkArchive {
    /// Archive at `path`. Nothing is read until asked.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Archive file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry. A missing archive is empty; an unreadable one is logged
    /// and treated as empty.
    #[must_use]
    pub fn read_all(&self) -> ArchiveEntries {
        match fs::read(&self.path) {
            Ok(bytes) => decode_archive(&bytes).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "chunk archive unreadable, treating as empty");
                ArchiveEntries::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => ArchiveEntries::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "chunk archive unreadable, treating as empty");
                ArchiveEntries::new()
            }
        }
    }

    /// One entry, if present.
    #[must_use]
    pub fn read_entry(&self, coord: ChunkCoord) -> Option<Vec<u8>> {
        self.read_all().remove(&coord)
    }

    /// Rewrites the archive with `updates` laid over the current entries.
    /// Returns the entry count of the new archive.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the new image cannot be written or
    /// renamed into place; the old archive is then left untouched.
    pub fn write_merged(&self, updates: ArchiveEntries) -> StorageResult<usize> {
        let mut entries = self.read_all();
        entries.extend(updates);
        let image = encode_archive(&entries)?;
        write_atomic(&self.path, &image)?;
        debug!(path = %self.path.display(), entries = entries.len(), bytes = image.len(), "chunk archive written");
        Ok(entries.len())
    }
}

/// Writes `bytes` to `path.tmp`, syncs it and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, &e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).map_err(|e| StorageError::io(&tmp, &e))?;
    file.write_all(bytes).map_err(|e| StorageError::io(&tmp, &e))?;
    file.sync_all().map_err(|e| StorageError::io(&tmp, &e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, &e))
}
