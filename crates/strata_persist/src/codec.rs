//! # Binary Codec
//!
//! Encodes a [`PersistedData`] tree into a self-checking frame.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "SPD1"]
//! [1 byte: version]
//! [1 byte: flags (bit 0 = LZ4 body)]
//! [N bytes: body]
//! [4 bytes: CRC32 of everything above]
//!
//! Body value format (little-endian):
//! [1 byte: tag]
//!   0 null | 1 false | 2 true
//!   3 integer [8 bytes]
//!   4 float   [8 bytes]
//!   5 string  [4 bytes len][len bytes utf-8]
//!   6 bytes   [4 bytes len][len bytes]
//!   7 array   [4 bytes count][count values]
//!   8 map     [4 bytes count][count x ([4 bytes len][key] value)]
//! ```

use std::collections::BTreeMap;

use lz4_flex::{compress_prepend_size, decompress};

use crate::data::PersistedData;
use crate::error::{PersistError, PersistResult};

/// Magic bytes identifying a persisted frame.
const FRAME_MAGIC: &[u8; 4] = b"SPD1";

/// Current frame format version.
const FRAME_VERSION: u8 = 1;

/// Flag bit: body is LZ4 compressed.
const FLAG_LZ4: u8 = 0b0000_0001;

/// Header: magic + version + flags.
const HEADER_LEN: usize = 6;

/// Trailer: CRC32.
const TRAILER_LEN: usize = 4;

/// Deepest nesting the decoder accepts.
pub const MAX_DEPTH: usize = 128;

/// Largest uncompressed body a frame may carry (64 MiB).
pub const MAX_BODY_LEN: usize = 64 << 20;

/// LZ4 cannot expand input by more than this factor.
const LZ4_MAX_RATIO: usize = 255;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_MAP: u8 = 8;

/// Body compression applied by [`encode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// Body stored as-is.
    None,
    /// Body LZ4 compressed. Voxel payloads shrink roughly tenfold.
    #[default]
    Lz4,
}

/// Encodes a value tree into a framed byte buffer.
///
/// # Errors
///
/// Returns [`PersistError::TooLarge`] if the body would exceed
/// [`MAX_BODY_LEN`].
pub fn encode(data: &PersistedData, compression: Compression) -> PersistResult<Vec<u8>> {
    let mut body = Vec::with_capacity(256);
    write_value(&mut body, data)?;
    if body.len() > MAX_BODY_LEN {
        return Err(PersistError::TooLarge(format!("body of {} bytes", body.len())));
    }

    let (flags, body) = match compression {
        Compression::None => (0, body),
        Compression::Lz4 => (FLAG_LZ4, compress_prepend_size(&body)),
    };

    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN);
    out.extend_from_slice(FRAME_MAGIC);
    out.push(FRAME_VERSION);
    out.push(flags);
    out.extend_from_slice(&body);

    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decodes a frame produced by [`encode`].
///
/// # Errors
///
/// Returns an error if the frame is truncated, fails its checksum, uses an
/// unknown version, or contains a malformed value tree.
pub fn decode(bytes: &[u8]) -> PersistResult<PersistedData> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(PersistError::Malformed(format!(
            "frame too short ({} bytes)",
            bytes.len()
        )));
    }
    if &bytes[0..4] != FRAME_MAGIC {
        return Err(PersistError::Malformed("bad frame magic".into()));
    }

    let (framed, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = crc32fast::hash(framed);
    if stored != computed {
        return Err(PersistError::ChecksumMismatch { stored, computed });
    }

    let version = framed[4];
    if version > FRAME_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }
    let flags = framed[5];
    let body = &framed[HEADER_LEN..];

    let decompressed;
    let body = if flags & FLAG_LZ4 != 0 {
        decompressed = decompress_body(body)?;
        decompressed.as_slice()
    } else {
        body
    };

    let mut reader = Reader::new(body);
    let value = reader.read_value()?;
    if reader.remaining() != 0 {
        return Err(PersistError::Malformed(format!(
            "{} trailing bytes after value",
            reader.remaining()
        )));
    }
    Ok(value)
}

/// Inflates an LZ4 body whose first 4 bytes declare the inflated size. The
/// declared size is checked before anything is allocated.
fn decompress_body(body: &[u8]) -> PersistResult<Vec<u8>> {
    if body.len() < 4 {
        return Err(PersistError::Malformed("lz4 body missing size prefix".into()));
    }
    let (prefix, compressed) = body.split_at(4);
    let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    let plausible = compressed.len().saturating_mul(LZ4_MAX_RATIO);
    if declared > MAX_BODY_LEN || declared > plausible {
        return Err(PersistError::Malformed(format!(
            "lz4 body declares {declared} bytes from {} compressed",
            compressed.len()
        )));
    }
    decompress(compressed, declared).map_err(|e| PersistError::Malformed(format!("lz4: {e}")))
}

fn write_len(out: &mut Vec<u8>, len: usize) -> PersistResult<()> {
    let len = u32::try_from(len).map_err(|_| PersistError::TooLarge(format!("length {len}")))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_value(out: &mut Vec<u8>, data: &PersistedData) -> PersistResult<()> {
    match data {
        PersistedData::Null => out.push(TAG_NULL),
        PersistedData::Bool(false) => out.push(TAG_FALSE),
        PersistedData::Bool(true) => out.push(TAG_TRUE),
        PersistedData::Integer(i) => {
            out.push(TAG_INTEGER);
            out.extend_from_slice(&i.to_le_bytes());
        }
        PersistedData::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_le_bytes());
        }
        PersistedData::String(s) => {
            out.push(TAG_STRING);
            write_len(out, s.len())?;
            out.extend_from_slice(s.as_bytes());
        }
        PersistedData::Bytes(b) => {
            out.push(TAG_BYTES);
            write_len(out, b.len())?;
            out.extend_from_slice(b);
        }
        PersistedData::Array(items) => {
            out.push(TAG_ARRAY);
            write_len(out, items.len())?;
            for item in items {
                write_value(out, item)?;
            }
        }
        PersistedData::Map(entries) => {
            out.push(TAG_MAP);
            write_len(out, entries.len())?;
            for (key, value) in entries {
                write_len(out, key.len())?;
                out.extend_from_slice(key.as_bytes());
                write_value(out, value)?;
            }
        }
    }
    Ok(())
}

/// Cursor over a decoded body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, depth: 0 }
    }

    const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> PersistResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(PersistError::Malformed(format!(
                "unexpected end of data at offset {} (wanted {n} bytes)",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> PersistResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_8(&mut self) -> PersistResult<[u8; 8]> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(arr)
    }

    fn read_len(&mut self) -> PersistResult<usize> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    fn read_string(&mut self) -> PersistResult<String> {
        let len = self.read_len()?;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|e| PersistError::Malformed(format!("invalid utf-8: {e}")))
    }

    fn read_value(&mut self) -> PersistResult<PersistedData> {
        let tag = self.read_u8()?;
        match tag {
            TAG_NULL => Ok(PersistedData::Null),
            TAG_FALSE => Ok(PersistedData::Bool(false)),
            TAG_TRUE => Ok(PersistedData::Bool(true)),
            TAG_INTEGER => Ok(PersistedData::Integer(i64::from_le_bytes(self.read_8()?))),
            TAG_FLOAT => Ok(PersistedData::Float(f64::from_le_bytes(self.read_8()?))),
            TAG_STRING => Ok(PersistedData::String(self.read_string()?)),
            TAG_BYTES => {
                let len = self.read_len()?;
                Ok(PersistedData::Bytes(self.take(len)?.to_vec()))
            }
            TAG_ARRAY => {
                self.descend()?;
                let count = self.read_len()?;
                // Every element needs at least one byte.
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                self.depth -= 1;
                Ok(PersistedData::Array(items))
            }
            TAG_MAP => {
                self.descend()?;
                let count = self.read_len()?;
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = self.read_string()?;
                    let value = self.read_value()?;
                    entries.insert(key, value);
                }
                self.depth -= 1;
                Ok(PersistedData::Map(entries))
            }
            other => Err(PersistError::Malformed(format!(
                "unknown tag {other} at offset {}",
                self.pos - 1
            ))),
        }
    }

    fn descend(&mut self) -> PersistResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(PersistError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedData {
        let mut map = PersistedData::map();
        map.insert("name", PersistedData::from("crate"));
        map.insert("count", PersistedData::Integer(-42));
        map.insert("ratio", PersistedData::Float(0.25));
        map.insert("raw", PersistedData::Bytes(vec![1, 2, 3]));
        map.insert(
            "list",
            PersistedData::Array(vec![PersistedData::Null, PersistedData::Bool(true)]),
        );
        map
    }

    #[test]
    fn test_roundtrip_both_compressions() {
        let data = sample();
        for compression in [Compression::None, Compression::Lz4] {
            let bytes = encode(&data, compression).unwrap();
            assert_eq!(decode(&bytes).expect("decode"), data);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(encode(&sample(), Compression::Lz4).unwrap(), encode(&sample(), Compression::Lz4).unwrap());
    }

    #[test]
    fn test_corrupted_byte_fails_checksum() {
        let mut bytes = encode(&sample(), Compression::None).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            decode(&bytes),
            Err(PersistError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_is_malformed() {
        let bytes = encode(&sample(), Compression::None).unwrap();
        assert!(matches!(decode(&bytes[..5]), Err(PersistError::Malformed(_))));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut bytes = encode(&PersistedData::Null, Compression::None).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(PersistError::Malformed(_))));
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut data = PersistedData::Null;
        for _ in 0..=MAX_DEPTH {
            data = PersistedData::Array(vec![data]);
        }
        let bytes = encode(&data, Compression::None).unwrap();
        assert_eq!(decode(&bytes), Err(PersistError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_lying_length_prefix_does_not_overallocate() {
        // Valid frame whose array claims u32::MAX elements.
        let mut frame = Vec::new();
        frame.extend_from_slice(FRAME_MAGIC);
        frame.push(FRAME_VERSION);
        frame.push(0);
        frame.push(TAG_ARRAY);
        frame.extend_from_slice(&u32::MAX.to_le_bytes());
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        assert!(matches!(decode(&frame), Err(PersistError::Malformed(_))));
    }

    #[test]
    fn test_lying_lz4_size_is_rejected() {
        // Valid checksum, LZ4 body claiming a 4 GiB inflated size.
        let mut frame = Vec::new();
        frame.extend_from_slice(FRAME_MAGIC);
        frame.push(FRAME_VERSION);
        frame.push(FLAG_LZ4);
        frame.extend_from_slice(&u32::MAX.to_le_bytes());
        frame.extend_from_slice(&[0x10, TAG_NULL]);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let err = decode(&frame).unwrap_err();
        assert!(matches!(err, PersistError::Malformed(ref m) if m.contains("declares")), "{err}");
    }

    #[test]
    fn test_oversized_body_not_encoded() {
        let data = PersistedData::Bytes(vec![0; MAX_BODY_LEN + 1]);
        assert!(matches!(encode(&data, Compression::None), Err(PersistError::TooLarge(_))));
    }
}
