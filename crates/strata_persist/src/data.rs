//! # Persisted Data
//!
//! The format-agnostic value tree. Type handlers produce it, stores write it,
//! nothing else crosses the persistence boundary.

use std::collections::BTreeMap;

/// A storage-agnostic value.
///
/// Maps are ordered so that encoding the same tree always yields the same
/// bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PersistedData {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer. Unsigned values are stored bit-cast.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Ordered list.
    Array(Vec<PersistedData>),
    /// String-keyed map.
    Map(BTreeMap<String, PersistedData>),
}

impl PersistedData {
    /// Creates an empty map.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Returns true for [`PersistedData::Null`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean value, if this is a bool.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[inline]
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float, widening integers.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the byte slice, if this is a byte array.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements, if this is an array.
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&[PersistedData]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a map.
    #[inline]
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, PersistedData>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a key when this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PersistedData> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Inserts into a map. Does nothing on other variants.
    pub fn insert(&mut self, key: impl Into<String>, value: PersistedData) {
        if let Self::Map(entries) = self {
            entries.insert(key.into(), value);
        }
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for PersistedData {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PersistedData {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for PersistedData {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PersistedData {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for PersistedData {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for PersistedData {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_accessor_widens_integers() {
        assert_eq!(PersistedData::Integer(3).as_f64(), Some(3.0));
        assert_eq!(PersistedData::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(PersistedData::from("x").as_f64(), None);
    }

    #[test]
    fn test_map_insert_and_get() {
        let mut data = PersistedData::map();
        data.insert("a", PersistedData::Bool(true));
        assert_eq!(data.get("a"), Some(&PersistedData::Bool(true)));
        assert!(data.get("b").is_none());

        let mut not_a_map = PersistedData::Null;
        not_a_map.insert("a", PersistedData::Null);
        assert!(not_a_map.is_null());
    }
}
