//! Value types for the keyspace

use super::stream::Stream;
use super::zset::SortedSet;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// The kind of container a key holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    List,
    Set,
    Hash,
    SortedSet,
    Stream,
}

impl ValueKind {
    /// Name reported by TYPE
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::Hash => "hash",
            ValueKind::SortedSet => "zset",
            ValueKind::Stream => "stream",
        }
    }

    /// Parse a TYPE filter (`SCAN ... TYPE list`)
    pub fn from_type_name(name: &[u8]) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_slice() {
            b"string" => ValueKind::String,
            b"list" => ValueKind::List,
            b"set" => ValueKind::Set,
            b"hash" => ValueKind::Hash,
            b"zset" => ValueKind::SortedSet,
            b"stream" => ValueKind::Stream,
            _ => return None,
        };
        Some(kind)
    }

    /// A new, empty container of this kind
    pub fn empty(&self) -> Value {
        match self {
            ValueKind::String => Value::String(Bytes::new()),
            ValueKind::List => Value::List(VecDeque::new()),
            ValueKind::Set => Value::Set(HashSet::new()),
            ValueKind::Hash => Value::Hash(HashMap::new()),
            ValueKind::SortedSet => Value::SortedSet(SortedSet::new()),
            ValueKind::Stream => Value::Stream(Stream::new()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Represents the different types of values that can be stored
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe)
    String(Bytes),

    /// List of values (ordered)
    List(VecDeque<Bytes>),

    /// Set of unique values (unordered)
    Set(HashSet<Bytes>),

    /// Hash map (field -> value)
    Hash(HashMap<Bytes, Bytes>),

    /// Members ordered by score
    SortedSet(SortedSet),

    /// Append-only log with consumer groups
    Stream(Stream),
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Hash(_) => ValueKind::Hash,
            Value::SortedSet(_) => ValueKind::SortedSet,
            Value::Stream(_) => ValueKind::Stream,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// Whether write-back should delete the key holding this value
    ///
    /// Strings are never empty in that sense: `SET k ""` keeps the key.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(list) => list.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
            Value::Stream(stream) => stream.is_empty(),
        }
    }

    /// Try to get as string bytes
    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as list reference
    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get as set reference
    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Try to get as hash reference
    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            Value::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}
