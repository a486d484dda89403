//! Per-key working copy used by one command invocation
//!
//! A `CommandItem` is resolved from the keyspace before the handler runs,
//! buffers every change the handler makes, and is committed back with
//! `writeback` once the handler succeeds.

use crate::error::CommandError;
use crate::store::{Database, Item, SortedSet, Stream, Value, ValueKind};
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone)]
pub struct CommandItem {
    key: Bytes,
    db: usize,
    value: Option<Value>,
    expire_at: Option<u64>,
    existed: bool,
    modified: bool,
    expire_modified: bool,
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $kind:expr, $ty:ty) => {
        /// Read access; `None` when the key is absent
        pub fn $get(&self) -> Result<Option<&$ty>, CommandError> {
            match &self.value {
                None => Ok(None),
                Some(Value::$variant(inner)) => Ok(Some(inner)),
                Some(_) => Err(CommandError::WrongType),
            }
        }

        /// Write access, creating an empty container when the key is absent
        pub fn $get_mut(&mut self) -> Result<&mut $ty, CommandError> {
            if self.value.is_none() {
                self.value = Some($kind.empty());
            }
            self.modified = true;
            match &mut self.value {
                Some(Value::$variant(inner)) => Ok(inner),
                _ => Err(CommandError::WrongType),
            }
        }
    };
}

impl CommandItem {
    /// Snapshot `key` from the keyspace
    ///
    /// With `default` set, an absent key starts as an empty container of
    /// that kind (not yet marked modified).
    pub fn resolve(db: &mut Database, key: Bytes, default: Option<ValueKind>) -> Self {
        let index = db.index();
        match db.get(&key) {
            Some(item) => CommandItem {
                value: Some(item.value.clone()),
                expire_at: item.expire_at,
                existed: true,
                modified: false,
                expire_modified: false,
                key,
                db: index,
            },
            None => CommandItem {
                value: default.map(|kind| kind.empty()),
                expire_at: None,
                existed: false,
                modified: false,
                expire_modified: false,
                key,
                db: index,
            },
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn db_index(&self) -> usize {
        self.db
    }

    /// Whether the key currently holds a value (a default container counts
    /// only once something was written to it)
    pub fn exists(&self) -> bool {
        match &self.value {
            None => false,
            Some(value) => self.existed || self.modified || !value.is_empty_container(),
        }
    }

    /// Whether the key existed when it was resolved
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn value(&self) -> Option<&Value> {
        if self.exists() {
            self.value.as_ref()
        } else {
            None
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        self.value().map(Value::kind)
    }

    /// Replace the value
    pub fn set(&mut self, value: Value) {
        self.value = Some(value);
        self.modified = true;
    }

    /// Delete the key on write-back
    pub fn clear(&mut self) {
        self.value = None;
        self.expire_at = None;
        self.modified = true;
    }

    /// Remove the value and its expiry from this item
    pub fn take(&mut self) -> Option<(Value, Option<u64>)> {
        let value = if self.exists() { self.value.take() } else { None };
        let expire_at = self.expire_at.take();
        self.modified = true;
        value.map(|v| (v, expire_at))
    }

    pub fn expire_at(&self) -> Option<u64> {
        if self.exists() {
            self.expire_at
        } else {
            None
        }
    }

    pub fn set_expire_at(&mut self, expire_at: Option<u64>) {
        if self.expire_at != expire_at {
            self.expire_at = expire_at;
            self.expire_modified = true;
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    typed_access!(string, string_mut, String, ValueKind::String, Bytes);
    typed_access!(list, list_mut, List, ValueKind::List, VecDeque<Bytes>);
    typed_access!(set_members, set_members_mut, Set, ValueKind::Set, HashSet<Bytes>);
    typed_access!(hash, hash_mut, Hash, ValueKind::Hash, HashMap<Bytes, Bytes>);
    typed_access!(zset, zset_mut, SortedSet, ValueKind::SortedSet, SortedSet);
    typed_access!(stream, stream_mut, Stream, ValueKind::Stream, Stream);

    /// Commit buffered changes to the keyspace
    ///
    /// A modified item whose value is gone, or is an empty container while
    /// `remove_empty` holds, deletes the key. With `do_not_create` a key that
    /// was absent at resolution is never created. Only a modified value
    /// notifies watchers; an expiry-only change updates the stored deadline.
    pub fn writeback(self, db: &mut Database, remove_empty: bool, do_not_create: bool) {
        if self.modified {
            let delete = match &self.value {
                None => true,
                Some(value) => remove_empty && value.is_empty_container(),
            };

            if delete {
                if db.remove(&self.key).is_none() && !self.existed {
                    return;
                }
            } else if let Some(value) = self.value {
                if do_not_create && !self.existed && !db.contains(&self.key) {
                    return;
                }
                db.insert(self.key.clone(), Item { value, expire_at: self.expire_at });
            }
            db.notify(&self.key);
        } else if self.expire_modified {
            if let Some(item) = db.get_mut(&self.key) {
                item.expire_at = self.expire_at;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Condvar;
    use std::sync::Arc;

    fn db() -> Database {
        Database::new(0, Arc::new(Condvar::new()))
    }

    fn key(k: &str) -> Bytes {
        Bytes::copy_from_slice(k.as_bytes())
    }

    #[test]
    fn test_create_and_delete_on_writeback() {
        let mut db = db();
        let mut item = CommandItem::resolve(&mut db, key("l"), Some(ValueKind::List));
        assert!(!item.exists());
        item.list_mut().unwrap().push_back(key("a"));
        item.writeback(&mut db, true, false);
        assert!(db.contains(b"l"));

        let mut item = CommandItem::resolve(&mut db, key("l"), Some(ValueKind::List));
        item.list_mut().unwrap().pop_front();
        item.writeback(&mut db, true, false);
        assert!(!db.contains(b"l"));
    }

    #[test]
    fn test_leave_empty_value() {
        let mut db = db();
        let mut item = CommandItem::resolve(&mut db, key("s"), None);
        item.stream_mut().unwrap();
        item.writeback(&mut db, false, false);
        assert!(db.contains(b"s"));
    }

    #[test]
    fn test_reads_never_notify() {
        let mut db = db();
        db.insert(key("k"), Item::new(Value::string("v")));
        db.watch(key("k"), 1);

        let item = CommandItem::resolve(&mut db, key("k"), Some(ValueKind::String));
        assert_eq!(item.string().unwrap(), Some(&key("v")));
        item.writeback(&mut db, true, false);
        assert!(!db.is_touched(1));

        let mut item = CommandItem::resolve(&mut db, key("k"), None);
        item.set(Value::string("v"));
        item.writeback(&mut db, true, false);
        assert!(db.is_touched(1));
    }

    #[test]
    fn test_do_not_create() {
        let mut db = db();
        let mut item = CommandItem::resolve(&mut db, key("k"), None);
        item.set(Value::string("v"));
        item.writeback(&mut db, true, true);
        assert!(!db.contains(b"k"));
    }

    #[test]
    fn test_expiry_only_change() {
        let mut db = db();
        db.insert(key("k"), Item::new(Value::string("v")));
        db.watch(key("k"), 1);

        let mut item = CommandItem::resolve(&mut db, key("k"), None);
        item.set_expire_at(Some(5_000));
        item.writeback(&mut db, true, false);
        assert_eq!(db.get(b"k").and_then(|i| i.expire_at), Some(5_000));
        assert!(!db.is_touched(1));
    }

    #[test]
    fn test_wrong_type_access() {
        let mut db = db();
        db.insert(key("k"), Item::new(Value::string("v")));
        let mut item = CommandItem::resolve(&mut db, key("k"), None);
        assert_eq!(item.list().unwrap_err(), CommandError::WrongType);
        assert!(item.hash_mut().is_err());
    }

    #[test]
    fn test_deleting_absent_key_is_silent() {
        let mut db = db();
        db.watch(key("k"), 1);
        let mut item = CommandItem::resolve(&mut db, key("k"), None);
        item.clear();
        item.writeback(&mut db, true, false);
        assert!(!db.is_touched(1));
    }
}
