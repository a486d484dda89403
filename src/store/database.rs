//! Keyspace for one logical database
//!
//! Expiry is lazy: every read evaluates the item's deadline against the
//! database's logical time and evicts it when passed. Iteration and length
//! queries sweep all expired items first. Logical time only moves when the
//! dispatcher refreshes it, once per incoming command.

use super::entry::Item;
use bytes::Bytes;
use parking_lot::Condvar;
use siphasher::sip::SipHasher13;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use tracing::debug;

/// Type alias for our hash map with SipHasher
type StoreMap = HashMap<Bytes, Item, BuildHasherDefault<SipHasher13>>;

/// Identifies a client session in watcher and subscriber tables
pub type SessionId = u64;

/// Handle returned by `Database::add_listener`
pub type ListenerId = u64;

/// Callback run with the key of every committed write
pub type ChangeListener = Box<dyn Fn(&Bytes) + Send>;

/// One logical database
pub struct Database {
    index: usize,

    /// The main storage map
    entries: StoreMap,

    /// Logical time in milliseconds
    time_ms: u64,

    /// Key -> sessions watching it
    watchers: HashMap<Bytes, HashSet<SessionId>>,

    /// Sessions whose watched keys changed since WATCH
    touched: HashSet<SessionId>,

    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener: ListenerId,

    /// Woken on every committed write; shared with blocked sessions
    condvar: Arc<Condvar>,
}

impl Database {
    pub fn new(index: usize, condvar: Arc<Condvar>) -> Self {
        Database {
            index,
            entries: HashMap::with_capacity_and_hasher(1024, BuildHasherDefault::<SipHasher13>::default()),
            time_ms: 0,
            watchers: HashMap::new(),
            touched: HashSet::new(),
            listeners: Vec::new(),
            next_listener: 0,
            condvar,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    pub fn set_time(&mut self, now_ms: u64) {
        self.time_ms = now_ms;
    }

    pub fn condvar(&self) -> Arc<Condvar> {
        Arc::clone(&self.condvar)
    }

    /// Get an item, evicting it first if it has expired
    pub fn get(&mut self, key: &[u8]) -> Option<&Item> {
        self.evict_if_expired(key);
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Item> {
        self.evict_if_expired(key);
        self.entries.get_mut(key)
    }

    /// Check if a key exists (and is not expired)
    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Store an item without notifying anyone
    pub fn insert(&mut self, key: Bytes, item: Item) {
        self.entries.insert(key, item);
    }

    /// Remove an item without notifying anyone
    pub fn remove(&mut self, key: &[u8]) -> Option<Item> {
        self.evict_if_expired(key);
        self.entries.remove(key)
    }

    /// Drop every expired item; returns how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.time_ms;
        let before = self.entries.len();
        self.entries.retain(|_, item| !item.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("db{}: swept {} expired keys", self.index, removed);
        }
        removed
    }

    /// Number of live keys
    pub fn len(&mut self) -> usize {
        self.sweep_expired();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// All live keys, unordered
    pub fn keys(&mut self) -> Vec<Bytes> {
        self.sweep_expired();
        self.entries.keys().cloned().collect()
    }

    /// Remove all keys, touching every watcher
    pub fn clear(&mut self) {
        let keys: Vec<Bytes> = self.entries.keys().cloned().collect();
        self.entries.clear();
        for key in &keys {
            self.notify(key);
        }
    }

    /// Exchange the contents of two databases (SWAPDB)
    ///
    /// Watchers stay with their database index; every watched key of both
    /// sides counts as touched.
    pub fn swap_contents(&mut self, other: &mut Database) {
        std::mem::swap(&mut self.entries, &mut other.entries);
        self.touch_all_watchers();
        other.touch_all_watchers();
        self.condvar.notify_all();
        other.condvar.notify_all();
    }

    /// Register a session as watching `key`
    pub fn watch(&mut self, key: Bytes, session: SessionId) {
        self.watchers.entry(key).or_default().insert(session);
    }

    /// Whether a key watched by `session` changed since WATCH
    pub fn is_touched(&self, session: SessionId) -> bool {
        self.touched.contains(&session)
    }

    /// Remove a session from every watcher table of this database
    pub fn forget_session(&mut self, session: SessionId) {
        self.watchers.retain(|_, sessions| {
            sessions.remove(&session);
            !sessions.is_empty()
        });
        self.touched.remove(&session);
    }

    /// Publish a committed write of `key`
    ///
    /// Marks watching sessions dirty, runs change listeners and wakes every
    /// session blocked on this database. Called with the server lock held.
    pub fn notify(&mut self, key: &Bytes) {
        if let Some(sessions) = self.watchers.get(key) {
            self.touched.extend(sessions.iter().copied());
        }
        for (_, listener) in &self.listeners {
            listener(key);
        }
        self.condvar.notify_all();
    }

    pub fn add_listener(&mut self, listener: ChangeListener) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len()
    }

    fn touch_all_watchers(&mut self) {
        for sessions in self.watchers.values() {
            self.touched.extend(sessions.iter().copied());
        }
    }

    fn evict_if_expired(&mut self, key: &[u8]) {
        let now = self.time_ms;
        if self.entries.get(key).is_some_and(|item| item.is_expired(now)) {
            self.entries.remove(key);
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("index", &self.index)
            .field("keys", &self.entries.len())
            .field("time_ms", &self.time_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn db() -> Database {
        Database::new(0, Arc::new(Condvar::new()))
    }

    #[test]
    fn test_lazy_expiry() {
        let mut db = db();
        db.set_time(100);
        db.insert(Bytes::from("k"), Item::with_expiration(Value::string("v"), 200));

        db.set_time(200);
        assert!(db.contains(b"k"));

        db.set_time(201);
        assert!(db.get(b"k").is_none());
        assert_eq!(db.len(), 0);
    }

    #[test]
    fn test_sweep_on_len_and_keys() {
        let mut db = db();
        db.insert(Bytes::from("a"), Item::with_expiration(Value::string("1"), 10));
        db.insert(Bytes::from("b"), Item::new(Value::string("2")));
        db.set_time(50);
        assert_eq!(db.keys(), vec![Bytes::from("b")]);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_watchers_are_touched_by_notify() {
        let mut db = db();
        db.watch(Bytes::from("k"), 7);
        db.watch(Bytes::from("other"), 8);
        assert!(!db.is_touched(7));

        db.notify(&Bytes::from("k"));
        assert!(db.is_touched(7));
        assert!(!db.is_touched(8));

        db.forget_session(7);
        assert!(!db.is_touched(7));
        db.notify(&Bytes::from("k"));
        assert!(!db.is_touched(7));
    }

    #[test]
    fn test_change_listeners() {
        let mut db = db();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let id = db.add_listener(Box::new(move |_key| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        db.notify(&Bytes::from("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(db.remove_listener(id));
        db.notify(&Bytes::from("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_swap_touches_both_sides() {
        let mut a = db();
        let mut b = Database::new(1, Arc::new(Condvar::new()));
        a.insert(Bytes::from("x"), Item::new(Value::string("1")));
        b.watch(Bytes::from("y"), 3);

        a.swap_contents(&mut b);
        assert!(!a.contains(b"x"));
        assert!(b.contains(b"x"));
        assert!(b.is_touched(3));
    }

    #[test]
    fn test_clear_touches_watchers() {
        let mut db = db();
        db.insert(Bytes::from("k"), Item::new(Value::string("v")));
        db.watch(Bytes::from("k"), 1);
        db.clear();
        assert!(db.is_touched(1));
        assert_eq!(db.len(), 0);
    }
}
