//! The store: chained hash table + LRU index + byte accounting + TTL
//! fields, all guarded by one mutex.
//!
//! Every public operation takes the lock for its whole duration and
//! performs no I/O while holding it. The store is shared between the
//! connection tasks and the TTL reaper; wrap it in an `Arc`.
//!
//! ## Memory budget
//!
//! `current_bytes` charges `len(key) + len(value)` per live entry,
//! nothing else. When a `set` pushes the total past `max_bytes`
//! (default 1 GiB), entries are evicted from the least-recently-used
//! end until the store is back under budget or empty. Eviction is
//! triggered only by `set`; reads never evict for space.
//!
//! ## Expiry
//!
//! An entry with a TTL is expired once `now - last_accessed` exceeds
//! it. `get` checks expiry against the old timestamp *before*
//! refreshing it, so an expired entry is never resurrected by the read
//! that discovers it. Reads of a live entry refresh `last_accessed`,
//! which slides its expiry window forward. The background reaper
//! sweeps entries that are never read again.

use crate::storage::lru::LruIndex;
use crate::storage::table::ChainTable;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default byte budget: 1 GiB.
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024 * 1024;

/// A stored value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The value payload, binary-safe.
    pub value: Bytes,
    /// Time-to-live measured from `last_accessed`. `None` never expires.
    pub ttl: Option<Duration>,
    /// Refreshed on every write and successful read.
    pub last_accessed: Instant,
}

impl Entry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            ttl,
            last_accessed: Instant::now(),
        }
    }

    /// Whether the entry has outlived its TTL as of `now`.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.last_accessed) > ttl,
            None => false,
        }
    }
}

struct StoreInner {
    table: ChainTable<Bytes, Entry>,
    lru: LruIndex,
    current_bytes: usize,
    max_bytes: usize,
}

/// Counter snapshot returned by [`Store::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: usize,
    pub bytes_used: usize,
    pub bytes_limit: usize,
    pub set_ops: u64,
    pub get_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
    pub evicted: u64,
}

/// The in-memory keyspace.
///
/// # Example
///
/// ```
/// use blinkdb::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
/// store.set(Bytes::from("name"), Bytes::from("blink"), None);
/// assert_eq!(store.get(&Bytes::from("name")), Some(Bytes::from("blink")));
/// assert!(store.del(&Bytes::from("name")));
/// ```
pub struct Store {
    inner: Mutex<StoreInner>,
    set_count: AtomicU64,
    get_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
    evicted_count: AtomicU64,
}

impl Store {
    /// Creates a store with the default 1 GiB byte budget.
    pub fn new() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_BYTES)
    }

    /// Creates a store with an explicit byte budget.
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                table: ChainTable::new(),
                lru: LruIndex::new(),
                current_bytes: 0,
                max_bytes,
            }),
            set_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            evicted_count: AtomicU64::new(0),
        }
    }

    /// Stores or overwrites `key`, then evicts from the LRU end while
    /// the byte budget is exceeded.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if let Some(old) = inner.table.get(&key) {
            inner.current_bytes -= key.len() + old.value.len();
        }

        inner.current_bytes += key.len() + value.len();
        inner.table.insert(key.clone(), Entry::new(value, ttl));
        inner.lru.touch(&key);

        let mut evicted = 0u64;
        while inner.current_bytes > inner.max_bytes {
            let Some(victim) = inner.lru.pop_back() else {
                break;
            };
            if let Some(entry) = inner.table.remove(&victim) {
                inner.current_bytes -= victim.len() + entry.value.len();
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evicted_count.fetch_add(evicted, Ordering::Relaxed);
            debug!(
                evicted,
                bytes_used = inner.current_bytes,
                "evicted entries over byte budget"
            );
        }
    }

    /// Looks up `key`, treating an expired entry as absent (and
    /// removing it on the spot). A successful read refreshes the
    /// entry's recency and access timestamp.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let now = Instant::now();

        // Expiry is judged on the timestamp as it was before this read.
        let live_value = {
            let entry = inner.table.get_mut(key)?;
            if entry.is_expired(now) {
                None
            } else {
                entry.last_accessed = now;
                Some(entry.value.clone())
            }
        };

        match live_value {
            Some(value) => {
                inner.lru.touch(key);
                Some(value)
            }
            None => {
                if let Some(entry) = inner.table.remove(key) {
                    inner.current_bytes -= key.len() + entry.value.len();
                }
                inner.lru.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Deletes `key`. Returns whether it existed.
    pub fn del(&self, key: &Bytes) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        match inner.table.remove(key) {
            Some(entry) => {
                inner.current_bytes -= key.len() + entry.value.len();
                inner.lru.remove(key);
                true
            }
            None => false,
        }
    }

    /// Sweeps the whole table and removes every expired entry. Called
    /// by the background reaper; holds the lock for the full scan.
    ///
    /// Returns how many entries were removed.
    pub fn evict_expired(&self) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let now = Instant::now();

        let expired: Vec<Bytes> = inner
            .table
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = inner.table.remove(key) {
                inner.current_bytes -= key.len() + entry.value.len();
            }
            inner.lru.remove(key);
        }

        if !expired.is_empty() {
            self.expired_count
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
        }
        expired.len()
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget.
    pub fn current_bytes(&self) -> usize {
        self.inner.lock().unwrap().current_bytes
    }

    /// The configured byte budget.
    pub fn max_bytes(&self) -> usize {
        self.inner.lock().unwrap().max_bytes
    }

    /// Whether both the table and the LRU index track `key`.
    #[cfg(test)]
    fn tracked(&self, key: &Bytes) -> (bool, bool) {
        let inner = self.inner.lock().unwrap();
        (inner.table.contains(key), inner.lru.contains(key))
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock().unwrap();
        StoreStats {
            keys: inner.table.len(),
            bytes_used: inner.current_bytes,
            bytes_limit: inner.max_bytes,
            set_ops: self.set_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            evicted: self.evicted_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Store")
            .field("keys", &stats.keys)
            .field("bytes_used", &stats.bytes_used)
            .field("bytes_limit", &stats.bytes_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn set_get_del_round_trip() {
        let store = Store::new();
        store.set(b("k"), b("v"), None);
        assert_eq!(store.get(&b("k")), Some(b("v")));

        assert!(store.del(&b("k")));
        assert_eq!(store.get(&b("k")), None);
        assert!(!store.del(&b("k")));
    }

    #[test]
    fn set_overwrites_value_and_bytes() {
        let store = Store::new();
        store.set(b("k"), b("first"), None);
        store.set(b("k"), b("second"), None);

        assert_eq!(store.get(&b("k")), Some(b("second")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_bytes(), "k".len() + "second".len());
    }

    #[test]
    fn byte_accounting_tracks_live_entries() {
        let store = Store::new();
        store.set(b("alpha"), b("12345"), None);
        store.set(b("beta"), b("1234"), None);
        assert_eq!(store.current_bytes(), 10 + 8);

        store.del(&b("alpha"));
        assert_eq!(store.current_bytes(), 8);

        store.del(&b("beta"));
        assert_eq!(store.current_bytes(), 0);
    }

    #[test]
    fn lru_eviction_respects_recency() {
        // Budget of 5 with single-byte keys and values: three entries
        // (6 bytes) exceed it, and the one not touched is the victim.
        let store = Store::with_max_bytes(5);
        store.set(b("a"), b("1"), None);
        store.set(b("b"), b("2"), None);
        assert_eq!(store.get(&b("a")), Some(b("1")));
        store.set(b("c"), b("3"), None);

        assert_eq!(store.get(&b("b")), None, "LRU victim should be b");
        assert_eq!(store.get(&b("a")), Some(b("1")));
        assert_eq!(store.get(&b("c")), Some(b("3")));
        assert_eq!(store.current_bytes(), 4);
        assert_eq!(store.stats().evicted, 1);
    }

    #[test]
    fn set_never_leaves_store_over_budget() {
        let store = Store::with_max_bytes(64);
        for i in 0..100 {
            store.set(
                Bytes::from(format!("key{:03}", i)),
                Bytes::from(format!("value{:03}", i)),
                None,
            );
            assert!(store.current_bytes() <= 64);
        }
        assert!(store.len() < 100);
    }

    #[test]
    fn oversized_single_entry_empties_the_store() {
        let store = Store::with_max_bytes(4);
        store.set(b("bigkey"), b("bigvalue"), None);

        // Nothing can fit; the budget loop drains to empty.
        assert!(store.is_empty());
        assert_eq!(store.current_bytes(), 0);
    }

    #[test]
    fn expired_entry_is_invisible_and_removed_on_read() {
        let store = Store::new();
        store.set(b("k"), b("v"), Some(Duration::from_millis(20)));
        assert_eq!(store.get(&b("k")), Some(b("v")));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(store.get(&b("k")), None);

        // The read removed it from both indexes.
        assert_eq!(store.tracked(&b("k")), (false, false));
        assert_eq!(store.current_bytes(), 0);
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn read_slides_the_expiry_window() {
        let store = Store::new();
        store.set(b("k"), b("v"), Some(Duration::from_millis(60)));

        // Keep reading inside the window; the entry stays live past the
        // original deadline because each read refreshes last_accessed.
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(25));
            assert_eq!(store.get(&b("k")), Some(b("v")));
        }
    }

    #[test]
    fn no_ttl_means_no_expiry() {
        let store = Store::new();
        store.set(b("k"), b("v"), None);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.evict_expired(), 0);
        assert_eq!(store.get(&b("k")), Some(b("v")));
    }

    #[test]
    fn evict_expired_sweeps_only_stale_entries() {
        let store = Store::new();
        store.set(b("stale1"), b("v"), Some(Duration::from_millis(10)));
        store.set(b("stale2"), b("v"), Some(Duration::from_millis(10)));
        store.set(b("fresh"), b("v"), None);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(store.evict_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.tracked(&b("stale1")), (false, false));
        assert_eq!(store.tracked(&b("fresh")), (true, true));
        assert_eq!(store.current_bytes(), "fresh".len() + 1);
    }

    #[test]
    fn table_and_lru_agree_under_churn() {
        let store = Store::with_max_bytes(200);
        for i in 0..300 {
            let key = Bytes::from(format!("k{}", i % 40));
            match i % 3 {
                0 => store.set(key, b("value"), None),
                1 => {
                    store.get(&key);
                }
                _ => {
                    store.del(&key);
                }
            }
        }
        for i in 0..40 {
            let key = Bytes::from(format!("k{}", i));
            let (in_table, in_lru) = store.tracked(&key);
            assert_eq!(in_table, in_lru, "indexes disagree on {:?}", key);
        }
    }

    #[test]
    fn concurrent_access_is_serialized_by_the_mutex() {
        let store = std::sync::Arc::new(Store::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = std::sync::Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let key = Bytes::from(format!("k{}:{}", t, i));
                        store.set(key.clone(), b("v"), None);
                        assert_eq!(store.get(&key), Some(b("v")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 4000);
    }
}
