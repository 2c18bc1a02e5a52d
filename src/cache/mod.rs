//! Bounded in-memory read cache.
//!
//! Maps a key hash to the serialized record frame most recently seen for
//! it, evicting least-recently-used entries once the configured byte
//! budget is exceeded. The cache is authoritative for nothing: a miss
//! means "consult disk", a hit means "use these bytes".
//!
//! `put` and `get` are safe from any thread; the interior state sits
//! behind a single `Mutex` and each operation holds it only briefly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

struct Slot {
    frame: Vec<u8>,
    tick: u64,
}

struct CacheInner {
    map: HashMap<u32, Slot>,
    /// Recency index: tick → key hash. Smallest tick is the LRU entry.
    recency: BTreeMap<u64, u32>,
    tick: u64,
    used: u64,
}

/// Byte-bounded LRU cache keyed by key hash.
pub struct Cache {
    inner: Mutex<CacheInner>,
    capacity: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Cache {
    /// Creates a cache bounded to `capacity` bytes of frame data.
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
                used: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces the frame for `key_hash`, then evicts LRU
    /// entries until the byte budget is honoured. A frame larger than
    /// the whole budget is not cached.
    pub fn put(&self, key_hash: u32, frame: Vec<u8>) {
        if frame.len() as u64 > self.capacity {
            return;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };

        if let Some(old) = inner.map.remove(&key_hash) {
            inner.recency.remove(&old.tick);
            inner.used -= old.frame.len() as u64;
        }

        inner.tick += 1;
        let tick = inner.tick;
        inner.used += frame.len() as u64;
        inner.recency.insert(tick, key_hash);
        inner.map.insert(key_hash, Slot { frame, tick });

        while inner.used > self.capacity {
            let Some((&oldest_tick, &victim)) = inner.recency.iter().next() else {
                break;
            };
            inner.recency.remove(&oldest_tick);
            if let Some(slot) = inner.map.remove(&victim) {
                inner.used -= slot.frame.len() as u64;
            }
        }
    }

    /// Returns a copy of the cached frame, refreshing its recency.
    pub fn get(&self, key_hash: u32) -> Option<Vec<u8>> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        inner.tick += 1;
        let tick = inner.tick;
        match inner.map.get_mut(&key_hash) {
            Some(slot) => {
                let old_tick = slot.tick;
                slot.tick = tick;
                let frame = slot.frame.clone();
                inner.recency.remove(&old_tick);
                inner.recency.insert(tick, key_hash);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(frame)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().map(|i| i.used).unwrap_or(0)
    }

    /// (hits, misses) counters.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
