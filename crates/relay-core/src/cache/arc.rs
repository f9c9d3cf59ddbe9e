//! Adaptive replacement cache.
//!
//! Tracks recently used entries (`t1`) and frequently used entries (`t2`),
//! plus ghost lists of keys recently evicted from each (`b1`, `b2`). Hits in
//! a ghost list shift the adaptive target `p` toward the list that would have
//! kept the entry.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Fixed-capacity ARC cache. Not synchronized.
pub struct ArcCache<K: Hash + Eq, V> {
    size: usize,
    p: usize,
    t1: LruCache<K, V>,
    t2: LruCache<K, V>,
    b1: LruCache<K, ()>,
    b2: LruCache<K, ()>,
}

impl<K: Hash + Eq + Clone, V> ArcCache<K, V> {
    /// Create a cache holding at most `size` entries.
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            size: size.get(),
            p: 0,
            t1: LruCache::new(size),
            t2: LruCache::new(size),
            b1: LruCache::new(size),
            b2: LruCache::new(size),
        }
    }

    /// Look up `key`, promoting it to the frequent list on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if let Some(value) = self.t1.pop(key) {
            self.t2.put(key.clone(), value);
            return self.t2.get(key);
        }
        self.t2.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.t1.contains(key) || self.t2.contains(key)
    }

    /// Insert or replace `key`.
    pub fn put(&mut self, key: K, value: V) {
        if self.t1.contains(&key) {
            self.t1.pop(&key);
            self.t2.put(key, value);
            return;
        }
        if self.t2.contains(&key) {
            self.t2.put(key, value);
            return;
        }

        if self.b1.contains(&key) {
            let delta = if self.b2.len() > self.b1.len() {
                self.b2.len() / self.b1.len()
            } else {
                1
            };
            self.p = (self.p + delta).min(self.size);
            if self.len() >= self.size {
                self.replace(false);
            }
            self.b1.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.b2.contains(&key) {
            let delta = if self.b1.len() > self.b2.len() {
                self.b1.len() / self.b2.len()
            } else {
                1
            };
            self.p = self.p.saturating_sub(delta);
            if self.len() >= self.size {
                self.replace(true);
            }
            self.b2.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.len() >= self.size {
            self.replace(false);
        }
        if self.b1.len() > self.size - self.p {
            self.b1.pop_lru();
        }
        if self.b2.len() > self.p {
            self.b2.pop_lru();
        }
        self.t1.put(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.b1.pop(key);
        self.b2.pop(key);
        self.t1.pop(key).or_else(|| self.t2.pop(key))
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }

    /// Evict one resident entry into the matching ghost list.
    fn replace(&mut self, b2_contains_key: bool) {
        let t1_len = self.t1.len();
        if t1_len > 0 && (t1_len > self.p || (t1_len == self.p && b2_contains_key)) {
            if let Some((key, _)) = self.t1.pop_lru() {
                self.b1.put(key, ());
            }
        } else if let Some((key, _)) = self.t2.pop_lru() {
            self.b2.put(key, ());
        }
    }
}
