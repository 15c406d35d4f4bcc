/// Process-wide expiring key-value cache
///
/// Entries carry their own deadline and are dropped lazily when a read finds
/// them expired, or in a sweep once the map grows large. All access goes
/// through one mutex.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// Expired entries are swept on insert once the map holds this many keys.
const SWEEP_THRESHOLD: usize = 1_000;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct ExpiringCache<K, V> {
    default_ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value for `key`, unless it has expired.
    ///
    /// A poisoned lock reads as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let now = Instant::now();
            if entries.len() >= SWEEP_THRESHOLD {
                let before = entries.len();
                entries.retain(|_, e| e.expires_at > now);
                tracing::debug!(evicted = before - entries.len(), "Swept expired cache entries");
            }
            entries.insert(
                key,
                Entry {
                    value,
                    expires_at: now + ttl,
                },
            );
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, e| e.expires_at > now);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }
}
