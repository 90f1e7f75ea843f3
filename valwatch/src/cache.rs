// File: valwatch/src/cache.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;

/// Lookup kinds served by the TTL caches. A tagged key prevents collisions
/// between caches that would otherwise share a string namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Per-chain detail payload from the directory service, by chain name
    ChainData(String),

    /// Active validator-set snapshot, by chain id
    ValidatorSet(String),
}

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// A small TTL key/value store. Expiry is checked lazily on read and
/// entries are never proactively swept; key cardinality equals the number
/// of distinct monitored chains, so the map stays tiny.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value if present and not expired. An expired
    /// entry is dropped on the way out.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a value, overwriting any previous entry unconditionally.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(0));
        let mut entries = self.entries.lock().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
