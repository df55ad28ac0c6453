//! In-memory response caching for GET requests.
//!
//! Insight schema and object-type lookups are requested repeatedly while a
//! query is being processed, so GET responses are kept for a short TTL.
//! Features include:
//! - Configurable TTL (a zero TTL disables caching)
//! - Keys built from the request path and its sorted query parameters
//! - Expired entries are evicted on lookup and pruned on insert
//! - A fill that overlaps an invalidation is dropped

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// A cache entry with metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached data.
    pub data: T,
    /// When the entry was cached.
    pub cached_at: Instant,
    /// When the entry expires.
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry with the given TTL.
    pub fn new(data: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            cached_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check if the cache entry has expired.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Get the age of the cache entry.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.cached_at)
    }
}

/// Build the cache key for a request.
///
/// Parameters are sorted so that the same query in a different order hits
/// the same entry.
pub fn cache_key(path: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

/// Thread-safe TTL cache of decoded JSON responses.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry<Value>>,
    /// Bumped by every invalidation.
    generation: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of stored entries.
    pub entries: usize,
    /// Number of stored entries that have expired but not yet been evicted.
    pub expired: usize,
}

impl ResponseCache {
    /// Create a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
        }
    }

    /// Whether the cache stores anything at all.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Get a cached response.
    ///
    /// Returns `None` if the key is not cached or has expired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }

        let mut state = self.state.lock().await;
        match state.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                trace!(key = %key, "Cache entry expired");
                state.entries.remove(key);
                None
            }
            Some(entry) => {
                debug!(key = %key, age_ms = entry.age().as_millis() as u64, "Cache hit");
                Some(entry.data.clone())
            }
            None => None,
        }
    }

    /// Store a response.
    pub async fn insert(&self, key: String, value: Value) {
        let mut state = self.state.lock().await;
        self.store(&mut state, key, value);
    }

    /// The current invalidation generation.
    ///
    /// Read it before fetching a response and pass it to
    /// [`ResponseCache::insert_if_current`].
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Store a response unless the cache was invalidated since `generation`.
    ///
    /// Returns whether the response was stored.
    pub async fn insert_if_current(&self, key: String, value: Value, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(key = %key, "Response overlapped an invalidation, not caching");
            return false;
        }
        self.store(&mut state, key, value)
    }

    fn store(&self, state: &mut CacheState, key: String, value: Value) -> bool {
        if !self.is_enabled() {
            return false;
        }
        state.entries.retain(|_, entry| !entry.is_expired());
        trace!(key = %key, "Caching response");
        state.entries.insert(key, CacheEntry::new(value, self.ttl));
        true
    }

    /// Remove the entry for `path` and every entry for a sub-resource of it.
    pub async fn invalidate(&self, path: &str) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.entries.retain(|key, _| {
            let rest = match key.strip_prefix(path) {
                Some(rest) => rest,
                None => return true,
            };
            !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
        });
    }

    /// Remove all entries.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        debug!(entries = state.entries.len(), "Clearing response cache");
        state.generation += 1;
        state.entries.clear();
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            expired: state.entries.values().filter(|e| e.is_expired()).count(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}
