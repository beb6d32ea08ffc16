//! Schema caching with TTL
//!
//! Extraction results are cached under a content-hash key so repeated runs
//! against an unchanged project skip the compile and parse work. The cache
//! is injected into the extractor; nothing here assumes a global location.

use schemapact_core::SchemaCollection;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Key-value store for extracted schema collections
///
/// Implementations must treat an expired entry exactly like a missing one.
pub trait SchemaCache: Send + Sync {
    /// Fetch a fresh entry
    fn get(&self, key: &str) -> Option<SchemaCollection>;

    /// Store an entry, replacing any previous one
    fn put(&self, key: &str, schemas: &SchemaCollection);

    /// Drop an entry
    fn invalidate(&self, key: &str);
}

/// Cache entry held in memory
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached collection
    schemas: Arc<SchemaCollection>,

    /// When this entry was created
    created_at: Instant,

    /// Time-to-live for this entry
    ttl: Duration,
}

impl CacheEntry {
    /// Check if this cache entry is still valid
    fn is_valid(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

/// In-process schema cache with TTL support
///
/// Expired entries are evicted on access.
///
/// ## Usage
///
/// ```rust
/// use std::time::Duration;
/// use schemapact_cache::{MemoryCache, SchemaCache};
/// use schemapact_core::SchemaCollection;
///
/// let cache = MemoryCache::new(Duration::from_secs(300));
/// cache.put("project-key", &SchemaCollection::new());
/// assert!(cache.get("project-key").is_some());
/// ```
pub struct MemoryCache {
    /// Cache storage
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Default TTL for cache entries
    default_ttl: Duration,
}

impl MemoryCache {
    /// Create a new cache with the given default TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: ttl,
        }
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Number of entries in the cache (including expired)
    pub fn len(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all expired entries
    pub fn evict_expired(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, entry| entry.is_valid());
        }
    }

    /// Returns (total_entries, valid_entries, expired_entries)
    pub fn stats(&self) -> (usize, usize, usize) {
        if let Ok(cache) = self.cache.read() {
            let total = cache.len();
            let valid = cache.values().filter(|e| e.is_valid()).count();
            (total, valid, total - valid)
        } else {
            (0, 0, 0)
        }
    }
}

impl SchemaCache for MemoryCache {
    fn get(&self, key: &str) -> Option<SchemaCollection> {
        if let Ok(cache) = self.cache.read() {
            if let Some(entry) = cache.get(key) {
                if entry.is_valid() {
                    return Some(entry.schemas.as_ref().clone());
                }
            }
        }

        // Missing or expired
        self.invalidate(key);
        None
    }

    fn put(&self, key: &str, schemas: &SchemaCollection) {
        let entry = CacheEntry {
            schemas: Arc::new(schemas.clone()),
            created_at: Instant::now(),
            ttl: self.default_ttl,
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key.to_string(), entry);
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(key);
        }
    }
}

impl Default for MemoryCache {
    /// Cache with the default one hour TTL
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
