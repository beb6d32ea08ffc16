//! On-disk schema cache
//!
//! One JSON file per key under the cache directory:
//!
//! ```json
//! { "created_at": "2024-01-01T00:00:00Z", "schemas": { ... } }
//! ```

use crate::cache::SchemaCache;
use chrono::{DateTime, Utc};
use schemapact_core::SchemaCollection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialized cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    created_at: DateTime<Utc>,
    schemas: SchemaCollection,
}

/// Schema cache persisted as JSON files
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    /// Cache rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", sanitized))
    }

    fn read_entry(&self, path: &Path) -> Result<FileEntry, CacheError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CacheError::IoError(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&contents)
            .map_err(|e| CacheError::ParseError(path.display().to_string(), e.to_string()))
    }

    fn write_entry(&self, path: &Path, entry: &FileEntry) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CacheError::IoError(self.dir.display().to_string(), e.to_string()))?;
        let json = serde_json::to_string(entry)
            .map_err(|e| CacheError::SerializeError(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| CacheError::IoError(path.display().to_string(), e.to_string()))
    }

    fn is_fresh(&self, entry: &FileEntry) -> bool {
        let age = Utc::now().signed_duration_since(entry.created_at);
        // A timestamp from the future counts as fresh
        age.to_std().map(|age| age < self.ttl).unwrap_or(true)
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<(), CacheError> {
        if !self.dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&self.dir)
            .map_err(|e| CacheError::IoError(self.dir.display().to_string(), e.to_string()))
    }
}

impl SchemaCache for FileCache {
    fn get(&self, key: &str) -> Option<SchemaCollection> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        match self.read_entry(&path) {
            Ok(entry) if self.is_fresh(&entry) => {
                tracing::debug!(key, "cache hit");
                Some(entry.schemas)
            }
            Ok(_) => {
                tracing::debug!(key, "cache entry expired");
                self.invalidate(key);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable cache entry");
                self.invalidate(key);
                None
            }
        }
    }

    fn put(&self, key: &str, schemas: &SchemaCollection) {
        let entry = FileEntry {
            created_at: Utc::now(),
            schemas: schemas.clone(),
        };

        if let Err(e) = self.write_entry(&self.entry_path(key), &entry) {
            tracing::warn!(error = %e, "failed to write cache entry");
        }
    }

    fn invalidate(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache entry");
            }
        }
    }
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache IO error at {0}: {1}")]
    IoError(String, String),

    #[error("Corrupt cache entry {0}: {1}")]
    ParseError(String, String),

    #[error("Failed to serialize cache entry: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemapact_core::{Column, ColumnType, Schema, SchemaOrigin};

    fn collection() -> SchemaCollection {
        vec![Schema::new("orders", SchemaOrigin::SqlInference)
            .with_columns(vec![Column::new("order_id", ColumnType::Varchar)])]
        .into_iter()
        .collect()
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache"), Duration::from_secs(60));

        assert!(cache.get("abc").is_none());
        cache.put("abc", &collection());

        let cached = cache.get("abc").unwrap();
        assert_eq!(cached, collection());
    }

    #[test]
    fn expired_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Duration::from_secs(60));

        let stale = FileEntry {
            created_at: Utc::now() - chrono::Duration::hours(2),
            schemas: collection(),
        };
        let path = cache.entry_path("old");
        cache.write_entry(&path, &stale).unwrap();

        assert!(cache.get("old").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Duration::from_secs(60));
        let path = cache.entry_path("bad");
        std::fs::write(&path, "{not json").unwrap();

        assert!(cache.get("bad").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_directory_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let cache = FileCache::new(&blocker, Duration::from_secs(60));
        cache.put("k", &collection());
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn keys_are_sanitized() {
        let cache = FileCache::new("/tmp/c", Duration::from_secs(1));
        assert_eq!(cache.entry_path("../x"), PathBuf::from("/tmp/c/___x.json"));
    }

    #[test]
    fn clear_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache"), Duration::from_secs(60));
        cache.put("k", &collection());
        cache.clear().unwrap();
        assert!(!cache.dir().exists());
        cache.clear().unwrap();
    }
}
