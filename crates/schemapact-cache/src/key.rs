//! Content-hash cache keys

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Incrementally hashed cache key
///
/// Every part is length-prefixed so adjacent parts cannot run together.
pub struct CacheKeyBuilder {
    hasher: Sha256,
}

impl CacheKeyBuilder {
    /// Start a key in the given namespace (for example the extraction mode)
    pub fn new(namespace: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.add_str(namespace);
        builder
    }

    /// Mix in a string
    pub fn add_str(&mut self, value: &str) -> &mut Self {
        self.add_bytes(value.as_bytes())
    }

    /// Mix in raw bytes
    pub fn add_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self
    }

    /// Mix in a file's path and contents
    ///
    /// An unreadable file contributes its path and a marker, so it still
    /// changes the key when it later becomes readable.
    pub fn add_file(&mut self, path: &Path) -> &mut Self {
        self.add_str(&path.display().to_string());
        match std::fs::read(path) {
            Ok(contents) => self.add_bytes(&contents),
            Err(_) => self.add_str("<unreadable>"),
        }
    }

    /// Hex-encoded SHA-256 digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Key for one project extraction
///
/// Covers the project path, every model SQL file (sorted by path, with
/// contents) and the manifest contents when present.
pub fn project_cache_key(
    namespace: &str,
    project_root: &Path,
    sql_files: &[PathBuf],
    manifest: Option<&Path>,
) -> String {
    let mut builder = CacheKeyBuilder::new(namespace);
    builder.add_str(&project_root.display().to_string());

    let mut files: Vec<&PathBuf> = sql_files.iter().collect();
    files.sort();
    for file in files {
        builder.add_file(file);
    }

    match manifest {
        Some(path) if path.exists() => {
            builder.add_str("manifest");
            builder.add_file(path);
        }
        _ => {
            builder.add_str("no-manifest");
        }
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_hex_sha256() {
        let key = CacheKeyBuilder::new("fast").finish();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parts_do_not_run_together() {
        let mut a = CacheKeyBuilder::new("ns");
        a.add_str("ab").add_str("c");
        let mut b = CacheKeyBuilder::new("ns");
        b.add_str("a").add_str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn key_tracks_file_contents_not_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.sql");
        let second = dir.path().join("b.sql");
        std::fs::write(&first, "select 1 as one").unwrap();
        std::fs::write(&second, "select 2 as two").unwrap();

        let key1 = project_cache_key("sql", dir.path(), &[first.clone(), second.clone()], None);
        let key2 = project_cache_key("sql", dir.path(), &[second.clone(), first.clone()], None);
        assert_eq!(key1, key2);

        std::fs::write(&second, "select 3 as three").unwrap();
        let key3 = project_cache_key("sql", dir.path(), &[first, second], None);
        assert_ne!(key1, key3);
    }

    #[test]
    fn namespace_and_manifest_change_key() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("manifest.json");

        let fast = project_cache_key("fast", dir.path(), &[], None);
        let full = project_cache_key("full", dir.path(), &[], None);
        assert_ne!(fast, full);

        let missing = project_cache_key("full", dir.path(), &[], Some(&manifest));
        assert_eq!(missing, full);

        std::fs::write(&manifest, "{}").unwrap();
        let present = project_cache_key("full", dir.path(), &[], Some(&manifest));
        assert_ne!(present, full);
    }
}
