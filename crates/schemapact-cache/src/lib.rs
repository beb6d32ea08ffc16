//! Schema extraction cache
//!
//! Extracting the source side can mean compiling the transformation project,
//! which is slow. This crate provides an injectable TTL cache for extracted
//! `SchemaCollection`s:
//!
//! - **`SchemaCache`**: get / put / invalidate capability
//! - **`MemoryCache`**: in-process, for tests and long-lived callers
//! - **`FileCache`**: JSON entries under a cache directory
//! - **Keys**: SHA-256 over the project path, model SQL and manifest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schemapact_cache::{FileCache, SchemaCache, project_cache_key};
//!
//! let cache = FileCache::new(".schemapact-cache", Duration::from_secs(3600));
//! let key = project_cache_key("full", &project, &sql_files, Some(&manifest));
//! if let Some(schemas) = cache.get(&key) {
//!     // skip extraction
//! }
//! ```

pub mod cache;
pub mod file;
pub mod key;

pub use cache::{MemoryCache, SchemaCache};
pub use file::{CacheError, FileCache};
pub use key::{CacheKeyBuilder, project_cache_key};
