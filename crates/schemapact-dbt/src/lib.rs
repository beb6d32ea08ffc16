//! Compiled-metadata extraction for dbt projects
//!
//! This crate handles:
//! - Parsing manifest.json into source schemas
//! - Running `dbt compile` with a timeout when the manifest is missing
//! - Classifying compile failures (auth, connectivity, project)
//! - Falling back to SQL inference, with optional caching

pub mod manifest;
pub mod compile;
pub mod source;

pub use manifest::{Manifest, ManifestNode, ManifestMetadata, NodeConfig, ColumnDefinition, ManifestError};
pub use compile::{DbtCompiler, CompileError, CompileOutput, FailureCategory};
pub use source::{DbtSchemaSource, ExtractionStrategy, SourceExtraction};
