//! SchemaPact Core
//!
//! Domain model shared by every crate in the workspace: normalized schemas,
//! contract issues, validation results and configuration.
//! Issue category strings are part of the public JSON output - never rename them.

pub mod schema;
pub mod issue;
pub mod report;
pub mod config;
pub mod document;

pub use schema::{Column, ColumnType, Schema, SchemaCollection, SchemaOrigin, normalize_name, UNKNOWN_MATERIALIZATION};
pub use issue::{Issue, IssueSeverity, category};
pub use report::{Report, ReportSummary, ReportVersion, ValidationResult};
pub use config::{Config, ConfigError, SourceConfig, TargetConfig, CacheConfig, ValidationConfig, FailOn};
pub use document::{SchemaDocument, DocumentRole, DocumentFormat, DocumentError};
