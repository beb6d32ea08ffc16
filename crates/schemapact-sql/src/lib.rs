//! SQL column extraction
//!
//! This crate handles:
//! - Stripping templates and comments from model SQL
//! - Locating the final (non-CTE) projection
//! - Inferring column names and coarse types from projected expressions
//! - Discovering model files and building SQL-inferred schemas

pub mod inference;
pub mod discovery;

pub use inference::{ColumnExtractor, HeuristicSqlExtractor, extract_columns, COMPUTED_COLUMN};
pub use discovery::{ModelFile, SqlSchemaExtractor, discover_models};
