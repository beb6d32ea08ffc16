//! Structured schema document
//!
//! The interchange format written by `schemapact extract` and accepted by
//! `schemapact validate --source-doc/--target-doc`:
//!
//! ```yaml
//! tables:
//!   users:
//!     columns:
//!       - { name: user_id, type: varchar, required: true, description: "" }
//!     source_model: users
//!     materialization: table
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use crate::schema::{Column, ColumnType, Schema, SchemaCollection, SchemaOrigin, UNKNOWN_MATERIALIZATION};

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1.0";

/// Which side of the contract a document describes
///
/// Defaults for missing fields differ per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRole {
    /// Transformation project output: columns default to required, type unknown
    Source,

    /// API model requirements: columns default to optional, type varchar
    Target,
}

/// One column entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// One table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,

    #[serde(default = "default_source_model")]
    pub source_model: String,

    #[serde(default = "default_materialization")]
    pub materialization: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SchemaOrigin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_source_model() -> String {
    "Unknown".to_string()
}

fn default_materialization() -> String {
    UNKNOWN_MATERIALIZATION.to_string()
}

/// `{tables: {<name>: {...}}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,
}

impl SchemaDocument {
    /// Build a document from a collection
    pub fn from_collection(collection: &SchemaCollection) -> Self {
        let tables = collection
            .schemas()
            .map(|schema| {
                let columns = schema
                    .columns
                    .iter()
                    .map(|c| ColumnEntry {
                        name: c.name.clone(),
                        column_type: Some(c.declared_type.as_str().to_string()),
                        required: Some(c.required),
                        description: c.description.clone(),
                        max_length: c.max_length,
                    })
                    .collect();

                let entry = TableEntry {
                    columns,
                    source_model: schema.declaring_model.clone(),
                    materialization: schema.materialization.clone(),
                    source: Some(schema.origin),
                    file: schema.source_file.clone(),
                };

                (schema.table_name.clone(), entry)
            })
            .collect();

        Self {
            version: Some(DOCUMENT_VERSION.to_string()),
            tables,
        }
    }

    /// Convert into a collection, applying the side's defaults
    ///
    /// Columns with empty names and duplicate columns are skipped.
    pub fn into_collection(self, role: DocumentRole) -> SchemaCollection {
        let mut collection = SchemaCollection::new();

        for (table_name, entry) in self.tables {
            let columns = entry
                .columns
                .into_iter()
                .map(|c| {
                    let declared_type = match (&c.column_type, role) {
                        (Some(t), _) => ColumnType::from_declared(t),
                        (None, DocumentRole::Source) => ColumnType::Unknown,
                        (None, DocumentRole::Target) => ColumnType::Varchar,
                    };
                    let required = c.required.unwrap_or(role == DocumentRole::Source);

                    let mut column = Column::new(&c.name, declared_type)
                        .with_required(required)
                        .with_description(c.description)
                        .with_max_length(c.max_length);
                    if let Some(raw) = c.column_type {
                        column = column.with_raw_type(raw);
                    }
                    column
                })
                .collect();

            let mut schema = Schema::new(table_name, entry.source.unwrap_or(SchemaOrigin::Document))
                .with_columns(columns)
                .with_materialization(entry.materialization)
                .with_declaring_model(entry.source_model);
            if let Some(file) = entry.file {
                schema = schema.with_source_file(file);
            }

            collection.insert(schema);
        }

        collection
    }

    /// Parse from a string in the given format
    pub fn parse(contents: &str, format: DocumentFormat) -> Result<Self, DocumentError> {
        match format {
            DocumentFormat::Json => serde_json::from_str(contents)
                .map_err(|e| DocumentError::ParseError(e.to_string())),
            DocumentFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| DocumentError::ParseError(e.to_string())),
        }
    }

    /// Render in the given format
    pub fn render(&self, format: DocumentFormat) -> Result<String, DocumentError> {
        match format {
            DocumentFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| DocumentError::SerializeError(e.to_string())),
            DocumentFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| DocumentError::SerializeError(e.to_string())),
        }
    }

    /// Load from a `.json`, `.yml` or `.yaml` file
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let format = DocumentFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DocumentError::IoError(path.display().to_string(), e.to_string()))?;
        Self::parse(&contents, format)
    }

    /// Save to a `.json`, `.yml` or `.yaml` file
    pub fn save_to_file(&self, path: &Path) -> Result<(), DocumentError> {
        let format = DocumentFormat::from_path(path)?;
        let rendered = self.render(format)?;
        std::fs::write(path, rendered)
            .map_err(|e| DocumentError::IoError(path.display().to_string(), e.to_string()))
    }
}

/// Serialization format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yml") | Some("yaml") => Ok(Self::Yaml),
            _ => Err(DocumentError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read or write schema document {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse schema document: {0}")]
    ParseError(String),

    #[error("Failed to serialize schema document: {0}")]
    SerializeError(String),

    #[error("Unsupported schema document format (expected .json, .yml or .yaml): {0}")]
    UnsupportedFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET_YAML: &str = r#"
tables:
  users:
    columns:
      - name: user_id
        type: varchar
        required: true
      - name: bio
    source_model: User
"#;

    #[test]
    fn target_defaults() {
        let doc = SchemaDocument::parse(TARGET_YAML, DocumentFormat::Yaml).unwrap();
        let collection = doc.into_collection(DocumentRole::Target);

        let users = collection.get("users").unwrap();
        assert_eq!(users.declaring_model, "User");
        assert_eq!(users.materialization, "unknown");
        assert_eq!(users.origin, SchemaOrigin::Document);

        let bio = users.find_column("bio").unwrap();
        assert!(!bio.required);
        assert_eq!(bio.declared_type, ColumnType::Varchar);
        assert!(users.find_column("user_id").unwrap().required);
    }

    #[test]
    fn source_defaults() {
        let doc = SchemaDocument::parse(
            r#"{"tables": {"users": {"columns": [{"name": "email"}]}}}"#,
            DocumentFormat::Json,
        )
        .unwrap();
        let collection = doc.into_collection(DocumentRole::Source);

        let email = collection.get("users").unwrap().find_column("email").unwrap();
        assert!(email.required);
        assert_eq!(email.declared_type, ColumnType::Unknown);
        assert_eq!(collection.get("users").unwrap().declaring_model, "Unknown");
    }

    #[test]
    fn collection_survives_document_roundtrip() {
        let original: SchemaCollection = vec![Schema::new("orders", SchemaOrigin::CompiledMetadata)
            .with_columns(vec![
                Column::new("order_id", ColumnType::Varchar),
                Column::new("note", ColumnType::Varchar).with_required(false),
            ])
            .with_materialization("table")
            .with_declaring_model("fct_orders")]
        .into_iter()
        .collect();

        let yaml = SchemaDocument::from_collection(&original)
            .render(DocumentFormat::Yaml)
            .unwrap();
        let parsed = SchemaDocument::parse(&yaml, DocumentFormat::Yaml)
            .unwrap()
            .into_collection(DocumentRole::Target);

        let orders = parsed.get("orders").unwrap();
        assert_eq!(orders.origin, SchemaOrigin::CompiledMetadata);
        assert_eq!(orders.materialization, "table");
        assert_eq!(orders.column_names(), vec!["order_id", "note"]);
        assert!(!orders.find_column("note").unwrap().required);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")).unwrap(), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")).unwrap(), DocumentFormat::Yaml);
        assert!(matches!(
            DocumentFormat::from_path(Path::new("a.txt")),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }
}
