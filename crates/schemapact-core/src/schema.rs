//! Schema types shared by every extractor
//!
//! Both sides of a validation run converge on these types: the transformation
//! project (compiled metadata or SQL inference) and the API models
//! (model reflection).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse column type used on both sides of the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Varchar,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Json,
    Unknown,
}

impl ColumnType {
    /// Stable lowercase name, as written in schema documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Varchar => "varchar",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Json => "json",
            Self::Unknown => "unknown",
        }
    }

    /// Map a declared warehouse type string onto the coarse type system
    ///
    /// Only the spelling of the declared type is consulted; column names are
    /// never used here. Unrecognized spellings map to `Unknown`.
    pub fn from_declared(data_type: &str) -> Self {
        let lower = data_type.trim().to_lowercase();

        // Parameterized types: varchar(255), numeric(10, 2), array<string>
        let head = lower
            .split(|c: char| c == '(' || c == '<')
            .next()
            .unwrap_or("")
            .trim();

        match head {
            "varchar" | "string" | "text" | "char" | "character" | "character varying"
            | "nvarchar" | "uuid" => Self::Varchar,

            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "int2" | "int4" | "int8"
            | "int64" | "number" => Self::Integer,

            "float" | "float4" | "float8" | "float64" | "double" | "double precision" | "real"
            | "decimal" | "numeric" => Self::Float,

            "bool" | "boolean" => Self::Boolean,

            "timestamp" | "datetime" | "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz"
            | "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => {
                Self::Timestamp
            }

            "date" => Self::Date,

            "json" | "jsonb" | "variant" | "object" | "array" | "struct" | "record" => Self::Json,

            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_declared(s))
    }
}

/// Which extraction strategy produced a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaOrigin {
    /// Declared columns read from the compiled project manifest
    CompiledMetadata,

    /// Columns inferred from raw SQL text
    SqlInference,

    /// Fields reflected from API model declarations
    ModelReflection,

    /// Loaded from a structured schema document
    Document,
}

impl std::fmt::Display for SchemaOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompiledMetadata => write!(f, "compiled_metadata"),
            Self::SqlInference => write!(f, "sql_inference"),
            Self::ModelReflection => write!(f, "model_reflection"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Normalize a column or table name: trimmed and lowercased
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A column in a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name (normalized lowercase)
    pub name: String,

    /// Coarse type
    pub declared_type: ColumnType,

    /// Whether consumers cannot do without this column
    pub required: bool,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Maximum length constraint, when the declaration carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    /// Type string exactly as declared by the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_type: Option<String>,
}

impl Column {
    /// Create a required column with an empty description
    pub fn new(name: impl AsRef<str>, declared_type: ColumnType) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            declared_type,
            required: true,
            description: String::new(),
            max_length: None,
            raw_type: None,
        }
    }

    /// Set whether the column is required
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set max length
    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Keep the verbatim declared type
    pub fn with_raw_type(mut self, raw_type: impl Into<String>) -> Self {
        self.raw_type = Some(raw_type.into());
        self
    }
}

/// Materialization placeholder when the producer does not say
pub const UNKNOWN_MATERIALIZATION: &str = "unknown";

/// The output shape of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Table name, unique within a collection
    pub table_name: String,

    /// Ordered columns
    pub columns: Vec<Column>,

    /// Materialization kind (table, view, incremental, ...)
    pub materialization: String,

    /// Strategy that produced this schema
    pub origin: SchemaOrigin,

    /// Model or class that declared this table
    pub declaring_model: String,

    /// File the declaration came from, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl Schema {
    /// Create an empty schema
    pub fn new(table_name: impl Into<String>, origin: SchemaOrigin) -> Self {
        let table_name = table_name.into();
        Self {
            declaring_model: table_name.clone(),
            table_name,
            columns: Vec::new(),
            materialization: UNKNOWN_MATERIALIZATION.to_string(),
            origin,
            source_file: None,
        }
    }

    /// Set columns, dropping empty names and later duplicates
    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns.clear();
        for column in columns {
            self.push_column(column);
        }
        self
    }

    /// Set materialization kind
    pub fn with_materialization(mut self, materialization: impl Into<String>) -> Self {
        self.materialization = materialization.into();
        self
    }

    /// Set declaring model name
    pub fn with_declaring_model(mut self, model: impl Into<String>) -> Self {
        self.declaring_model = model.into();
        self
    }

    /// Set source file
    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    /// Append a column, keeping names non-empty and unique
    ///
    /// Returns false when the column was rejected.
    pub fn push_column(&mut self, column: Column) -> bool {
        if column.name.is_empty() || self.find_column(&column.name).is_some() {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns the consumer cannot do without
    pub fn required_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.required)
    }

    /// Columns the consumer tolerates being absent
    pub fn optional_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.required)
    }
}

/// Table name to schema, as produced by one extractor run
///
/// Backed by a `BTreeMap` so iteration is always in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCollection {
    tables: BTreeMap<String, Schema>,
}

impl SchemaCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a schema keyed by its table name
    ///
    /// Returns the schema previously stored under that name, if any.
    pub fn insert(&mut self, schema: Schema) -> Option<Schema> {
        self.tables.insert(schema.table_name.clone(), schema)
    }

    /// Look up a schema by exact table name
    pub fn get(&self, table_name: &str) -> Option<&Schema> {
        self.tables.get(table_name)
    }

    /// Check whether a table exists
    pub fn contains(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    /// Table names in sorted order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Schemas in table-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Schemas in table-name order
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.tables.values()
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the collection has no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables
    pub fn column_count(&self) -> usize {
        self.tables.values().map(|s| s.columns.len()).sum()
    }
}

impl FromIterator<Schema> for SchemaCollection {
    fn from_iter<I: IntoIterator<Item = Schema>>(iter: I) -> Self {
        let mut collection = Self::new();
        for schema in iter {
            collection.insert(schema);
        }
        collection
    }
}

impl IntoIterator for SchemaCollection {
    type Item = (String, Schema);
    type IntoIter = std::collections::btree_map::IntoIter<String, Schema>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_mapping() {
        assert_eq!(ColumnType::from_declared("BIGINT"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("varchar(255)"), ColumnType::Varchar);
        assert_eq!(ColumnType::from_declared("numeric(10, 2)"), ColumnType::Float);
        assert_eq!(ColumnType::from_declared("timestamp_ntz"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_declared("array<string>"), ColumnType::Json);
        assert_eq!(ColumnType::from_declared("geography"), ColumnType::Unknown);
        assert_eq!(ColumnType::from_declared(""), ColumnType::Unknown);
    }

    #[test]
    fn column_type_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnType::Timestamp).unwrap();
        assert_eq!(json, "\"timestamp\"");
        assert_eq!(ColumnType::Json.to_string(), "json");
    }

    #[test]
    fn column_names_are_normalized() {
        let col = Column::new("  User_ID ", ColumnType::Varchar);
        assert_eq!(col.name, "user_id");
        assert!(col.required);
    }

    #[test]
    fn schema_rejects_empty_and_duplicate_columns() {
        let schema = Schema::new("users", SchemaOrigin::SqlInference).with_columns(vec![
            Column::new("id", ColumnType::Varchar),
            Column::new("", ColumnType::Varchar),
            Column::new("ID", ColumnType::Integer),
            Column::new("email", ColumnType::Varchar).with_required(false),
        ]);

        assert_eq!(schema.column_names(), vec!["id", "email"]);
        assert_eq!(schema.find_column("id").unwrap().declared_type, ColumnType::Varchar);
        assert_eq!(schema.required_columns().count(), 1);
        assert_eq!(schema.optional_columns().count(), 1);
    }

    #[test]
    fn collection_iterates_in_name_order() {
        let collection: SchemaCollection = vec![
            Schema::new("users", SchemaOrigin::ModelReflection),
            Schema::new("orders", SchemaOrigin::ModelReflection),
            Schema::new("accounts", SchemaOrigin::ModelReflection),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = collection.table_names().collect();
        assert_eq!(names, vec!["accounts", "orders", "users"]);
        assert!(collection.contains("orders"));
        assert!(!collection.contains("Orders"));
    }

    #[test]
    fn insert_reports_overwrite() {
        let mut collection = SchemaCollection::new();
        assert!(collection.insert(Schema::new("users", SchemaOrigin::ModelReflection)).is_none());

        let replaced = collection.insert(
            Schema::new("users", SchemaOrigin::ModelReflection).with_declaring_model("Users"),
        );
        assert_eq!(replaced.unwrap().declaring_model, "users");
        assert_eq!(collection.len(), 1);
    }
}
