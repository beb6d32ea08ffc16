//! dbt manifest.json parsing
//!
//! Only the fields needed to recover model output columns are modelled, and
//! every one of them is optional so manifests from any dbt version parse.

use schemapact_core::{Column, ColumnType, Schema, SchemaCollection, SchemaOrigin};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: ManifestMetadata,

    /// Model, test, seed and snapshot nodes
    #[serde(default)]
    pub nodes: HashMap<String, ManifestNode>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Model nodes sorted by unique_id (tests, seeds, etc. filtered out)
    pub fn models(&self) -> Vec<(&str, &ManifestNode)> {
        let mut models: Vec<(&str, &ManifestNode)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.resource_type == "model")
            .map(|(id, node)| (id.as_str(), node))
            .collect();
        models.sort_by(|a, b| a.0.cmp(b.0));
        models
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Convert every model node into a schema
    ///
    /// Tables are keyed by alias, falling back to name. When two models
    /// share a table name the later unique_id wins.
    pub fn to_schemas(&self) -> SchemaCollection {
        let mut collection = SchemaCollection::new();

        for (unique_id, node) in self.models() {
            let Some(schema) = node.to_schema() else {
                tracing::warn!(node = unique_id, "model node has no name, skipping");
                continue;
            };

            let table = schema.table_name.clone();
            if let Some(previous) = collection.insert(schema) {
                tracing::warn!(
                    table = %table,
                    previous = %previous.declaring_model,
                    current = %node.name,
                    "two models produce the same table, keeping the later one"
                );
            }
        }

        collection
    }
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Node name (e.g., "users")
    #[serde(default)]
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    #[serde(default)]
    pub resource_type: String,

    /// Original file path
    #[serde(default)]
    pub original_file_path: Option<String>,

    /// Alias (output table name)
    #[serde(default)]
    pub alias: Option<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Column definitions keyed by column name
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnDefinition>,
}

impl ManifestNode {
    /// Output table name: alias, falling back to name
    pub fn table_name(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .or(Some(self.name.as_str()).filter(|name| !name.is_empty()))
    }

    /// Schema for this node's declared columns
    ///
    /// Declared columns are always required; the manifest carries no
    /// nullability. Types come from the declared `data_type` only.
    pub fn to_schema(&self) -> Option<Schema> {
        let table = self.table_name()?;

        let columns = self
            .columns
            .iter()
            .filter_map(|(key, definition)| {
                let name = definition.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(key);
                if name.trim().is_empty() {
                    tracing::warn!(model = %self.name, "column without a name, skipping");
                    return None;
                }

                let mut column = match definition.data_type.as_deref() {
                    Some(data_type) => Column::new(name, ColumnType::from_declared(data_type))
                        .with_raw_type(data_type),
                    None => Column::new(name, ColumnType::Unknown),
                };
                column = column
                    .with_required(true)
                    .with_description(definition.description.clone().unwrap_or_default());
                Some(column)
            })
            .collect();

        let mut schema = Schema::new(table, SchemaOrigin::CompiledMetadata)
            .with_columns(columns)
            .with_materialization(self.config.materialized.as_deref().unwrap_or("view"))
            .with_declaring_model(&self.name);
        if let Some(path) = self.original_file_path.as_deref().filter(|p| !p.is_empty()) {
            schema = schema.with_source_file(path);
        }

        Some(schema)
    }
}

/// Node configuration (from dbt_project.yml or model config)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,
}

/// Column definition from manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name (the map key is used when absent)
    #[serde(default)]
    pub name: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Declared data type
    #[serde(default)]
    pub data_type: Option<String>,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
