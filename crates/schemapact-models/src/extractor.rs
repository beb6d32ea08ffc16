//! Target-side extraction: model declarations to schemas

use crate::naming::infer_table_name;
use crate::provider::{DeclarationDocument, ModelDeclaration, SchemaProvider};
use crate::pydantic::PydanticScanner;
use schemapact_core::{Column, Schema, SchemaCollection, SchemaOrigin, UNKNOWN_MATERIALIZATION};
use std::path::Path;
use walkdir::WalkDir;

/// Builds the target schema collection from schema providers
pub struct ModelExtractor;

impl ModelExtractor {
    /// One schema per provider that maps to a table
    ///
    /// Base/Abstract classes without an explicit table name are skipped.
    /// When two providers map to the same table, the later one wins and the
    /// collision is logged.
    pub fn extract<'a, P, I>(providers: I) -> SchemaCollection
    where
        P: SchemaProvider + ?Sized + 'a,
        I: IntoIterator<Item = &'a P>,
    {
        let mut collection = SchemaCollection::new();

        for provider in providers {
            let Some(schema) = Self::extract_one(provider) else {
                tracing::debug!(model = provider.model_name(), "no table mapping, skipping");
                continue;
            };

            let table = schema.table_name.clone();
            tracing::info!(model = provider.model_name(), table = %table, "found API model");

            if let Some(previous) = collection.insert(schema) {
                tracing::warn!(
                    table = %table,
                    previous = %previous.declaring_model,
                    current = provider.model_name(),
                    "two models map to the same table, keeping the later one"
                );
            }
        }

        collection
    }

    /// Schema for a single provider, or None when it maps to no table
    pub fn extract_one<P: SchemaProvider + ?Sized>(provider: &P) -> Option<Schema> {
        let table = match provider.explicit_table_name() {
            Some(name) => name.to_string(),
            None => infer_table_name(provider.model_name())?,
        };

        let mut schema = Schema::new(table, SchemaOrigin::ModelReflection)
            .with_materialization(UNKNOWN_MATERIALIZATION)
            .with_declaring_model(provider.model_name());
        if let Some(file) = provider.source_file() {
            schema = schema.with_source_file(file);
        }

        for field in provider.provide_fields() {
            let column = Column::new(&field.name, field.type_tag)
                .with_required(field.required)
                .with_description(field.description)
                .with_max_length(field.max_length);

            if !schema.push_column(column) {
                tracing::warn!(model = provider.model_name(), field = %field.name, "skipping unusable or duplicate field");
            }
        }

        Some(schema)
    }

    /// Load declarations from a model source and extract them
    ///
    /// Failures are logged and yield an empty collection.
    pub fn extract_from_path(path: &Path) -> SchemaCollection {
        match load_declarations(path) {
            Ok(declarations) => Self::extract(&declarations),
            Err(e) => {
                tracing::warn!(error = %e, "could not load API models");
                SchemaCollection::new()
            }
        }
    }

    /// Load declarations from a model source and extract them, surfacing failures
    pub fn try_extract_from_path(path: &Path) -> Result<SchemaCollection, ModelSourceError> {
        let declarations = load_declarations(path)?;
        Ok(Self::extract(&declarations))
    }
}

/// Read model declarations from a file or directory
///
/// - `.py`: scanned for Pydantic-style models
/// - `.json` / `.yml` / `.yaml`: a declaration document
/// - a directory: every `.py` file beneath it, scanned together
pub fn load_declarations(path: &Path) -> Result<Vec<ModelDeclaration>, ModelSourceError> {
    if !path.exists() {
        return Err(ModelSourceError::NotFound(path.display().to_string()));
    }

    if path.is_dir() {
        return scan_directory(path);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ModelSourceError::IoError(path.display().to_string(), e.to_string()))?;
    let file = path.display().to_string();

    match extension.as_str() {
        "py" => {
            let mut scanner = PydanticScanner::new();
            scanner.add_source(&contents, Some(&file));
            Ok(scanner.declarations())
        }
        "json" => {
            let document: DeclarationDocument = serde_json::from_str(&contents)
                .map_err(|e| ModelSourceError::ParseError(file.clone(), e.to_string()))?;
            Ok(document.into_declarations(Some(&file)))
        }
        "yml" | "yaml" => {
            let document: DeclarationDocument = serde_yaml::from_str(&contents)
                .map_err(|e| ModelSourceError::ParseError(file.clone(), e.to_string()))?;
            Ok(document.into_declarations(Some(&file)))
        }
        _ => Err(ModelSourceError::UnsupportedFormat(file)),
    }
}

fn scan_directory(dir: &Path) -> Result<Vec<ModelDeclaration>, ModelSourceError> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("py"))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut scanner = PydanticScanner::new();
    for file in &files {
        match std::fs::read_to_string(file) {
            Ok(contents) => {
                scanner.add_source(&contents, Some(&file.display().to_string()));
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "failed to read model file, skipping");
            }
        }
    }

    tracing::info!(files = files.len(), path = %dir.display(), "scanned model directory");
    Ok(scanner.declarations())
}

/// Model source errors
#[derive(Debug, thiserror::Error)]
pub enum ModelSourceError {
    #[error("Model source not found: {0}")]
    NotFound(String),

    #[error("Failed to read model source {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse model declarations in {0}: {1}")]
    ParseError(String, String),

    #[error("Unsupported model source (expected .py, .json, .yml, .yaml or a directory): {0}")]
    UnsupportedFormat(String),
}
