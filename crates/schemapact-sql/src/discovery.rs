//! Model file discovery and SQL-only schema extraction

use crate::inference::{ColumnExtractor, HeuristicSqlExtractor};
use schemapact_core::{Schema, SchemaCollection, SchemaOrigin};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A model SQL file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    /// Model name (file stem)
    pub name: String,

    /// Full path
    pub path: PathBuf,

    /// Path relative to the project root, for display
    pub relative_path: String,
}

/// Whether any directory between `models_dir` and the file is a skipped one
pub fn should_skip(relative: &Path, skip_dirs: &[String]) -> bool {
    relative
        .parent()
        .map(|parent| {
            parent.components().any(|component| {
                component
                    .as_os_str()
                    .to_str()
                    .map(|name| skip_dirs.iter().any(|skip| skip == name))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

/// Discover model SQL files under `project_root/models_dir`, sorted by path
///
/// Files under analysis/tests/macros/snapshots style directories are not
/// models and are left out. A missing models directory yields nothing.
pub fn discover_models(project_root: &Path, models_dir: &Path, skip_dirs: &[String]) -> Vec<ModelFile> {
    let root = project_root.join(models_dir);
    if !root.exists() {
        tracing::warn!(path = %root.display(), "models directory not found");
        return Vec::new();
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }

        let relative_to_models = path.strip_prefix(&root).unwrap_or(path);
        if should_skip(relative_to_models, skip_dirs) {
            tracing::debug!(path = %path.display(), "skipping non-model SQL");
            continue;
        }

        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let relative_path = path
            .strip_prefix(project_root)
            .unwrap_or(path)
            .display()
            .to_string();

        files.push(ModelFile {
            name: name.to_string(),
            path: path.to_path_buf(),
            relative_path,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Build a schema collection by inferring columns from every model file
pub struct SqlSchemaExtractor<E = HeuristicSqlExtractor> {
    extractor: E,
}

impl SqlSchemaExtractor<HeuristicSqlExtractor> {
    /// Extractor backed by the heuristic column inference
    pub fn new() -> Self {
        Self {
            extractor: HeuristicSqlExtractor,
        }
    }
}

impl Default for SqlSchemaExtractor<HeuristicSqlExtractor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ColumnExtractor> SqlSchemaExtractor<E> {
    /// Use a different column extractor
    pub fn with_extractor(extractor: E) -> Self {
        Self { extractor }
    }

    /// Schema for one model's SQL text, or None if no projection was found
    pub fn extract_model(&self, name: &str, sql: &str) -> Option<Schema> {
        let columns = self.extractor.extract_columns(sql);
        if columns.is_empty() {
            return None;
        }

        Some(
            Schema::new(name, SchemaOrigin::SqlInference)
                .with_columns(columns)
                .with_declaring_model(name),
        )
    }

    /// Extract every discovered model; unreadable files are skipped
    pub fn extract_files(&self, files: &[ModelFile]) -> SchemaCollection {
        let mut collection = SchemaCollection::new();

        for file in files {
            let sql = match std::fs::read_to_string(&file.path) {
                Ok(sql) => sql,
                Err(e) => {
                    tracing::warn!(model = %file.name, error = %e, "failed to read model SQL, skipping");
                    continue;
                }
            };

            match self.extract_model(&file.name, &sql) {
                Some(schema) => {
                    tracing::debug!(model = %file.name, columns = schema.columns.len(), "inferred columns");
                    let schema = schema.with_source_file(file.relative_path.clone());
                    if collection.insert(schema).is_some() {
                        tracing::warn!(model = %file.name, "duplicate model name, keeping {}", file.relative_path);
                    }
                }
                None => {
                    tracing::warn!(model = %file.name, "no select projection found, skipping");
                }
            }
        }

        collection
    }

    /// Discover and extract every model under the project
    pub fn extract_project(&self, project_root: &Path, models_dir: &Path, skip_dirs: &[String]) -> SchemaCollection {
        let files = discover_models(project_root, models_dir, skip_dirs);
        tracing::info!(files = files.len(), "inferring schemas from model SQL");
        self.extract_files(&files)
    }
}
