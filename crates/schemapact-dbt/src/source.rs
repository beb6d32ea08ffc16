//! Source-side extraction strategy
//!
//! Manifest first, compiling it when absent and allowed; SQL inference as
//! the fallback; an empty collection when everything fails. Results are
//! optionally cached under a content hash of the project.

use crate::compile::DbtCompiler;
use crate::manifest::Manifest;
use schemapact_cache::{project_cache_key, SchemaCache};
use schemapact_core::{SchemaCollection, SourceConfig};
use schemapact_sql::{discover_models, ModelFile, SqlSchemaExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a source collection was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Served from the cache
    Cache,

    /// Read from an existing manifest
    Manifest,

    /// Read from a manifest produced by compiling the project
    CompiledManifest,

    /// Inferred from model SQL
    SqlInference,

    /// Every strategy failed
    Unavailable,
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cache => "cache",
            Self::Manifest => "manifest",
            Self::CompiledManifest => "compiled manifest",
            Self::SqlInference => "sql inference",
            Self::Unavailable => "unavailable",
        };
        write!(f, "{}", name)
    }
}

/// Result of a source extraction
#[derive(Debug, Clone)]
pub struct SourceExtraction {
    pub schemas: SchemaCollection,
    pub strategy: ExtractionStrategy,
}

/// Extracts what the transformation project provides
pub struct DbtSchemaSource {
    project_root: PathBuf,
    config: SourceConfig,
    cache: Option<Arc<dyn SchemaCache>>,
}

impl DbtSchemaSource {
    /// Source for the project at `project_root` (already resolved)
    pub fn new(project_root: impl Into<PathBuf>, config: SourceConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config,
            cache: None,
        }
    }

    /// Cache extraction results
    pub fn with_cache(mut self, cache: Arc<dyn SchemaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn manifest_path(&self) -> PathBuf {
        if self.config.manifest_path.is_absolute() {
            self.config.manifest_path.clone()
        } else {
            self.project_root.join(&self.config.manifest_path)
        }
    }

    /// Extract the source schemas; never fails
    pub fn extract(&self) -> SchemaCollection {
        self.extract_with_strategy().schemas
    }

    /// Extract the source schemas and report which strategy produced them
    pub fn extract_with_strategy(&self) -> SourceExtraction {
        let models = discover_models(&self.project_root, &self.config.models_dir, &self.config.skip_dirs);
        let manifest_path = self.manifest_path();

        let cache_key = self.cache.as_ref().map(|_| self.cache_key(&models, &manifest_path));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(schemas) = cache.get(key) {
                tracing::info!(tables = schemas.len(), "using cached source schemas");
                return SourceExtraction {
                    schemas,
                    strategy: ExtractionStrategy::Cache,
                };
            }
        }

        let extraction = self.extract_uncached(&models, &manifest_path);

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if !extraction.schemas.is_empty() {
                cache.put(key, &extraction.schemas);
            }
        }

        extraction
    }

    fn cache_key(&self, models: &[ModelFile], manifest_path: &Path) -> String {
        let namespace = if self.config.fast_mode { "sql" } else { "manifest" };
        let files: Vec<PathBuf> = models.iter().map(|m| m.path.clone()).collect();
        let manifest = (!self.config.fast_mode).then_some(manifest_path);
        project_cache_key(namespace, &self.project_root, &files, manifest)
    }

    fn extract_uncached(&self, models: &[ModelFile], manifest_path: &Path) -> SourceExtraction {
        if self.config.fast_mode {
            tracing::info!("fast mode: inferring source schemas from SQL");
        } else if let Some(extraction) = self.extract_from_manifest(manifest_path) {
            return extraction;
        }

        let schemas = SqlSchemaExtractor::new().extract_files(models);
        if schemas.is_empty() {
            tracing::warn!(project = %self.project_root.display(), "no source schemas could be extracted");
            return SourceExtraction {
                schemas,
                strategy: ExtractionStrategy::Unavailable,
            };
        }

        tracing::info!(tables = schemas.len(), "inferred source schemas from SQL");
        SourceExtraction {
            schemas,
            strategy: ExtractionStrategy::SqlInference,
        }
    }

    fn extract_from_manifest(&self, manifest_path: &Path) -> Option<SourceExtraction> {
        let mut strategy = ExtractionStrategy::Manifest;

        if !manifest_path.exists() {
            if !self.config.compile {
                tracing::info!(path = %manifest_path.display(), "manifest not found and compile disabled");
                return None;
            }

            match DbtCompiler::from_config(&self.config).compile(&self.project_root) {
                Ok(_) => strategy = ExtractionStrategy::CompiledManifest,
                Err(e) => {
                    match e.category() {
                        Some(category) => tracing::warn!(
                            error = %e,
                            hint = category.hint(),
                            "compile failed, falling back to SQL inference"
                        ),
                        None => tracing::warn!(error = %e, "compile failed, falling back to SQL inference"),
                    }
                    return None;
                }
            }

            if !manifest_path.exists() {
                tracing::warn!(path = %manifest_path.display(), "compile finished without writing a manifest");
                return None;
            }
        }

        let manifest = match Manifest::from_file(manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(error = %e, "manifest unusable, falling back to SQL inference");
                return None;
            }
        };

        let schemas = manifest.to_schemas();
        if schemas.is_empty() {
            tracing::warn!(path = %manifest_path.display(), "manifest has no models, falling back to SQL inference");
            return None;
        }

        tracing::info!(tables = schemas.len(), strategy = %strategy, "loaded source schemas from manifest");
        Some(SourceExtraction { schemas, strategy })
    }
}
