//! Configuration schema (schemapact.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::issue::IssueSeverity;

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "schemapact.toml";

/// Transformation project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Project root
    pub project_path: PathBuf,

    /// Skip compiled metadata entirely and infer from SQL
    pub fast_mode: bool,

    /// Allow invoking the compiler when the manifest is absent
    pub compile: bool,

    /// Compiler program, invoked as `<cmd> compile --quiet`
    pub compile_command: String,

    /// Upper bound on a compile run
    pub compile_timeout_secs: u64,

    /// Model SQL directory, relative to the project
    pub models_dir: PathBuf,

    /// Compiled manifest, relative to the project
    pub manifest_path: PathBuf,

    /// Directory names whose SQL is never a model
    pub skip_dirs: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            project_path: PathBuf::from("."),
            fast_mode: false,
            compile: true,
            compile_command: "dbt".to_string(),
            compile_timeout_secs: 120,
            models_dir: PathBuf::from("models"),
            manifest_path: PathBuf::from("target/manifest.json"),
            skip_dirs: ["analysis", "tests", "macros", "snapshots"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SourceConfig {
    /// Compile timeout as a duration
    pub fn compile_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.compile_timeout_secs)
    }
}

/// API model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Where model declarations come from: a Pydantic-style `.py` file or a
    /// `.json`/`.yml`/`.yaml` declaration document
    pub model_source: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            model_source: PathBuf::from("app/models.py"),
        }
    }
}

/// Extraction cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether source extraction results are cached
    pub enabled: bool,

    /// Cache directory
    pub dir: PathBuf,

    /// Freshness window
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".schemapact-cache"),
            ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// Freshness window as a duration
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

/// Lowest severity that fails a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    #[default]
    Critical,
    Warning,
}

impl FailOn {
    /// The severity threshold this setting stands for
    pub fn threshold(&self) -> IssueSeverity {
        match self {
            Self::Critical => IssueSeverity::Critical,
            Self::Warning => IssueSeverity::Warning,
        }
    }
}

/// Validation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lowest severity that fails the run
    pub fail_on: FailOn,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Directory relative paths resolve against
    #[serde(skip)]
    pub config_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            target: TargetConfig::default(),
            cache: CacheConfig::default(),
            validation: ValidationConfig::default(),
            config_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Relative paths are relative to the config file
        if let Some(parent) = path.parent() {
            config.config_root = if parent.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                parent.to_path_buf()
            };
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Resolve a configured path against the config directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_root.join(path)
        }
    }

    /// Absolute-or-config-relative project root
    pub fn project_path(&self) -> PathBuf {
        self.resolve(&self.source.project_path)
    }

    /// Absolute-or-config-relative model source
    pub fn model_source(&self) -> PathBuf {
        self.resolve(&self.target.model_source)
    }

    /// Absolute-or-config-relative cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache.dir)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
