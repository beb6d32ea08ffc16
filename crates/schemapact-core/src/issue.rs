//! Contract issues produced by the diff engine
//!
//! Category strings are part of the JSON output consumed by CI tooling.
//! Do not rename them; add new ones instead.

use serde::{Deserialize, Serialize};

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Informational message
    Info,

    /// Non-blocking: the API keeps working but something is off
    Warning,

    /// Blocking: the API will break at runtime
    Critical,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Stable category names
pub mod category {
    pub const MISSING_TABLE: &str = "Missing Required Table";
    pub const MISSING_REQUIRED_COLUMN: &str = "Missing Required Column";
    pub const MISSING_OPTIONAL_COLUMN: &str = "Missing Optional Column";
    pub const NO_TARGET_MODELS: &str = "No Target Models";
    pub const VALIDATION_FAILURE: &str = "Validation Failure";
}

/// One discrepancy between source and target schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity level
    pub severity: IssueSeverity,

    /// Stable category name
    pub category: String,

    /// Table the issue concerns
    pub table: String,

    /// Column the issue concerns, for column-level issues
    #[serde(default)]
    pub column: Option<String>,

    /// Human-readable message
    pub message: String,

    /// Remediation hint (typo suggestions land here)
    #[serde(default)]
    pub suggested_fix: Option<String>,

    /// What the API model expects
    #[serde(default)]
    pub target_expectation: Option<String>,

    /// What the transformation project actually provides
    #[serde(default)]
    pub source_actual: Option<String>,

    /// File declaring the target model, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Issue {
    /// Create a new issue with minimal fields
    pub fn new(
        severity: IssueSeverity,
        category: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            table: table.into(),
            column: None,
            message: message.into(),
            suggested_fix: None,
            target_expectation: None,
            source_actual: None,
            file_path: None,
        }
    }

    /// Set the column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set the suggested fix
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    /// Set target expectation / source actual values
    pub fn with_comparison(
        mut self,
        target_expectation: impl Into<String>,
        source_actual: impl Into<String>,
    ) -> Self {
        self.target_expectation = Some(target_expectation.into());
        self.source_actual = Some(source_actual.into());
        self
    }

    /// Set the declaring file
    pub fn with_file_path(mut self, file_path: Option<String>) -> Self {
        self.file_path = file_path;
        self
    }

    /// Whether this issue blocks deployment
    pub fn is_critical(&self) -> bool {
        self.severity == IssueSeverity::Critical
    }

    /// `table` or `table.column`
    pub fn qualified_name(&self) -> String {
        match &self.column {
            Some(column) => format!("{}.{}", self.table, column),
            None => self.table.clone(),
        }
    }
}
