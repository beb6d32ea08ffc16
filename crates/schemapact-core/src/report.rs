//! Validation results and the report.json schema (stable v1)
//!
//! The report schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::issue::{Issue, IssueSeverity};
use crate::schema::SchemaCollection;

/// Outcome of one validation run
///
/// Owned by whoever called the diff engine; never shared across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    /// Issues in the order the engine produced them
    pub issues: Vec<Issue>,

    /// What the transformation project provides
    pub source_schemas: SchemaCollection,

    /// What the API models require
    pub target_schemas: SchemaCollection,
}

impl ValidationResult {
    /// Create a result from its parts
    pub fn new(
        issues: Vec<Issue>,
        source_schemas: SchemaCollection,
        target_schemas: SchemaCollection,
    ) -> Self {
        Self {
            issues,
            source_schemas,
            target_schemas,
        }
    }

    /// True when no CRITICAL issue exists
    pub fn success(&self) -> bool {
        !self.issues.iter().any(Issue::is_critical)
    }

    /// Issues that break the API
    pub fn critical_issues(&self) -> Vec<&Issue> {
        self.with_severity(IssueSeverity::Critical)
    }

    /// Non-blocking issues
    pub fn warnings(&self) -> Vec<&Issue> {
        self.with_severity(IssueSeverity::Warning)
    }

    /// Informational issues
    pub fn info(&self) -> Vec<&Issue> {
        self.with_severity(IssueSeverity::Info)
    }

    fn with_severity(&self, severity: IssueSeverity) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.severity == severity).collect()
    }

    /// Whether any issue is at or above the given severity
    pub fn has_issues_at_least(&self, severity: IssueSeverity) -> bool {
        self.issues.iter().any(|i| i.severity >= severity)
    }

    /// One-line summary for CI output
    pub fn summary_line(&self) -> String {
        let critical = self.critical_issues().len();
        let warnings = self.warnings().len();

        if self.issues.is_empty() {
            "All data contracts are valid".to_string()
        } else if critical > 0 {
            format!("{} critical issues found (blocking)", critical)
        } else if warnings > 0 {
            format!("{} warnings found (non-blocking)", warnings)
        } else {
            "Minor issues found".to_string()
        }
    }
}

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of issues
    pub total: usize,

    /// Number of critical issues
    pub critical: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Number of tables the source provides
    pub source_tables: usize,

    /// Number of tables the target requires
    pub target_tables: usize,
}

/// Validation report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Derived: no critical issues
    pub success: bool,

    /// One-line human summary
    pub summary_line: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Wall-clock duration of the run
    #[serde(default)]
    pub duration_ms: u64,

    /// All issues
    pub issues: Vec<Issue>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Report {
    /// Build a report from a validation result
    pub fn from_result(result: &ValidationResult) -> Self {
        let summary = ReportSummary {
            total: result.issues.len(),
            critical: result.critical_issues().len(),
            warnings: result.warnings().len(),
            info: result.info().len(),
            source_tables: result.source_schemas.len(),
            target_tables: result.target_schemas.len(),
        };

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            success: result.success(),
            summary_line: result.summary_line(),
            summary,
            duration_ms: 0,
            issues: result.issues.clone(),
            metadata: None,
        }
    }

    /// Report for a run that was skipped because nothing relevant changed
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            success: true,
            summary_line: reason.into(),
            summary: ReportSummary::default(),
            duration_ms: 0,
            issues: Vec::new(),
            metadata: None,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check if the report has any critical issues
    pub fn has_critical(&self) -> bool {
        self.summary.critical > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Data Contract Validation Report\n\n");
        md.push_str(&format!("**Version:** {}\n\n", self.version));
        md.push_str(&format!("**Timestamp:** {}\n\n", self.timestamp));
        md.push_str(&format!(
            "**Status:** {}\n\n",
            if self.success { "passed" } else { "failed" }
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- {}\n", self.summary_line));
        md.push_str(&format!("- Critical: {}\n", self.summary.critical));
        md.push_str(&format!("- Warnings: {}\n", self.summary.warnings));
        md.push_str(&format!("- Info: {}\n", self.summary.info));
        md.push_str(&format!(
            "- Tables: {} required by API models, {} provided\n\n",
            self.summary.target_tables, self.summary.source_tables
        ));

        if self.issues.is_empty() {
            md.push_str("✅ **No issues found!**\n");
            return md;
        }

        md.push_str("## Issues\n\n");
        for issue in &self.issues {
            let emoji = match issue.severity {
                IssueSeverity::Critical => "❌",
                IssueSeverity::Warning => "⚠️",
                IssueSeverity::Info => "ℹ️",
            };

            md.push_str(&format!(
                "### {} {} - {}\n\n",
                emoji,
                issue.category,
                issue.qualified_name()
            ));
            md.push_str(&format!("{}\n\n", issue.message));

            if let Some(expected) = &issue.target_expectation {
                md.push_str(&format!("**API expects:** `{}`\n\n", expected));
            }
            if let Some(actual) = &issue.source_actual {
                md.push_str(&format!("**Source provides:** `{}`\n\n", actual));
            }
            if let Some(fix) = &issue.suggested_fix {
                md.push_str(&format!("**Fix:** {}\n\n", fix));
            }
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::category;

    fn sample_result() -> ValidationResult {
        ValidationResult::new(
            vec![
                Issue::new(IssueSeverity::Critical, category::MISSING_TABLE, "orders", "missing"),
                Issue::new(IssueSeverity::Warning, category::MISSING_OPTIONAL_COLUMN, "users", "missing")
                    .with_column("bio"),
            ],
            SchemaCollection::new(),
            SchemaCollection::new(),
        )
    }

    #[test]
    fn empty_result_is_success() {
        let result = ValidationResult::default();
        assert!(result.success());
        assert_eq!(result.summary_line(), "All data contracts are valid");
    }

    #[test]
    fn severity_buckets() {
        let result = sample_result();
        assert!(!result.success());
        assert_eq!(result.critical_issues().len(), 1);
        assert_eq!(result.warnings().len(), 1);
        assert!(result.info().is_empty());
        assert!(result.has_issues_at_least(IssueSeverity::Warning));
        assert_eq!(result.summary_line(), "1 critical issues found (blocking)");
    }

    #[test]
    fn warnings_only_is_success() {
        let mut result = sample_result();
        result.issues.remove(0);
        assert!(result.success());
        assert!(!result.has_issues_at_least(IssueSeverity::Critical));
        assert_eq!(result.summary_line(), "1 warnings found (non-blocking)");
    }

    #[test]
    fn report_from_result() {
        let report = Report::from_result(&sample_result());
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.critical, 1);
        assert!(report.has_critical());
        assert!(!report.success);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"issues\""));
        assert!(json.contains("Missing Required Table"));

        let md = report.to_markdown();
        assert!(md.contains("users.bio"));
    }

    #[test]
    fn skipped_report() {
        let report = Report::skipped("No relevant changes detected");
        assert!(report.success);
        assert!(report.issues.is_empty());
        assert!(report.to_markdown().contains("No issues found"));
    }
}
