//! Contract diff engine for comparing source schemas against API models
//!
//! The target side (API models) is the contract: every table it reads must
//! exist in the source, and every required column must be present. Extra
//! source tables and columns are never an error, and types are not compared.

use crate::suggest::{did_you_mean, similar_columns, similar_tables};
use schemapact_core::{
    category, Column, Issue, IssueSeverity, Schema, SchemaCollection, ValidationResult,
};
use std::panic::{self, AssertUnwindSafe};

/// Table name used for issues that do not concern a single table
pub const NO_TABLE: &str = "N/A";

/// Result of comparing one target table against its source table
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDiff {
    /// The table being checked
    pub table: String,

    /// Required target columns the source does not provide
    pub missing_required: Vec<Column>,

    /// Optional target columns the source does not provide
    pub missing_optional: Vec<Column>,
}

impl ContractDiff {
    /// Compare a target schema with the source schema of the same table
    ///
    /// Columns are visited by name so the outcome does not depend on
    /// declaration order.
    pub fn compare(target: &Schema, source: &Schema) -> Self {
        let mut columns: Vec<&Column> = target.columns.iter().collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        let (missing_required, missing_optional): (Vec<Column>, Vec<Column>) = columns
            .into_iter()
            .filter(|column| !source.has_column(&column.name))
            .cloned()
            .partition(|column| column.required);

        Self {
            table: target.table_name.clone(),
            missing_required,
            missing_optional,
        }
    }

    /// Whether the source breaks this table's contract
    pub fn has_errors(&self) -> bool {
        !self.missing_required.is_empty()
    }

    /// Whether anything at all is missing
    pub fn is_clean(&self) -> bool {
        self.missing_required.is_empty() && self.missing_optional.is_empty()
    }

    /// Issues for this table, required columns first
    pub fn issues(&self, target: &Schema, source: &Schema) -> Vec<Issue> {
        let mut source_columns = source.column_names();
        source_columns.sort_unstable();

        let required = self.missing_required.iter().map(|column| {
            let similar = similar_columns(&column.name, source_columns.iter().copied());
            let message = format!(
                "API model '{}' requires column '{}' but source table '{}' does not provide it",
                target.declaring_model, column.name, self.table
            );

            Issue::new(
                IssueSeverity::Critical,
                category::MISSING_REQUIRED_COLUMN,
                &self.table,
                message,
            )
            .with_column(&column.name)
            .with_comparison(
                format!("{} ({}) - REQUIRED", column.name, column.declared_type),
                "MISSING",
            )
            .with_suggestion(did_you_mean(&similar, "Add this column to the source model"))
            .with_file_path(target.source_file.clone())
        });

        let optional = self.missing_optional.iter().map(|column| {
            let similar = similar_columns(&column.name, source_columns.iter().copied());
            let message = format!(
                "API model '{}' expects optional column '{}' but source table '{}' does not provide it",
                target.declaring_model, column.name, self.table
            );

            Issue::new(
                IssueSeverity::Warning,
                category::MISSING_OPTIONAL_COLUMN,
                &self.table,
                message,
            )
            .with_column(&column.name)
            .with_comparison(
                format!("{} ({}) - optional", column.name, column.declared_type),
                "MISSING",
            )
            .with_suggestion(did_you_mean(&similar, "Consider adding this column if needed"))
            .with_file_path(target.source_file.clone())
        });

        required.chain(optional).collect()
    }
}

/// Validate that the source provides everything the target requires
///
/// Never panics outward: a failure inside the diff is reported as a single
/// CRITICAL `Validation Failure` issue.
pub fn validate(source: SchemaCollection, target: SchemaCollection) -> ValidationResult {
    let issues = guarded(|| diff_collections(&source, &target));
    ValidationResult::new(issues, source, target)
}

/// Run a diff body, turning a panic into a synthetic issue
fn guarded<F>(body: F) -> Vec<Issue>
where
    F: FnOnce() -> Vec<Issue>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(issues) => issues,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(reason = %reason, "validation aborted");

            vec![Issue::new(
                IssueSeverity::Critical,
                category::VALIDATION_FAILURE,
                NO_TABLE,
                format!("Validation failed with an internal error: {}", reason),
            )
            .with_suggestion("Check the extracted schemas and re-run with --verbose")]
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

fn diff_collections(source: &SchemaCollection, target: &SchemaCollection) -> Vec<Issue> {
    if target.is_empty() {
        tracing::warn!("no API models found, nothing to validate");
        return vec![Issue::new(
            IssueSeverity::Warning,
            category::NO_TARGET_MODELS,
            NO_TABLE,
            "No API models found - nothing to validate",
        )
        .with_suggestion("Check the target model source path")];
    }

    tracing::info!(
        source_tables = source.len(),
        target_tables = target.len(),
        "validating data contracts"
    );

    let source_tables: Vec<&str> = source.table_names().collect();
    let mut issues = Vec::new();

    // Table level
    for schema in target.schemas() {
        if source.contains(&schema.table_name) {
            continue;
        }

        let similar = similar_tables(&schema.table_name, source_tables.iter().copied());
        issues.push(missing_table_issue(schema, &similar));
    }

    for table in source_tables.iter().filter(|t| !target.contains(t)) {
        tracing::info!(table = %table, "source table not used by any API model");
    }

    // Column level
    for target_schema in target.schemas() {
        let Some(source_schema) = source.get(&target_schema.table_name) else {
            continue;
        };

        let diff = ContractDiff::compare(target_schema, source_schema);
        if diff.is_clean() {
            tracing::debug!(table = %diff.table, "all target columns present");
            continue;
        }

        tracing::debug!(
            table = %diff.table,
            missing_required = diff.missing_required.len(),
            missing_optional = diff.missing_optional.len(),
            "columns missing from source"
        );
        issues.extend(diff.issues(target_schema, source_schema));
    }

    tracing::info!(issues = issues.len(), "validation finished");
    issues
}

fn missing_table_issue(target: &Schema, similar: &[String]) -> Issue {
    let message = format!(
        "API model(s) [{}] require table '{}' but the source does not provide it",
        target.declaring_model, target.table_name
    );

    Issue::new(
        IssueSeverity::Critical,
        category::MISSING_TABLE,
        &target.table_name,
        message,
    )
    .with_comparison(
        format!("Table '{}' with required columns", target.table_name),
        "TABLE NOT FOUND",
    )
    .with_suggestion(did_you_mean(similar, "Create this table in the source models"))
    .with_file_path(target.source_file.clone())
}
