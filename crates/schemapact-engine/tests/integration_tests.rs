//! Integration tests for contract validation

use pretty_assertions::assert_eq;
use schemapact_core::{
    category, Column, ColumnType, Issue, IssueSeverity, Schema, SchemaCollection, SchemaOrigin,
};
use schemapact_engine::{validate, NO_TABLE};
use schemapact_sql::SqlSchemaExtractor;

fn source(tables: &[(&str, &[&str])]) -> SchemaCollection {
    tables
        .iter()
        .map(|(name, columns)| {
            Schema::new(*name, SchemaOrigin::CompiledMetadata).with_columns(
                columns
                    .iter()
                    .map(|c| Column::new(c, ColumnType::Unknown))
                    .collect(),
            )
        })
        .collect()
}

fn model(table: &str, model: &str, columns: &[(&str, bool)]) -> Schema {
    Schema::new(table, SchemaOrigin::ModelReflection)
        .with_declaring_model(model)
        .with_columns(
            columns
                .iter()
                .map(|(c, required)| Column::new(c, ColumnType::Varchar).with_required(*required))
                .collect(),
        )
}

fn targets(models: Vec<Schema>) -> SchemaCollection {
    models.into_iter().collect()
}

fn summary(issues: &[Issue]) -> Vec<(IssueSeverity, &str, &str, Option<&str>)> {
    issues
        .iter()
        .map(|i| (i.severity, i.category.as_str(), i.table.as_str(), i.column.as_deref()))
        .collect()
}

#[test]
fn missing_table_is_one_critical_issue() {
    let result = validate(
        source(&[("users", &["id"])]),
        targets(vec![model("orders", "Order", &[("order_id", true)])]),
    );

    assert!(!result.success());
    assert_eq!(
        summary(&result.issues),
        vec![(IssueSeverity::Critical, category::MISSING_TABLE, "orders", None)]
    );
    assert_eq!(result.issues[0].source_actual.as_deref(), Some("TABLE NOT FOUND"));
    assert_eq!(
        result.issues[0].suggested_fix.as_deref(),
        Some("Create this table in the source models")
    );
}

#[test]
fn identical_required_columns_pass() {
    let result = validate(
        source(&[("users", &["id", "email"])]),
        targets(vec![model("users", "User", &[("id", true), ("email", true)])]),
    );

    assert!(result.success());
    assert!(result.issues.is_empty());
    assert_eq!(result.summary_line(), "All data contracts are valid");
}

#[test]
fn subset_target_never_fails() {
    let result = validate(
        source(&[
            ("users", &["id", "email", "created_at"]),
            ("orders", &["id", "user_id"]),
            ("audit_log", &["id"]),
        ]),
        targets(vec![
            model("users", "User", &[("id", true), ("email", false)]),
            model("orders", "Order", &[("user_id", true)]),
        ]),
    );

    assert!(result.success());
    assert!(result.critical_issues().is_empty());
    assert!(result.issues.is_empty());
}

#[test]
fn one_issue_per_missing_column() {
    let result = validate(
        source(&[("users", &["id", "usr_email"])]),
        targets(vec![model(
            "users",
            "User",
            &[("id", true), ("user_email", true), ("phone", true), ("bio", false)],
        )]),
    );

    assert!(!result.success());
    assert_eq!(
        summary(&result.issues),
        vec![
            (IssueSeverity::Critical, category::MISSING_REQUIRED_COLUMN, "users", Some("phone")),
            (IssueSeverity::Critical, category::MISSING_REQUIRED_COLUMN, "users", Some("user_email")),
            (IssueSeverity::Warning, category::MISSING_OPTIONAL_COLUMN, "users", Some("bio")),
        ]
    );

    let typo = &result.issues[1];
    assert_eq!(typo.suggested_fix.as_deref(), Some("Did you mean: usr_email?"));
    assert_eq!(result.critical_issues().len(), 2);
    assert_eq!(result.warnings().len(), 1);
}

#[test]
fn missing_tables_come_before_column_issues() {
    let result = validate(
        source(&[("users", &["id"]), ("order", &["id"])]),
        targets(vec![
            model("users", "User", &[("id", true), ("email", true)]),
            model("orders", "Order", &[("id", true)]),
        ]),
    );

    assert_eq!(
        summary(&result.issues),
        vec![
            (IssueSeverity::Critical, category::MISSING_TABLE, "orders", None),
            (IssueSeverity::Critical, category::MISSING_REQUIRED_COLUMN, "users", Some("email")),
        ]
    );
    assert_eq!(result.issues[0].suggested_fix.as_deref(), Some("Did you mean: order, users?"));
}

#[test]
fn empty_source_flags_every_target_table() {
    let result = validate(
        SchemaCollection::new(),
        targets(vec![
            model("users", "User", &[("id", true)]),
            model("orders", "Order", &[("id", true)]),
        ]),
    );

    assert!(!result.success());
    assert_eq!(result.critical_issues().len(), 2);
    assert!(result.issues.iter().all(|i| i.category == category::MISSING_TABLE));
}

#[test]
fn empty_target_warns_but_succeeds() {
    let result = validate(source(&[("users", &["id"])]), SchemaCollection::new());

    assert!(result.success());
    assert_eq!(
        summary(&result.issues),
        vec![(IssueSeverity::Warning, category::NO_TARGET_MODELS, NO_TABLE, None)]
    );
}

#[test]
fn result_is_independent_of_declaration_order() {
    let forward = targets(vec![
        model("users", "User", &[("a", true), ("b", true), ("c", false)]),
        model("orders", "Order", &[("x", true)]),
    ]);
    let backward = targets(vec![
        model("orders", "Order", &[("x", true)]),
        model("users", "User", &[("c", false), ("b", true), ("a", true)]),
    ]);

    let first = validate(source(&[("users", &["id"])]), forward);
    let second = validate(source(&[("users", &["id"])]), backward);

    assert_eq!(first.issues, second.issues);
}

#[test]
fn issue_provenance_follows_target_file() {
    let result = validate(
        SchemaCollection::new(),
        targets(vec![model("users", "User", &[("id", true)]).with_source_file("app/models.py")]),
    );

    assert_eq!(result.issues[0].file_path.as_deref(), Some("app/models.py"));
}

#[test]
fn issues_survive_json_round_trip() {
    let result = validate(
        source(&[("users", &["id"])]),
        targets(vec![model("users", "User", &[("email", true)])]),
    );

    let json = serde_json::to_string(&result.issues).unwrap();
    let back: Vec<Issue> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result.issues);
}

#[test]
fn sql_models_against_api_models() {
    let extractor = SqlSchemaExtractor::new();
    let users = extractor
        .extract_model(
            "users",
            "select id as user_id, email, count(*) as total from raw_users",
        )
        .unwrap();
    let source: SchemaCollection = std::iter::once(users).collect();

    let result = validate(
        source,
        targets(vec![model(
            "users",
            "UserStats",
            &[("user_id", true), ("email", true), ("total", true), ("last_seen", false)],
        )]),
    );

    assert!(result.success());
    assert_eq!(
        summary(&result.issues),
        vec![(IssueSeverity::Warning, category::MISSING_OPTIONAL_COLUMN, "users", Some("last_seen"))]
    );
}
