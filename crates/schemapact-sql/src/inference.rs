//! Heuristic column inference from model SQL
//!
//! This is NOT a SQL parser. Templates and comments are stripped with
//! independent regex passes, the last `select ... from` projection is taken as
//! the model's output, and each projected expression gets a name and a coarse
//! type from textual patterns. Malformed input degrades to fewer (or zero)
//! columns instead of an error.

use regex::Regex;
use schemapact_core::{Column, ColumnType};
use std::sync::OnceLock;

/// Name used when an expression has no recoverable alias
///
/// Several un-aliasable expressions in one model collide on this name; only
/// the first survives in the resulting schema.
pub const COMPUTED_COLUMN: &str = "computed_column";

/// Snippet length quoted in generated descriptions
const DESCRIPTION_SNIPPET: usize = 50;

/// Anything that can turn model SQL into an ordered column list
///
/// A grammar-backed implementation can replace the heuristic one without
/// touching callers.
pub trait ColumnExtractor {
    /// Extract the output columns of one model. Empty means "no projection found".
    fn extract_columns(&self, sql: &str) -> Vec<Column>;
}

/// Regex-based extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSqlExtractor;

impl ColumnExtractor for HeuristicSqlExtractor {
    fn extract_columns(&self, sql: &str) -> Vec<Column> {
        extract_columns(sql)
    }
}

struct Patterns {
    jinja_expr: Regex,
    jinja_stmt: Regex,
    jinja_comment: Regex,
    line_comment: Regex,
    block_comment: Regex,
    select: Regex,
    leading_distinct: Regex,
    as_alias: Regex,
    qualified: Regex,
    bare_ident: Regex,
    case_keyword: Regex,
    int_function: Regex,
    avg_function: Regex,
    string_function: Regex,
    timestamp_token: Regex,
    date_token: Regex,
    bool_token: Regex,
    id_name: Regex,
    timestamp_name: Regex,
    integer_name: Regex,
    float_name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static regex");
        Patterns {
            jinja_expr: re(r"\{\{[^}]+\}\}"),
            jinja_stmt: re(r"\{%[^%]*%\}"),
            jinja_comment: re(r"\{#[\s\S]*?#\}"),
            line_comment: re(r"--[^\n]*"),
            block_comment: re(r"/\*[\s\S]*?\*/"),
            select: re(r"(?is)\bselect\s+(.*?)\s+from\b"),
            leading_distinct: re(r"(?i)^distinct\s+"),
            as_alias: re(r#"(?i)\s+as\s+["`]?(\w+)["`]?$"#),
            qualified: re(r"(\w+)\.(\w+)$"),
            bare_ident: re(r"^(\w+)$"),
            case_keyword: re(r"(?i)\b(case|when|then|else|end)\b"),
            int_function: re(r"(?i)\b(count|sum|row_number)\s*\("),
            avg_function: re(r"(?i)\bavg\s*\("),
            string_function: re(r"(?i)\b(concat|upper|lower|trim)\s*\("),
            timestamp_token: re(r"(?i)(?:^|[^a-z0-9])(?:current_timestamp|timestamp)(?:[^a-z0-9]|$)"),
            date_token: re(r"(?i)(?:^|[^a-z0-9])date(?:[^a-z0-9]|$)"),
            bool_token: re(r"(?i)(?:^|[^a-z0-9])(?:true|false|boolean)(?:[^a-z0-9]|$)"),
            id_name: re(r"(?i)_id$|^id$"),
            timestamp_name: re(r"(?i)_at$|_time$|timestamp"),
            integer_name: re(r"(?i)count|total|sum"),
            float_name: re(r"(?i)rate|ratio|percentage|avg"),
        }
    })
}

/// Remove templating, line comments and block comments
pub fn strip_noise(sql: &str) -> String {
    let p = patterns();
    let cleaned = p.jinja_comment.replace_all(sql, "");
    let cleaned = p.jinja_expr.replace_all(&cleaned, "");
    let cleaned = p.jinja_stmt.replace_all(&cleaned, "");
    let cleaned = p.line_comment.replace_all(&cleaned, "");
    let cleaned = p.block_comment.replace_all(&cleaned, "");
    cleaned.into_owned()
}

/// Projection text of the last `select ... from` in the SQL
///
/// CTEs come first in a model, so the last match is the model's output.
pub fn find_final_select(sql: &str) -> Option<String> {
    let cleaned = strip_noise(sql);
    let projection = patterns()
        .select
        .captures_iter(&cleaned)
        .last()?
        .get(1)?
        .as_str()
        .trim();

    let projection = patterns().leading_distinct.replace(projection, "");
    Some(projection.trim().to_string())
}

/// Split a projection on commas outside parentheses
pub fn split_columns(projection: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for ch in projection.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    columns.push(trimmed.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        columns.push(trimmed.to_string());
    }

    columns
}

/// Output name of one projected expression
pub fn infer_column_name(expression: &str) -> String {
    let p = patterns();
    let expression = expression.trim();

    if let Some(caps) = p.as_alias.captures(expression) {
        return caps[1].to_lowercase();
    }

    if let Some(caps) = p.qualified.captures(expression) {
        return caps[2].to_lowercase();
    }

    if let Some(caps) = p.bare_ident.captures(expression) {
        return caps[1].to_lowercase();
    }

    // `expr alias` without AS; a trailing call or paren fragment is not an alias
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if let Some(last) = parts.last() {
        if parts.len() > 1 && !p.case_keyword.is_match(expression) && p.bare_ident.is_match(last) {
            return last.to_lowercase();
        }
    }

    COMPUTED_COLUMN.to_string()
}

/// Coarse type of one projected expression
///
/// Function and keyword tokens in the expression win; otherwise the
/// inferred output name decides.
pub fn infer_column_type(expression: &str, name: &str) -> ColumnType {
    let p = patterns();

    if p.int_function.is_match(expression) {
        return ColumnType::Integer;
    }
    if p.avg_function.is_match(expression) {
        return ColumnType::Float;
    }
    if p.string_function.is_match(expression) {
        return ColumnType::Varchar;
    }
    if p.timestamp_token.is_match(expression) {
        return ColumnType::Timestamp;
    }
    if p.date_token.is_match(expression) {
        return ColumnType::Date;
    }
    if p.bool_token.is_match(expression) {
        return ColumnType::Boolean;
    }

    if p.id_name.is_match(name) {
        ColumnType::Varchar
    } else if p.timestamp_name.is_match(name) {
        ColumnType::Timestamp
    } else if p.integer_name.is_match(name) {
        ColumnType::Integer
    } else if p.float_name.is_match(name) {
        ColumnType::Float
    } else {
        ColumnType::Varchar
    }
}

fn describe(expression: &str) -> String {
    let snippet: String = expression.chars().take(DESCRIPTION_SNIPPET).collect();
    let ellipsis = if expression.chars().count() > DESCRIPTION_SNIPPET { "..." } else { "" };
    format!("Generated from: {}{}", snippet, ellipsis)
}

/// Turn one projected expression into a column
///
/// Returns None for empty fragments and bare `*`.
pub fn parse_column(expression: &str) -> Option<Column> {
    let expression = expression.trim();
    if expression.is_empty() || expression == "*" {
        return None;
    }

    let name = infer_column_name(expression);
    let declared_type = infer_column_type(expression, &name);

    Some(
        Column::new(&name, declared_type)
            .with_required(true)
            .with_description(describe(expression)),
    )
}

/// Extract the output columns of one model's SQL
///
/// Duplicate names keep the first occurrence.
pub fn extract_columns(sql: &str) -> Vec<Column> {
    let Some(projection) = find_final_select(sql) else {
        return Vec::new();
    };

    let mut columns: Vec<Column> = Vec::new();
    for fragment in split_columns(&projection) {
        let Some(column) = parse_column(&fragment) else {
            continue;
        };

        if columns.iter().any(|c| c.name == column.name) {
            tracing::debug!(column = %column.name, "duplicate inferred column name, keeping first");
            continue;
        }
        columns.push(column);
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shape(columns: &[Column]) -> Vec<(&str, ColumnType, bool)> {
        columns
            .iter()
            .map(|c| (c.name.as_str(), c.declared_type, c.required))
            .collect()
    }

    #[test]
    fn simple_projection() {
        let columns = extract_columns("select id as user_id, email, count(*) as total from raw_users");

        assert_eq!(
            shape(&columns),
            vec![
                ("user_id", ColumnType::Varchar, true),
                ("email", ColumnType::Varchar, true),
                ("total", ColumnType::Integer, true),
            ]
        );
    }

    #[test]
    fn final_select_wins_over_ctes() {
        let sql = r#"
            with base as (
                select a, b from {{ ref('raw') }}
            ),
            agg as (
                select a, sum(b) as b_sum from base group by a
            )
            select
                a as account_key,
                b_sum
            from agg
        "#;

        let names: Vec<String> = extract_columns(sql).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["account_key", "b_sum"]);
    }

    #[test]
    fn no_select_yields_nothing() {
        assert!(extract_columns("{{ config(materialized='table') }}").is_empty());
        assert!(extract_columns("").is_empty());
        assert!(find_final_select("update t set a = 1").is_none());
    }

    #[test]
    fn comments_and_templates_are_stripped() {
        let sql = "select\n  -- the key\n  u.id, /* block, with comma */ u.name\n{# note #}from {{ ref('users') }} u";
        let names: Vec<String> = extract_columns(sql).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn split_respects_parentheses() {
        let parts = split_columns("coalesce(a, b) as ab, concat(first, ' ', last) full_name, c");
        assert_eq!(
            parts,
            vec!["coalesce(a, b) as ab", "concat(first, ' ', last) full_name", "c"]
        );
    }

    #[test]
    fn star_and_empty_fragments_are_skipped() {
        let columns = extract_columns("select *, , id from t");
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "id");
    }

    #[test]
    fn name_inference_order() {
        assert_eq!(infer_column_name("id AS User_Key"), "user_key");
        assert_eq!(infer_column_name("d.Username"), "username");
        assert_eq!(infer_column_name("Email"), "email");
        assert_eq!(infer_column_name("amount * 100 cents"), "cents");
        assert_eq!(infer_column_name("coalesce(a, b)"), COMPUTED_COLUMN);
        assert_eq!(
            infer_column_name("case when a > 1 then 'x' else 'y' end"),
            COMPUTED_COLUMN
        );
    }

    #[test]
    fn case_expression_with_alias_keeps_alias() {
        assert_eq!(
            infer_column_name("case when paid then 1 else 0 end as is_paid"),
            "is_paid"
        );
    }

    #[test]
    fn function_types_take_priority() {
        assert_eq!(infer_column_type("count(distinct id)", "n"), ColumnType::Integer);
        assert_eq!(infer_column_type("row_number() over (order by x)", "rn"), ColumnType::Integer);
        assert_eq!(infer_column_type("avg(score)", "score_total"), ColumnType::Float);
        assert_eq!(infer_column_type("upper(code)", "code_count"), ColumnType::Varchar);
        assert_eq!(infer_column_type("current_timestamp", "loaded"), ColumnType::Timestamp);
        assert_eq!(infer_column_type("cast(x as date)", "day"), ColumnType::Date);
        assert_eq!(infer_column_type("true", "flag"), ColumnType::Boolean);
    }

    #[test]
    fn name_patterns_apply_last() {
        assert_eq!(infer_column_type("account_id", "account_id"), ColumnType::Varchar);
        assert_eq!(infer_column_type("created_at", "created_at"), ColumnType::Timestamp);
        assert_eq!(infer_column_type("order_total", "order_total"), ColumnType::Integer);
        assert_eq!(infer_column_type("conversion_rate", "conversion_rate"), ColumnType::Float);
        assert_eq!(infer_column_type("email", "email"), ColumnType::Varchar);
    }

    #[test]
    fn account_is_not_an_aggregate() {
        // `account` contains "count" but is not a call to count()
        assert_eq!(infer_column_type("account_id", "account_id"), ColumnType::Varchar);
    }

    #[test]
    fn descriptions_quote_truncated_source() {
        let long = format!("{} as x", "a + ".repeat(30));
        let column = parse_column(&long).unwrap();
        assert!(column.description.starts_with("Generated from: a + a"));
        assert!(column.description.ends_with("..."));

        let short = parse_column("email").unwrap();
        assert_eq!(short.description, "Generated from: email");
    }

    #[test]
    fn computed_columns_collapse() {
        let columns = extract_columns("select coalesce(a, b), nullif(c, 0), d from t");
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![COMPUTED_COLUMN, "d"]);
    }

    #[test]
    fn distinct_is_not_part_of_the_first_column() {
        let names: Vec<String> = extract_columns("select distinct user_id, email from t")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["user_id", "email"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let sql = "select id as user_id, email, created_at, avg(score) as avg_score from users";
        let first = extract_columns(sql);
        let second = extract_columns(sql);
        assert_eq!(first, second);
    }
}
