//! Table-name inference for model classes

use regex::Regex;
use std::sync::OnceLock;

fn word_boundaries() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"),
            Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"),
        )
    })
}

/// `UserProfile` → `user_profile`, `HTTPRequest` → `http_request`
pub fn to_snake_case(name: &str) -> String {
    let (words, humps) = word_boundaries();
    let spaced = words.replace_all(name, "${1}_${2}");
    humps.replace_all(&spaced, "${1}_${2}").to_lowercase()
}

/// Whether a class name marks a mixin rather than an endpoint model
pub fn is_abstract_name(name: &str) -> bool {
    name.contains("Base") || name.contains("Abstract")
}

/// Table a model class maps to, or None for Base/Abstract classes
///
/// Snake-cased and pluralized with a trailing `s` unless the name already
/// ends in `s` or `_data`.
pub fn infer_table_name(class_name: &str) -> Option<String> {
    if is_abstract_name(class_name) {
        return None;
    }

    let mut table = to_snake_case(class_name);
    if !table.ends_with('s') && !table.ends_with("_data") {
        table.push('s');
    }
    Some(table)
}
