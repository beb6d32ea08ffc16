//! Pydantic-style model scanning from Python source
//!
//! A line-oriented scan, not a Python parser. It recognizes top-level
//! classes deriving (transitively) from `BaseModel`, their annotated
//! fields, `Field(...)` defaults, `constr(max_length=...)` constraints and
//! the `class Config: table_name = "..."` override. Anything it does not
//! recognize is skipped.

use crate::field::{split_top_level, FieldDeclaration, FieldDefault};
use crate::provider::ModelDeclaration;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

struct Patterns {
    class_header: Regex,
    config_class: Regex,
    config_table_name: Regex,
    model_config_table_name: Regex,
    max_length: Regex,
    identifier: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static regex");
        Patterns {
            class_header: re(r"^class\s+(\w+)\s*(?:\((.*)\))?\s*:"),
            config_class: re(r"^class\s+Config\b"),
            config_table_name: re(r#"^table_name\s*(?::\s*[\w\[\]]+)?\s*=\s*["']([^"']+)["']"#),
            model_config_table_name: re(r#"table_name["']?\s*[:=]\s*["']([^"']+)["']"#),
            max_length: re(r"\bmax_length\s*=\s*(\d+)"),
            identifier: re(r"^[A-Za-z]\w*$"),
        }
    })
}

/// One logical source line: continuation lines joined, comments removed
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogicalLine {
    indent: usize,
    text: String,
}

/// A class as written, before inheritance is resolved
#[derive(Debug, Clone, Default)]
struct RawClass {
    name: String,
    bases: Vec<String>,
    fields: Vec<FieldDeclaration>,
    table_name: Option<String>,
    source_file: Option<String>,
}

/// Collects classes from one or more Python sources
///
/// Inheritance is resolved across every source added, so parents may live
/// in a different file from their children.
#[derive(Debug, Default)]
pub struct PydanticScanner {
    classes: Vec<RawClass>,
}

impl PydanticScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one source file's text
    pub fn add_source(&mut self, source: &str, source_file: Option<&str>) -> &mut Self {
        for mut class in scan_classes(source) {
            class.source_file = source_file.map(str::to_string);
            // A redefinition replaces the earlier class, as at import time
            if let Some(existing) = self.classes.iter_mut().find(|c| c.name == class.name) {
                *existing = class;
            } else {
                self.classes.push(class);
            }
        }
        self
    }

    /// Typed data models found so far, in source order
    pub fn declarations(&self) -> Vec<ModelDeclaration> {
        let by_name: HashMap<&str, &RawClass> =
            self.classes.iter().map(|c| (c.name.as_str(), c)).collect();

        self.classes
            .iter()
            .filter(|class| is_model(class, &by_name, &mut HashSet::new()))
            .map(|class| {
                let mut declaration = ModelDeclaration::new(&class.name);
                declaration.fields = resolve_fields(class, &by_name, &mut HashSet::new());
                declaration.table_name = resolve_table_name(class, &by_name, &mut HashSet::new());
                declaration.source_file = class.source_file.clone();
                declaration
            })
            .collect()
    }
}

/// Scan a single source into model declarations
pub fn scan_source(source: &str, source_file: Option<&str>) -> Vec<ModelDeclaration> {
    let mut scanner = PydanticScanner::new();
    scanner.add_source(source, source_file);
    scanner.declarations()
}

fn base_name(base: &str) -> &str {
    let base = base.split('[').next().unwrap_or(base).trim();
    base.rsplit('.').next().unwrap_or(base)
}

fn is_model<'a>(class: &'a RawClass, by_name: &HashMap<&str, &'a RawClass>, visiting: &mut HashSet<&'a str>) -> bool {
    if !visiting.insert(class.name.as_str()) {
        return false;
    }

    class.bases.iter().any(|base| {
        let name = base_name(base);
        name == "BaseModel"
            || by_name
                .get(name)
                .copied()
                .map(|parent| is_model(parent, by_name, visiting))
                .unwrap_or(false)
    })
}

fn resolve_fields<'a>(
    class: &'a RawClass,
    by_name: &HashMap<&str, &'a RawClass>,
    visiting: &mut HashSet<&'a str>,
) -> Vec<FieldDeclaration> {
    if !visiting.insert(class.name.as_str()) {
        return Vec::new();
    }

    let mut fields: Vec<FieldDeclaration> = Vec::new();

    // Later bases first so the first base listed wins, then the class itself
    for base in class.bases.iter().rev() {
        if let Some(parent) = by_name.get(base_name(base)).copied() {
            for field in resolve_fields(parent, by_name, visiting) {
                merge_field(&mut fields, field);
            }
        }
    }
    for field in &class.fields {
        merge_field(&mut fields, field.clone());
    }

    visiting.remove(class.name.as_str());
    fields
}

fn merge_field(fields: &mut Vec<FieldDeclaration>, field: FieldDeclaration) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

fn resolve_table_name<'a>(
    class: &'a RawClass,
    by_name: &HashMap<&str, &'a RawClass>,
    visiting: &mut HashSet<&'a str>,
) -> Option<String> {
    if !visiting.insert(class.name.as_str()) {
        return None;
    }
    if class.table_name.is_some() {
        return class.table_name.clone();
    }

    class.bases.iter().find_map(|base| {
        by_name
            .get(base_name(base))
            .copied()
            .and_then(|parent| resolve_table_name(parent, by_name, visiting))
    })
}

fn scan_classes(source: &str) -> Vec<RawClass> {
    let p = patterns();
    let mut classes = Vec::new();
    let mut current: Option<RawClass> = None;
    let mut body_indent: Option<usize> = None;
    let mut config_indent: Option<usize> = None;

    for line in logical_lines(source) {
        if line.indent == 0 {
            if let Some(class) = current.take() {
                classes.push(class);
            }
            body_indent = None;
            config_indent = None;

            if let Some(caps) = p.class_header.captures(&line.text) {
                let bases = caps
                    .get(2)
                    .map(|b| {
                        split_top_level(b.as_str(), ',')
                            .into_iter()
                            .filter(|base| !base.contains('='))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                current = Some(RawClass {
                    name: caps[1].to_string(),
                    bases,
                    ..RawClass::default()
                });
            }
            continue;
        }

        let Some(class) = current.as_mut() else {
            continue;
        };
        let indent = *body_indent.get_or_insert(line.indent);

        if let Some(config) = config_indent {
            if line.indent > config {
                if let Some(caps) = p.config_table_name.captures(&line.text) {
                    class.table_name = Some(caps[1].to_string());
                }
                continue;
            }
            config_indent = None;
        }

        if line.indent != indent {
            continue;
        }

        if p.config_class.is_match(&line.text) {
            config_indent = Some(line.indent);
            continue;
        }

        if line.text.starts_with("model_config") {
            if let Some(caps) = p.model_config_table_name.captures(&line.text) {
                class.table_name = Some(caps[1].to_string());
            }
            continue;
        }

        if let Some(field) = parse_field(&line.text) {
            tracing::debug!(class = %class.name, field = %field.name, annotation = %field.annotation, "scanned field");
            class.fields.push(field);
        }
    }

    if let Some(class) = current.take() {
        classes.push(class);
    }
    classes
}

/// Parse `name: annotation [= default]`
fn parse_field(text: &str) -> Option<FieldDeclaration> {
    let p = patterns();

    let colon = find_top_level(text, ':')?;
    let name = text[..colon].trim();
    if !p.identifier.is_match(name) {
        return None;
    }

    let rest = &text[colon + 1..];
    let (annotation, default) = match find_top_level(rest, '=') {
        Some(eq) => (rest[..eq].trim(), Some(rest[eq + 1..].trim())),
        None => (rest.trim(), None),
    };
    if annotation.is_empty() || annotation.starts_with("ClassVar") || annotation.starts_with("typing.ClassVar") {
        return None;
    }

    let mut field = FieldDeclaration::new(name, annotation).with_max_length(capture_max_length(annotation));

    if let Some(default) = default {
        let parsed = parse_default(default);
        field = field.with_default(parsed.default);
        if parsed.max_length.is_some() {
            field = field.with_max_length(parsed.max_length);
        }
        if let Some(description) = parsed.description {
            field = field.with_description(description);
        }
    }

    Some(field)
}

struct ParsedDefault {
    default: FieldDefault,
    max_length: Option<u32>,
    description: Option<String>,
}

fn parse_default(text: &str) -> ParsedDefault {
    let text = text.trim();

    let Some(args) = text
        .strip_prefix("Field(")
        .or_else(|| text.strip_prefix("pydantic.Field("))
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        let default = if text == "..." {
            FieldDefault::Ellipsis
        } else {
            FieldDefault::Value(text.to_string())
        };
        return ParsedDefault {
            default,
            max_length: None,
            description: None,
        };
    };

    let mut parsed = ParsedDefault {
        default: FieldDefault::None,
        max_length: capture_max_length(args),
        description: None,
    };

    for (index, arg) in split_top_level(args, ',').into_iter().enumerate() {
        match find_top_level(arg, '=') {
            None if index == 0 => parsed.default = literal_default(arg),
            None => {}
            Some(eq) => {
                let key = arg[..eq].trim();
                let value = arg[eq + 1..].trim();
                match key {
                    "default" => parsed.default = literal_default(value),
                    "default_factory" => parsed.default = FieldDefault::Factory(value.to_string()),
                    "description" => parsed.description = Some(unquote(value).to_string()),
                    _ => {}
                }
            }
        }
    }

    parsed
}

fn literal_default(value: &str) -> FieldDefault {
    if value == "..." {
        FieldDefault::Ellipsis
    } else {
        FieldDefault::Value(value.to_string())
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn capture_max_length(text: &str) -> Option<u32> {
    patterns()
        .max_length
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Byte offset of the first `target` outside brackets and strings
///
/// `==`, `<=`, `>=` and `!=` never count as `=`.
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            c if c == target && depth == 0 => {
                if target == '=' {
                    let prev = i.checked_sub(1).map(|j| bytes[j]);
                    let next = bytes.get(i + 1).copied();
                    if matches!(prev, Some(b'=' | b'<' | b'>' | b'!')) || next == Some(b'=') {
                        continue;
                    }
                }
                return Some(i);
            }
            _ => {}
        }
    }

    None
}

/// Strip a trailing `#` comment that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn bracket_balance(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    let mut depth = 0;
    let mut docstring: Option<&'static str> = None;

    for raw in source.lines() {
        let trimmed = raw.trim();

        // Docstrings and other triple-quoted blocks
        if let Some(delimiter) = docstring {
            if trimmed.contains(delimiter) {
                docstring = None;
            }
            continue;
        }
        if pending.is_none() {
            if let Some(delimiter) = ["\"\"\"", "'''"].into_iter().find(|d| trimmed.starts_with(d)) {
                if trimmed.matches(delimiter).count() < 2 {
                    docstring = Some(delimiter);
                }
                continue;
            }
        }

        let code = strip_comment(raw).trim_end();
        let code_trimmed = code.trim();
        if code_trimmed.is_empty() && pending.is_none() {
            continue;
        }

        let continued = code_trimmed.ends_with('\\');
        let piece = code_trimmed.trim_end_matches('\\').trim_end();

        match pending.as_mut() {
            Some(line) => {
                line.text.push(' ');
                line.text.push_str(piece);
            }
            None => {
                let indent = raw.len() - raw.trim_start().len();
                pending = Some(LogicalLine {
                    indent,
                    text: piece.to_string(),
                });
            }
        }

        depth += bracket_balance(piece);
        if depth <= 0 && !continued {
            depth = 0;
            if let Some(line) = pending.take() {
                lines.push(line);
            }
        }
    }

    if let Some(line) = pending.take() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODELS: &str = r#"
"""
API models.
"""

from datetime import datetime
from typing import List, Optional
from pydantic import BaseModel, Field, constr


class TimestampedBase(BaseModel):
    """Shared audit columns."""
    created_at: datetime
    updated_at: Optional[datetime] = None


class User(TimestampedBase):
    user_id: str = Field(..., description="Primary key")
    email: constr(max_length=255)
    tags: List[str] = Field(default_factory=list)
    is_active: bool = True  # defaults still count as required

    def display(self) -> str:
        label: str = self.email
        return label


class Order(BaseModel):
    order_id: str
    amount: float = Field(
        0.0,
        description="Order total",
    )
    note: str | None = None

    class Config:
        table_name = "fct_orders"


class Helper:
    name: str


class AdminUser(User):
    email: str = Field(..., max_length=100)
    permissions: dict
"#;

    fn by_name<'a>(models: &'a [ModelDeclaration], name: &str) -> &'a ModelDeclaration {
        models.iter().find(|m| m.name == name).unwrap()
    }

    #[test]
    fn finds_models_in_source_order() {
        let models = scan_source(MODELS, Some("app/models.py"));
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["TimestampedBase", "User", "Order", "AdminUser"]);
        assert_eq!(models[0].source_file.as_deref(), Some("app/models.py"));
    }

    #[test]
    fn inherits_parent_fields() {
        let models = scan_source(MODELS, None);
        let user = by_name(&models, "User");
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["created_at", "updated_at", "user_id", "email", "tags", "is_active"]);

        let admin = by_name(&models, "AdminUser");
        assert_eq!(admin.fields.len(), 7);
        let email = admin.fields.iter().find(|f| f.name == "email").unwrap();
        assert_eq!(email.annotation, "str");
        assert_eq!(email.max_length, Some(100));
    }

    #[test]
    fn field_defaults_and_constraints() {
        let models = scan_source(MODELS, None);
        let user = by_name(&models, "User");

        let field = |name: &str| user.fields.iter().find(|f| f.name == name).unwrap();
        assert_eq!(field("user_id").default, FieldDefault::Ellipsis);
        assert_eq!(field("user_id").description.as_deref(), Some("Primary key"));
        assert_eq!(field("email").default, FieldDefault::None);
        assert_eq!(field("email").max_length, Some(255));
        assert_eq!(field("tags").default, FieldDefault::Factory("list".into()));
        assert_eq!(field("is_active").default, FieldDefault::Value("True".into()));
        assert!(user.fields.iter().all(|f| f.name != "label"));
    }

    #[test]
    fn multiline_field_and_config_table_name() {
        let models = scan_source(MODELS, None);
        let order = by_name(&models, "Order");

        assert_eq!(order.table_name.as_deref(), Some("fct_orders"));
        let amount = order.fields.iter().find(|f| f.name == "amount").unwrap();
        assert_eq!(amount.default, FieldDefault::Value("0.0".into()));
        assert_eq!(amount.description.as_deref(), Some("Order total"));
        assert_eq!(order.fields.len(), 3);
    }

    #[test]
    fn model_config_dict_table_name() {
        let source = "class Event(BaseModel):\n    model_config = ConfigDict(table_name='raw_events')\n    event_id: str\n";
        let models = scan_source(source, None);
        assert_eq!(models[0].table_name.as_deref(), Some("raw_events"));
        assert_eq!(models[0].fields.len(), 1);
    }

    #[test]
    fn parents_across_sources() {
        let mut scanner = PydanticScanner::new();
        scanner.add_source("class Child(ParentModel):\n    extra: int\n", Some("child.py"));
        scanner.add_source("class ParentModel(pydantic.BaseModel):\n    id: str\n", Some("parent.py"));

        let models = scanner.declarations();
        let child = by_name(&models, "Child");
        assert_eq!(child.fields.len(), 2);
        assert_eq!(child.source_file.as_deref(), Some("child.py"));
    }

    #[test]
    fn cyclic_bases_terminate() {
        let source = "class A(B):\n    a: int\n\nclass B(A):\n    b: int\n";
        assert!(scan_source(source, None).is_empty());
    }

    #[test]
    fn top_level_equals() {
        assert_eq!(find_top_level("x: int = 5", '='), Some(7));
        assert_eq!(find_top_level("x: constr(max_length=5)", '='), None);
        assert_eq!(find_top_level("x == 1", '='), None);
        assert_eq!(find_top_level("x: str = 'a=b'", '='), Some(7));
    }
}
