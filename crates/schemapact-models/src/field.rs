//! Field analysis: required-ness and coarse types from type annotations
//!
//! Annotations are handled in their textual form (`Optional[str]`,
//! `int | None`, `List[Item]`), which is what both declaration documents
//! and the source scanner produce.

use schemapact_core::ColumnType;

/// What a field declares as its default
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldDefault {
    /// No default given
    #[default]
    None,

    /// The explicit "no default" sentinel (`...` / `Field(...)`)
    Ellipsis,

    /// A literal default, as written
    Value(String),

    /// A default factory, by name
    Factory(String),
}

/// A declared field before analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub name: String,

    /// Type annotation as written
    pub annotation: String,

    pub default: FieldDefault,

    pub max_length: Option<u32>,

    pub description: Option<String>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
            default: FieldDefault::None,
            max_length: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the model cannot be constructed without this field
    pub fn is_required(&self) -> bool {
        is_required(&self.annotation, &self.default)
    }

    /// Coarse column type of this field
    pub fn column_type(&self) -> ColumnType {
        annotation_type(&self.annotation)
    }
}

/// Split an annotation into its non-None part and whether None was allowed
///
/// Handles `Optional[X]`, `Union[X, None]` and `X | None` in any order.
pub fn unwrap_optional(annotation: &str) -> (String, bool) {
    let annotation = strip_quotes(annotation.trim());

    if let Some(inner) = subscript_of(annotation, &["Optional", "typing.Optional"]) {
        return (strip_quotes(inner.trim()).to_string(), true);
    }

    if let Some(inner) = subscript_of(annotation, &["Union", "typing.Union"]) {
        return without_none(split_top_level(inner, ','), |rest| format!("Union[{}]", rest.join(", ")));
    }

    let alternatives = split_top_level(annotation, '|');
    if alternatives.len() > 1 {
        return without_none(alternatives, |rest| rest.join(" | "));
    }

    (annotation.to_string(), false)
}

fn without_none(parts: Vec<&str>, rejoin: impl Fn(&[&str]) -> String) -> (String, bool) {
    let rest: Vec<&str> = parts
        .iter()
        .map(|p| strip_quotes(p.trim()))
        .filter(|p| !is_none_type(p))
        .collect();
    let optional = rest.len() < parts.len();

    let inner = match rest.as_slice() {
        [single] => single.to_string(),
        _ => rejoin(&rest),
    };
    (inner, optional)
}

fn is_none_type(part: &str) -> bool {
    matches!(part, "None" | "NoneType" | "type(None)")
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Inner text of `Name[...]` for any of the given names
fn subscript_of<'a>(annotation: &'a str, names: &[&str]) -> Option<&'a str> {
    let open = annotation.find('[')?;
    if !annotation.ends_with(']') || !names.contains(&annotation[..open].trim()) {
        return None;
    }
    Some(&annotation[open + 1..annotation.len() - 1])
}

/// Split on `sep` outside brackets and parentheses
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        match ch {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Required-ness, first rule that applies wins:
/// optional annotation → false, ellipsis default → true,
/// default factory → false, anything else → true
pub fn is_required(annotation: &str, default: &FieldDefault) -> bool {
    let (_, optional) = unwrap_optional(annotation);
    if optional {
        return false;
    }

    match default {
        FieldDefault::Ellipsis => true,
        FieldDefault::Factory(_) => false,
        FieldDefault::None | FieldDefault::Value(_) => true,
    }
}

/// Coarse column type of an annotation
///
/// Optional wrappers are removed first, then the lowercase text is matched
/// by substring in a fixed order, so `List[str]` maps to varchar and
/// `Dict[str, int]` does too.
pub fn annotation_type(annotation: &str) -> ColumnType {
    let (inner, _) = unwrap_optional(annotation);
    let lower = inner.to_lowercase();

    if lower.contains("str") {
        ColumnType::Varchar
    } else if lower.contains("int") {
        ColumnType::Integer
    } else if lower.contains("float") {
        ColumnType::Float
    } else if lower.contains("bool") {
        ColumnType::Boolean
    } else if lower.contains("datetime") {
        ColumnType::Timestamp
    } else if lower.contains("date") {
        ColumnType::Date
    } else if lower.contains("dict") || lower.contains("json") {
        ColumnType::Json
    } else if lower.contains("list") {
        ColumnType::Json
    } else {
        ColumnType::Varchar
    }
}
