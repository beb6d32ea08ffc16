//! Schema provider capability and declared models
//!
//! The diff engine never sees a model framework. Anything that can list
//! its fields as `{name, type, required}` implements [`SchemaProvider`];
//! [`ModelDeclaration`] is the binding for textual model definitions
//! (declaration documents and scanned Pydantic source).

use crate::field::{FieldDeclaration, FieldDefault};
use schemapact_core::ColumnType;
use serde::{Deserialize, Deserializer, Serialize};

/// One field as a provider reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedField {
    pub name: String,
    pub type_tag: ColumnType,
    pub required: bool,
    pub max_length: Option<u32>,
    pub description: String,
}

/// A typed data model that can describe its own fields
pub trait SchemaProvider {
    /// Class name of the model
    fn model_name(&self) -> &str;

    /// Table name set explicitly on the model, bypassing inference
    fn explicit_table_name(&self) -> Option<&str> {
        None
    }

    /// File the model was declared in
    fn source_file(&self) -> Option<&str> {
        None
    }

    /// Declared fields in declaration order
    fn provide_fields(&self) -> Vec<ProvidedField>;
}

/// A model declared as data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDeclaration {
    pub name: String,
    pub table_name: Option<String>,
    pub fields: Vec<FieldDeclaration>,
    pub source_file: Option<String>,
}

impl ModelDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
            source_file: None,
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }
}

impl SchemaProvider for ModelDeclaration {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn explicit_table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    fn provide_fields(&self) -> Vec<ProvidedField> {
        self.fields
            .iter()
            .map(|field| ProvidedField {
                name: field.name.clone(),
                type_tag: field.column_type(),
                required: field.is_required(),
                max_length: field.max_length,
                description: field.description.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Declaration document: `{models: [{name, table_name?, fields: [...]}]}`
///
/// ```yaml
/// models:
///   - name: UserProfile
///     fields:
///       - { name: user_id, type: str }
///       - { name: bio, type: "Optional[str]" }
///       - { name: tags, type: "List[str]", default_factory: list }
///       - { name: email, type: str, default: "...", max_length: 255 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarationDocument {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub annotation: String,

    /// Literal default; the string `...` is the no-default sentinel and an
    /// explicit null is a `None` default
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_factory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Distinguish an explicit `null` from an absent key
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl FieldEntry {
    fn field_default(&self) -> FieldDefault {
        match (&self.default, &self.default_factory) {
            (Some(serde_json::Value::String(s)), _) if s == "..." => FieldDefault::Ellipsis,
            (Some(serde_json::Value::Null), _) => FieldDefault::Value("None".to_string()),
            (Some(value), _) => FieldDefault::Value(value.to_string()),
            (None, Some(factory)) => FieldDefault::Factory(factory.clone()),
            (None, None) => FieldDefault::None,
        }
    }
}

impl DeclarationDocument {
    /// Convert entries into declarations attributed to `source_file`
    pub fn into_declarations(self, source_file: Option<&str>) -> Vec<ModelDeclaration> {
        self.models
            .into_iter()
            .map(|entry| {
                let fields = entry
                    .fields
                    .iter()
                    .map(|f| {
                        let mut field = FieldDeclaration::new(&f.name, &f.annotation)
                            .with_default(f.field_default())
                            .with_max_length(f.max_length);
                        if let Some(description) = &f.description {
                            field = field.with_description(description);
                        }
                        field
                    })
                    .collect();

                ModelDeclaration {
                    name: entry.name,
                    table_name: entry.table_name,
                    fields,
                    source_file: source_file.map(str::to_string),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
models:
  - name: UserProfile
    fields:
      - { name: user_id, type: str }
      - { name: bio, type: "Optional[str]" }
      - { name: tags, type: "List[str]", default_factory: list }
      - { name: email, type: str, default: "...", max_length: 255 }
      - { name: nickname, type: str, default: null }
  - name: Event
    table_name: raw_events
    fields: []
"#;

    #[test]
    fn document_defaults() {
        let doc: DeclarationDocument = serde_yaml::from_str(DOC).unwrap();
        let models = doc.into_declarations(Some("models.yml"));
        assert_eq!(models.len(), 2);

        let profile = &models[0];
        assert_eq!(profile.source_file.as_deref(), Some("models.yml"));
        assert_eq!(profile.fields[0].default, FieldDefault::None);
        assert_eq!(profile.fields[2].default, FieldDefault::Factory("list".into()));
        assert_eq!(profile.fields[3].default, FieldDefault::Ellipsis);
        assert_eq!(profile.fields[3].max_length, Some(255));
        assert_eq!(profile.fields[4].default, FieldDefault::Value("None".into()));

        assert_eq!(models[1].explicit_table_name(), Some("raw_events"));
    }

    #[test]
    fn provided_fields() {
        let doc: DeclarationDocument = serde_yaml::from_str(DOC).unwrap();
        let profile = &doc.into_declarations(None)[0];

        let fields = profile.provide_fields();
        let summary: Vec<(&str, ColumnType, bool)> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.type_tag, f.required))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("user_id", ColumnType::Varchar, true),
                ("bio", ColumnType::Varchar, false),
                ("tags", ColumnType::Varchar, false),
                ("email", ColumnType::Varchar, true),
                ("nickname", ColumnType::Varchar, true),
            ]
        );
    }
}
