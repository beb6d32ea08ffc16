//! API-model extraction
//!
//! This crate handles:
//! - The `SchemaProvider` capability any typed model binding implements
//! - Field analysis (required-ness, coarse types) from type annotations
//! - Table-name inference from class names
//! - Declaration documents and Pydantic-style source scanning

pub mod field;
pub mod naming;
pub mod provider;
pub mod pydantic;
pub mod extractor;

pub use field::{FieldDeclaration, FieldDefault, annotation_type, is_required, unwrap_optional};
pub use naming::{infer_table_name, to_snake_case};
pub use provider::{DeclarationDocument, ModelDeclaration, ProvidedField, SchemaProvider};
pub use pydantic::{PydanticScanner, scan_source};
pub use extractor::{ModelExtractor, ModelSourceError, load_declarations};
