//! Array-type inference for text and JSON columns.
//!
//! Relational stores often keep lists in `json` or text columns. Sampling a
//! few values lets the prompt tell the model that `courses.students` holds
//! `array<string>` instead of an opaque `longtext`.

use crate::models::{FieldDescriptor, TypeTag};
use serde_json::Value as JsonValue;

/// Number of rows sampled per column when none is configured.
pub const DEFAULT_ARRAY_SAMPLE_ROWS: u32 = 20;

/// Coarse element class used when tagging array contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    String,
    Int,
    Other,
}

impl ElementKind {
    pub fn of_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(_) => Self::String,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Self::Int,
            _ => Self::Other,
        }
    }
}

/// Tag a sequence of array elements. Returns `EmptyArray` when there are none.
pub fn tag_elements<I>(elements: I) -> TypeTag
where
    I: IntoIterator<Item = ElementKind>,
{
    let mut seen: Option<ElementKind> = None;
    for kind in elements {
        match seen {
            None => seen = Some(kind),
            Some(prev) if prev == kind => {}
            Some(_) => return TypeTag::ArrayOfMixed,
        }
    }
    match seen {
        None => TypeTag::EmptyArray,
        Some(ElementKind::String) => TypeTag::ArrayOfString,
        Some(ElementKind::Int) => TypeTag::ArrayOfInt,
        Some(ElementKind::Other) => TypeTag::ArrayOfMixed,
    }
}

/// Infer the array tag of a column from sampled textual values.
///
/// Any value that is not a JSON array makes the column `invalid_json`. No
/// values, or only empty arrays, give `empty_array`.
pub fn infer_array_type<S: AsRef<str>>(values: &[S]) -> TypeTag {
    let mut elements = Vec::new();
    for value in values {
        match serde_json::from_str::<JsonValue>(value.as_ref()) {
            Ok(JsonValue::Array(items)) => {
                elements.extend(items.iter().map(ElementKind::of_json));
            }
            _ => return TypeTag::InvalidJson,
        }
    }
    tag_elements(elements)
}

/// Tag a single JSON value found in a sampled document.
pub fn json_value_tag(value: &JsonValue) -> TypeTag {
    match value {
        JsonValue::Null => TypeTag::Null,
        JsonValue::Bool(_) => TypeTag::Bool,
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => TypeTag::Int,
        JsonValue::Number(_) => TypeTag::Float,
        JsonValue::String(_) => TypeTag::String,
        JsonValue::Array(items) => tag_elements(items.iter().map(ElementKind::of_json)),
        JsonValue::Object(_) => TypeTag::Object,
    }
}

/// How a declared column type takes part in inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceTarget {
    /// `json`/`jsonb`: the inferred tag always replaces the declared type.
    Json,
    /// Text family: only a typed array tag replaces the declared type.
    Text,
}

/// Decide whether a column with this declared type should be sampled.
pub fn inference_target(declared_type: &str) -> Option<InferenceTarget> {
    let lower = declared_type.trim().to_ascii_lowercase();
    if lower == "json" || lower == "jsonb" {
        return Some(InferenceTarget::Json);
    }
    if lower.contains("text")
        || lower.starts_with("varchar")
        || lower.starts_with("character varying")
        || lower.starts_with("nvarchar")
    {
        return Some(InferenceTarget::Text);
    }
    None
}

/// Apply an inferred tag to a column descriptor according to its target.
pub fn apply_inferred(
    field: FieldDescriptor,
    target: InferenceTarget,
    inferred: TypeTag,
) -> FieldDescriptor {
    match target {
        InferenceTarget::Json => field.with_inferred_type(inferred),
        InferenceTarget::Text if inferred.is_typed_array() => field.with_inferred_type(inferred),
        InferenceTarget::Text => field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_arrays() {
        assert_eq!(
            infer_array_type(&[r#"["a","b"]"#, r#"["c"]"#]),
            TypeTag::ArrayOfString
        );
    }

    #[test]
    fn test_int_arrays() {
        assert_eq!(infer_array_type(&["[1,2]", "[3]"]), TypeTag::ArrayOfInt);
    }

    #[test]
    fn test_mixed_arrays() {
        assert_eq!(infer_array_type(&["[1,\"a\"]"]), TypeTag::ArrayOfMixed);
        assert_eq!(infer_array_type(&["[1]", "[\"a\"]"]), TypeTag::ArrayOfMixed);
        assert_eq!(infer_array_type(&["[1.5, 2.5]"]), TypeTag::ArrayOfMixed);
    }

    #[test]
    fn test_one_unparsable_value_is_invalid_json() {
        assert_eq!(
            infer_array_type(&[r#"["a"]"#, "not json"]),
            TypeTag::InvalidJson
        );
        // Valid JSON that is not an array counts as invalid too
        assert_eq!(infer_array_type(&[r#"{"a": 1}"#]), TypeTag::InvalidJson);
    }

    #[test]
    fn test_zero_rows_is_empty_array() {
        let none: [&str; 0] = [];
        assert_eq!(infer_array_type(&none), TypeTag::EmptyArray);
        assert_eq!(infer_array_type(&["[]", "[]"]), TypeTag::EmptyArray);
    }

    #[test]
    fn test_json_value_tag() {
        assert_eq!(json_value_tag(&json!(3)), TypeTag::Int);
        assert_eq!(json_value_tag(&json!(3.5)), TypeTag::Float);
        assert_eq!(json_value_tag(&json!(["x", "y"])), TypeTag::ArrayOfString);
        assert_eq!(json_value_tag(&json!([])), TypeTag::EmptyArray);
        assert_eq!(json_value_tag(&json!({"k": 1})), TypeTag::Object);
        assert_eq!(json_value_tag(&json!(null)), TypeTag::Null);
    }

    #[test]
    fn test_inference_target() {
        assert_eq!(inference_target("json"), Some(InferenceTarget::Json));
        assert_eq!(inference_target("JSONB"), Some(InferenceTarget::Json));
        assert_eq!(inference_target("longtext"), Some(InferenceTarget::Text));
        assert_eq!(inference_target("varchar(255)"), Some(InferenceTarget::Text));
        assert_eq!(inference_target("int(11)"), None);
        assert_eq!(inference_target("datetime"), None);
    }

    #[test]
    fn test_text_column_not_retagged_invalid_json() {
        let field = FieldDescriptor::column("bio", "text", true);
        let field = apply_inferred(field, InferenceTarget::Text, TypeTag::InvalidJson);
        assert_eq!(field.type_tag, TypeTag::Column("text".to_string()));

        let field = FieldDescriptor::column("tags", "text", true);
        let field = apply_inferred(field, InferenceTarget::Text, TypeTag::ArrayOfString);
        assert_eq!(field.type_tag, TypeTag::ArrayOfString);
    }

    #[test]
    fn test_json_column_takes_any_inferred_tag() {
        let field = FieldDescriptor::column("meta", "json", true);
        let field = apply_inferred(field, InferenceTarget::Json, TypeTag::InvalidJson);
        assert_eq!(field.type_tag, TypeTag::InvalidJson);
        assert_eq!(field.declared_type(), Some("json"));
    }
}
