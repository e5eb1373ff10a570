//! Schema description models.
//!
//! A [`SchemaDescription`] is the structural view of one store that gets
//! embedded into the model prompt. It is rebuilt on every request.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Type tag attached to a field descriptor.
///
/// Relational columns keep their declared type as [`TypeTag::Column`] unless
/// array inference re-tags them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    String,
    Int,
    Float,
    Bool,
    Date,
    Null,
    Object,
    ArrayOfString,
    ArrayOfInt,
    ArrayOfMixed,
    EmptyArray,
    InvalidJson,
    Unknown,
    /// Raw relational column type such as `varchar(255)`.
    Column(String),
}

impl TypeTag {
    pub fn as_str(&self) -> Cow<'_, str> {
        let s = match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Null => "null",
            Self::Object => "object",
            Self::ArrayOfString => "array<string>",
            Self::ArrayOfInt => "array<int>",
            Self::ArrayOfMixed => "array<mixed>",
            Self::EmptyArray => "empty_array",
            Self::InvalidJson => "invalid_json",
            Self::Unknown => "unknown",
            Self::Column(raw) => return Cow::Borrowed(raw.as_str()),
        };
        Cow::Borrowed(s)
    }

    /// True for the three `array<...>` tags.
    pub fn is_typed_array(&self) -> bool {
        matches!(
            self,
            Self::ArrayOfString | Self::ArrayOfInt | Self::ArrayOfMixed
        )
    }
}

impl FromStr for TypeTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => Self::String,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "date" => Self::Date,
            "null" => Self::Null,
            "object" => Self::Object,
            "array<string>" => Self::ArrayOfString,
            "array<int>" => Self::ArrayOfInt,
            "array<mixed>" => Self::ArrayOfMixed,
            "empty_array" => Self::EmptyArray,
            "invalid_json" => Self::InvalidJson,
            "unknown" => Self::Unknown,
            other => Self::Column(other.to_string()),
        })
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(tag) = s.parse::<TypeTag>();
        Ok(tag)
    }
}

/// One field (column or document key) of a table or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    pub name: String,
    /// Primary type tag.
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub type_tag: TypeTag,
    /// Every type observed while sampling documents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<String>")]
    pub types: Vec<TypeTag>,
    /// Declared column type, kept when inference replaced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Index key marker, e.g. `PRI`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl FieldDescriptor {
    /// Create a field descriptor with only a name and tag.
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            types: Vec::new(),
            declared_type: None,
            nullable: None,
            key: None,
            default: None,
            extra: None,
        }
    }

    /// Create a descriptor for a relational column from its declared type.
    pub fn column(name: impl Into<String>, declared_type: impl Into<String>, nullable: bool) -> Self {
        let mut field = Self::new(name, TypeTag::Column(declared_type.into()));
        field.nullable = Some(nullable);
        field
    }

    /// Replace the tag with an inferred one, remembering the declared type.
    pub fn with_inferred_type(mut self, tag: TypeTag) -> Self {
        if let TypeTag::Column(raw) = std::mem::replace(&mut self.type_tag, tag) {
            self.declared_type = Some(raw);
        }
        self
    }

    /// Set every observed type; the first one becomes the primary tag.
    pub fn with_observed_types(mut self, types: Vec<TypeTag>) -> Self {
        if let Some(first) = types.first() {
            self.type_tag = first.clone();
        }
        self.types = types;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.key = Some(key);
        }
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        let extra = extra.into();
        if !extra.is_empty() {
            self.extra = Some(extra);
        }
        self
    }

    /// Declared column type, whether or not inference re-tagged the field.
    pub fn declared_type(&self) -> Option<&str> {
        match &self.type_tag {
            TypeTag::Column(raw) => Some(raw),
            _ => self.declared_type.as_deref(),
        }
    }
}

/// Table/collection name to ordered field descriptors.
///
/// Backed by a `BTreeMap` so that serialization order is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SchemaDescription {
    entries: BTreeMap<String, Vec<FieldDescriptor>>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Vec<FieldDescriptor>) {
        self.entries.insert(name.into(), fields);
    }

    pub fn get(&self, name: &str) -> Option<&[FieldDescriptor]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldDescriptor])> {
        self.entries
            .iter()
            .map(|(name, fields)| (name.as_str(), fields.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any table has a field called `field` carrying `tag`.
    pub fn has_field_tagged(&self, field: &str, tag: &TypeTag) -> bool {
        self.entries
            .values()
            .flatten()
            .any(|f| f.name.eq_ignore_ascii_case(field) && &f.type_tag == tag)
    }

    /// Pretty JSON with stable key order.
    pub fn to_pretty_json(&self) -> String {
        // A map of strings to plain structs cannot fail to serialize.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, Vec<FieldDescriptor>)> for SchemaDescription {
    fn from_iter<I: IntoIterator<Item = (String, Vec<FieldDescriptor>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_round_trips_through_strings() {
        for tag in [
            TypeTag::ArrayOfString,
            TypeTag::EmptyArray,
            TypeTag::InvalidJson,
            TypeTag::Column("varchar(64)".to_string()),
        ] {
            let parsed: TypeTag = tag.as_str().parse().unwrap();
            assert_eq!(parsed, tag);
        }
    }

    #[test]
    fn test_type_tag_serializes_as_plain_string() {
        let json = serde_json::to_string(&TypeTag::ArrayOfInt).unwrap();
        assert_eq!(json, "\"array<int>\"");
    }

    #[test]
    fn test_field_descriptor_skips_empty_metadata() {
        let field = FieldDescriptor::new("age", TypeTag::Int);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json, serde_json::json!({"name": "age", "type": "int"}));
    }

    #[test]
    fn test_inferred_type_keeps_declared_type() {
        let field = FieldDescriptor::column("tags", "json", true)
            .with_inferred_type(TypeTag::ArrayOfString);
        assert_eq!(field.type_tag, TypeTag::ArrayOfString);
        assert_eq!(field.declared_type(), Some("json"));
    }

    #[test]
    fn test_serialization_order_is_stable() {
        let mut a = SchemaDescription::new();
        a.insert("zebra", vec![FieldDescriptor::new("id", TypeTag::Int)]);
        a.insert("apple", vec![FieldDescriptor::new("id", TypeTag::Int)]);

        let mut b = SchemaDescription::new();
        b.insert("apple", vec![FieldDescriptor::new("id", TypeTag::Int)]);
        b.insert("zebra", vec![FieldDescriptor::new("id", TypeTag::Int)]);

        assert_eq!(a.to_pretty_json(), b.to_pretty_json());
        assert!(a.to_pretty_json().find("apple") < a.to_pretty_json().find("zebra"));
    }

    #[test]
    fn test_has_field_tagged() {
        let mut schema = SchemaDescription::new();
        schema.insert(
            "courses",
            vec![FieldDescriptor::column("students", "json", true)
                .with_inferred_type(TypeTag::ArrayOfString)],
        );
        assert!(schema.has_field_tagged("students", &TypeTag::ArrayOfString));
        assert!(!schema.has_field_tagged("students", &TypeTag::ArrayOfInt));
        assert!(!schema.has_field_tagged("teachers", &TypeTag::ArrayOfString));
    }
}
