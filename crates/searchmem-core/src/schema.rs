use crate::error::{SearchMemError, SearchMemResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type of a field in a [`MemoryDbSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    /// Fixed-length float array used for similarity search.
    Vector,
    Text,
    Integer,
    Decimal,
    Bool,
    ListOfStrings,
}

impl FieldType {
    /// Canonical tag used in schema files.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Vector => "vector",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Bool => "bool",
            FieldType::ListOfStrings => "list_of_strings",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SearchMemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_tag(s).as_str() {
            "vector" => Ok(FieldType::Vector),
            "text" | "string" => Ok(FieldType::Text),
            "integer" | "int" => Ok(FieldType::Integer),
            "decimal" | "double" => Ok(FieldType::Decimal),
            "bool" | "boolean" => Ok(FieldType::Bool),
            "listofstrings" => Ok(FieldType::ListOfStrings),
            _ => Err(SearchMemError::UnsupportedFieldType(s.to_string())),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = SearchMemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

/// Distance function declared for a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VectorMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl VectorMetric {
    /// Canonical tag used in schema files.
    pub fn as_str(self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Euclidean => "euclidean",
            VectorMetric::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorMetric {
    type Err = SearchMemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_tag(s).as_str() {
            "cosine" => Ok(VectorMetric::Cosine),
            "euclidean" => Ok(VectorMetric::Euclidean),
            "dotproduct" => Ok(VectorMetric::DotProduct),
            _ => Err(SearchMemError::UnsupportedVectorMetric(s.to_string())),
        }
    }
}

impl TryFrom<String> for VectorMetric {
    type Error = SearchMemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VectorMetric> for String {
    fn from(value: VectorMetric) -> Self {
        value.as_str().to_string()
    }
}

/// Lower-cases a tag and drops `_`, `-` and spaces so that
/// `ListOfStrings`, `list_of_strings` and `list-of-strings` compare equal.
fn fold_tag(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// One field of an abstract index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDbField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub is_filterable: bool,
    /// Number of dimensions, only meaningful for vector fields.
    #[serde(default)]
    pub vector_size: usize,
    /// Distance function, only meaningful for vector fields.
    #[serde(default)]
    pub vector_metric: Option<VectorMetric>,
}

impl MemoryDbField {
    /// A scalar or collection field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_key: false,
            is_filterable: false,
            vector_size: 0,
            vector_metric: None,
        }
    }

    /// The key field; always text.
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::new(name, FieldType::Text)
        }
    }

    /// A vector field.
    pub fn vector(name: impl Into<String>, size: usize, metric: VectorMetric) -> Self {
        Self {
            vector_size: size,
            vector_metric: Some(metric),
            ..Self::new(name, FieldType::Vector)
        }
    }

    /// Marks the field as usable in filters. Chainable.
    pub fn filterable(mut self) -> Self {
        self.is_filterable = true;
        self
    }
}

/// An ordered list of fields describing the documents of one index.
///
/// Schemas are built by callers and consumed when an index is created;
/// stores never persist them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDbSchema {
    pub fields: Vec<MemoryDbField>,
}

impl MemoryDbSchema {
    pub fn new(fields: Vec<MemoryDbField>) -> Self {
        Self { fields }
    }

    /// Checks that the schema has exactly one key field and exactly one vector field.
    pub fn validate(&self) -> SearchMemResult<()> {
        if self.fields.is_empty() {
            return Err(SearchMemError::InvalidSchema(
                "the schema has no fields".to_string(),
            ));
        }

        let keys = self.fields.iter().filter(|f| f.is_key).count();
        if keys != 1 {
            return Err(SearchMemError::InvalidSchema(format!(
                "the schema must have exactly one key field, found {keys}"
            )));
        }

        let vectors = self
            .fields
            .iter()
            .filter(|f| f.field_type == FieldType::Vector)
            .count();
        if vectors != 1 {
            return Err(SearchMemError::InvalidSchema(format!(
                "the schema must have exactly one vector field, found {vectors}"
            )));
        }

        if let Some(key) = self.key_field() {
            if key.field_type == FieldType::Vector {
                return Err(SearchMemError::InvalidSchema(format!(
                    "the key field '{}' cannot be a vector",
                    key.name
                )));
            }
        }

        Ok(())
    }

    /// The field marked as key, if any.
    pub fn key_field(&self) -> Option<&MemoryDbField> {
        self.fields.iter().find(|f| f.is_key)
    }

    /// The vector field, if any.
    pub fn vector_field(&self) -> Option<&MemoryDbField> {
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::Vector)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid_schema() -> MemoryDbSchema {
        MemoryDbSchema::new(vec![
            MemoryDbField::key("id"),
            MemoryDbField::vector("vector", 4, VectorMetric::Cosine),
            MemoryDbField::new("tag", FieldType::ListOfStrings).filterable(),
        ])
    }

    #[test]
    fn test_valid_schema_passes() {
        let schema = valid_schema();
        schema.validate().unwrap();
        assert_eq!(schema.key_field().unwrap().name, "id");
        assert_eq!(schema.vector_field().unwrap().vector_size, 4);
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let mut schema = valid_schema();
        schema.fields[0].is_key = false;
        assert!(matches!(
            schema.validate(),
            Err(SearchMemError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_two_vectors_are_rejected() {
        let mut schema = valid_schema();
        schema
            .fields
            .push(MemoryDbField::vector("other", 4, VectorMetric::Cosine));
        assert!(matches!(
            schema.validate(),
            Err(SearchMemError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_empty_schema_is_rejected() {
        assert!(MemoryDbSchema::default().validate().is_err());
    }

    #[test]
    fn test_field_type_tags() {
        assert_eq!("ListOfStrings".parse::<FieldType>().unwrap(), FieldType::ListOfStrings);
        assert_eq!("list_of_strings".parse::<FieldType>().unwrap(), FieldType::ListOfStrings);
        assert_eq!("Bool".parse::<FieldType>().unwrap(), FieldType::Bool);
        assert!(matches!(
            "blob".parse::<FieldType>(),
            Err(SearchMemError::UnsupportedFieldType(t)) if t == "blob"
        ));
    }

    #[test]
    fn test_vector_metric_tags() {
        assert_eq!("DotProduct".parse::<VectorMetric>().unwrap(), VectorMetric::DotProduct);
        assert!(matches!(
            "manhattan".parse::<VectorMetric>(),
            Err(SearchMemError::UnsupportedVectorMetric(_))
        ));
    }

    #[test]
    fn test_schema_from_json_reports_unknown_type() {
        let json = r#"{"fields":[{"name":"id","type":"geo","is_key":true}]}"#;
        let err = serde_json::from_str::<MemoryDbSchema>(json).unwrap_err();
        assert!(err.to_string().contains("Unsupported field type: geo"));
    }
}
