use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use searchmem_core::{
    FieldType, MemoryDbField, MemoryDbSchema, MemoryRecord, SearchMemError, SearchMemResult,
    TagCollection, VectorMetric,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key field of every memory index.
pub const ID_FIELD: &str = "id";
/// Vector field of every memory index.
pub const VECTOR_FIELD: &str = "embedding";
/// Flat `key:value` tag collection.
pub const TAGS_FIELD: &str = "tags";
/// JSON-serialized payload map.
pub const PAYLOAD_FIELD: &str = "payload";
/// Separates a tag key from its value inside [`TAGS_FIELD`].
pub const TAG_SEPARATOR: char = ':';

/// The schema used for indexes created through [`MemoryDb::create_index`](searchmem_core::MemoryDb::create_index).
pub fn memory_record_schema(vector_size: usize) -> MemoryDbSchema {
    MemoryDbSchema::new(vec![
        MemoryDbField::key(ID_FIELD),
        MemoryDbField::vector(VECTOR_FIELD, vector_size, VectorMetric::Cosine),
        MemoryDbField::new(TAGS_FIELD, FieldType::ListOfStrings).filterable(),
        MemoryDbField::new(PAYLOAD_FIELD, FieldType::Text),
    ])
}

/// Fields requested by read operations. Vectors are large, so they are only
/// fetched on request.
pub fn select_fields(with_embeddings: bool) -> Vec<String> {
    let mut fields = vec![
        ID_FIELD.to_string(),
        TAGS_FIELD.to_string(),
        PAYLOAD_FIELD.to_string(),
    ];
    if with_embeddings {
        fields.push(VECTOR_FIELD.to_string());
    }
    fields
}

/// A memory record as stored in the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub payload: Option<String>,
}

impl SearchDocument {
    /// Encodes a record. Tag keys may not contain [`TAG_SEPARATOR`].
    pub fn from_record(record: &MemoryRecord) -> SearchMemResult<Self> {
        if record.id.is_empty() {
            return Err(SearchMemError::InvalidArgument(
                "the record id is empty".to_string(),
            ));
        }
        if record.vector.is_empty() {
            return Err(SearchMemError::InvalidArgument(format!(
                "record '{}' has no vector",
                record.id
            )));
        }

        let mut tags = Vec::new();
        for (key, value) in record.tags.pairs() {
            if key.contains(TAG_SEPARATOR) {
                return Err(SearchMemError::InvalidArgument(format!(
                    "tag key '{key}' contains the reserved character '{TAG_SEPARATOR}'"
                )));
            }
            tags.push(format!("{key}{TAG_SEPARATOR}{value}"));
        }

        Ok(Self {
            id: encode_id(&record.id),
            embedding: Some(record.vector.clone()),
            tags,
            payload: Some(serde_json::to_string(&record.payload)?),
        })
    }

    /// Decodes a stored document. The vector is dropped unless `with_embeddings` is set.
    pub fn into_record(self, with_embeddings: bool) -> SearchMemResult<MemoryRecord> {
        let mut tags = TagCollection::new();
        for tag in &self.tags {
            let (key, value) = tag.split_once(TAG_SEPARATOR).ok_or_else(|| {
                SearchMemError::Decode(format!("tag '{tag}' has no '{TAG_SEPARATOR}' separator"))
            })?;
            tags.add(key, value);
        }

        let payload: HashMap<String, String> = match self.payload.as_deref() {
            None | Some("") => HashMap::new(),
            Some(json) => serde_json::from_str(json)?,
        };

        let vector = if with_embeddings {
            self.embedding.unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(MemoryRecord {
            id: decode_id(&self.id)?,
            vector,
            tags,
            payload,
        })
    }
}

/// Engine keys may only contain letters, digits, `_`, `-` and `=`, so ids are
/// stored as URL-safe base64.
pub fn encode_id(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// Reverses [`encode_id`].
pub fn decode_id(encoded: &str) -> SearchMemResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| SearchMemError::Decode(format!("invalid document key '{encoded}': {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| SearchMemError::Decode(format!("document key is not UTF-8: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_ids_use_key_safe_alphabet() {
        for id in ["doc/1", "user+ada@example.com", "ü?~", "a"] {
            let key = encode_id(id);
            assert!(key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '='));
            assert_eq!(decode_id(&key).unwrap(), id);
        }
    }

    #[test]
    fn test_document_shape() {
        let record = MemoryRecord::new("r1", vec![0.5, 0.25])
            .with_tag("user", "ada")
            .with_tag("type", "note")
            .with_payload("text", "hello");
        let doc = SearchDocument::from_record(&record).unwrap();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["id"], encode_id("r1"));
        assert_eq!(json["tags"], serde_json::json!(["type:note", "user:ada"]));
        assert_eq!(json["embedding"], serde_json::json!([0.5, 0.25]));
        let payload: HashMap<String, String> =
            serde_json::from_str(json["payload"].as_str().unwrap()).unwrap();
        assert_eq!(payload["text"], "hello");
    }

    #[test]
    fn test_tag_values_may_contain_separator() {
        let record = MemoryRecord::new("r1", vec![1.0]).with_tag("url", "https://x.y");
        let doc = SearchDocument::from_record(&record).unwrap();
        let back = doc.into_record(false).unwrap();
        assert_eq!(back.tags.get("url").unwrap(), ["https://x.y".to_string()]);
    }

    #[test]
    fn test_tag_key_with_separator_is_rejected() {
        let record = MemoryRecord::new("r1", vec![1.0]).with_tag("a:b", "c");
        assert!(matches!(
            SearchDocument::from_record(&record),
            Err(SearchMemError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_without_vector_is_rejected() {
        let record = MemoryRecord::new("r1", Vec::new()).with_payload("text", "hello");
        assert!(matches!(
            SearchDocument::from_record(&record),
            Err(SearchMemError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_vector_only_decoded_on_request() {
        let record = MemoryRecord::new("r1", vec![0.1, 0.2, 0.3]);
        let doc = SearchDocument::from_record(&record).unwrap();

        assert!(doc.clone().into_record(false).unwrap().vector.is_empty());
        assert_eq!(doc.into_record(true).unwrap().vector, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_missing_optional_fields_decode() {
        let doc: SearchDocument =
            serde_json::from_value(serde_json::json!({ "id": encode_id("x") })).unwrap();
        let record = doc.into_record(true).unwrap();
        assert_eq!(record.id, "x");
        assert!(record.tags.is_empty());
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_select_fields() {
        assert_eq!(select_fields(false), vec!["id", "tags", "payload"]);
        assert_eq!(select_fields(true).last().unwrap(), VECTOR_FIELD);
    }
}
