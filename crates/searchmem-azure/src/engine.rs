//! Contracts and wire types of the search engine consumed by the connector.
//!
//! The types serialize to the Azure AI Search REST shapes, so the REST
//! client can send them as-is; other implementations (test fakes, proxies)
//! only need to honour the two traits below.

use crate::document::SearchDocument;
use async_trait::async_trait;
use searchmem_core::SearchMemResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// --- Index definitions ---

/// Engine data type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchFieldDataType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int64")]
    Int64,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    #[serde(rename = "Collection(Edm.String)")]
    StringCollection,
    #[serde(rename = "Collection(Edm.Single)")]
    SingleCollection,
}

/// A field of an engine index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: SearchFieldDataType,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub facetable: bool,
    #[serde(default = "default_true")]
    pub retrievable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

fn default_true() -> bool {
    true
}

/// HNSW graph parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    pub m: u32,
    pub ef_construction: u32,
    pub ef_search: u32,
    pub metric: String,
}

/// A named vector search algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchAlgorithm {
    pub name: String,
    pub kind: String,
    pub hnsw_parameters: HnswParameters,
}

/// Binds vector fields to an algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSearchProfile {
    pub name: String,
    pub algorithm: String,
}

/// Vector search section of an index definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorSearch {
    pub algorithms: Vec<VectorSearchAlgorithm>,
    pub profiles: Vec<VectorSearchProfile>,
}

/// The engine's native index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<SearchField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearch>,
}

impl IndexDefinition {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// --- Queries ---

/// Whether the filter narrows candidates before or after the vector comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorFilterMode {
    PreFilter,
    PostFilter,
}

/// A nearest-neighbour clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub kind: String,
    pub vector: Vec<f32>,
    pub k: usize,
    pub fields: String,
    #[serde(default)]
    pub exhaustive: bool,
}

impl VectorQuery {
    /// Approximate k-NN over `field`.
    pub fn nearest(vector: Vec<f32>, k: usize, field: &str) -> Self {
        Self {
            kind: "vector".to_string(),
            vector,
            k,
            fields: field.to_string(),
            exhaustive: false,
        }
    }
}

/// A search request. Continuation pages are requested with the same type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    /// Lexical query text; set only for hybrid queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Comma-separated list of fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vector_queries: Vec<VectorQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_filter_mode: Option<VectorFilterMode>,
    /// Replica affinity hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SearchRequest {
    /// Fields returned by the engine, as a list.
    pub fn selected_fields(&self) -> Vec<&str> {
        self.select
            .as_deref()
            .map(|s| s.split(',').map(str::trim).collect())
            .unwrap_or_default()
    }
}

/// One result with its native relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "@search.score")]
    pub score: f64,
    #[serde(flatten)]
    pub document: SearchDocument,
}

/// One page of results, best first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub value: Vec<SearchHit>,
    /// Request for the next page, present while more results are available.
    #[serde(
        rename = "@search.nextPageParameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_page_parameters: Option<SearchRequest>,
}

// --- Document writes ---

/// Options for batch document writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexDocumentsOptions {
    /// Fail the whole call when any single document fails.
    pub throw_on_any_error: bool,
}

/// Outcome of one document in a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    pub status: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub status_code: u16,
}

// --- Contracts ---

/// Query and write access to a single index.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// The engine name of the index this client is bound to.
    fn index_name(&self) -> &str;

    /// Merges or uploads documents.
    async fn upload_documents(
        &self,
        documents: Vec<SearchDocument>,
        options: IndexDocumentsOptions,
    ) -> SearchMemResult<Vec<IndexingResult>>;

    /// Deletes documents by key. Missing keys are not an error.
    async fn delete_documents(&self, keys: Vec<String>) -> SearchMemResult<Vec<IndexingResult>>;

    /// Runs a query, or fetches a continuation page.
    async fn search(&self, request: &SearchRequest) -> SearchMemResult<SearchPage>;
}

/// Index management for a search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn list_index_names(&self) -> SearchMemResult<Vec<String>>;

    /// Creates an index; fails with status 409 when it already exists.
    async fn create_index(&self, definition: &IndexDefinition) -> SearchMemResult<()>;

    async fn delete_index(&self, name: &str) -> SearchMemResult<()>;

    /// Builds a client bound to `name`. No network call is made.
    fn index_client(&self, name: &str) -> Arc<dyn SearchIndexClient>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_wire_shape() {
        let request = SearchRequest {
            filter: Some("(tags/any(s: s eq 'a:b'))".to_string()),
            select: Some("id,tags,payload".to_string()),
            top: Some(3),
            vector_queries: vec![VectorQuery::nearest(vec![1.0, 0.0], 3, "embedding")],
            vector_filter_mode: Some(VectorFilterMode::PreFilter),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["vectorFilterMode"], "preFilter");
        assert_eq!(json["vectorQueries"][0]["kind"], "vector");
        assert_eq!(json["vectorQueries"][0]["k"], 3);
        assert_eq!(json["top"], 3);
        assert!(json.get("search").is_none());
        assert!(json.get("sessionId").is_none());
        assert_eq!(request.selected_fields(), vec!["id", "tags", "payload"]);
    }

    #[test]
    fn test_search_page_parses_hits_and_continuation() {
        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "value": [
                { "@search.score": 0.9, "id": "eDE", "tags": ["a:b"], "payload": "{}" }
            ],
            "@odata.nextLink": "https://example/indexes/x/docs/search.post.search?api-version=1",
            "@search.nextPageParameters": { "skip": 50, "top": 50, "select": "id" }
        }))
        .unwrap();

        assert_eq!(page.value.len(), 1);
        assert!((page.value[0].score - 0.9).abs() < 1e-12);
        assert_eq!(page.value[0].document.tags, vec!["a:b"]);
        let next = page.next_page_parameters.unwrap();
        assert_eq!(next.skip, Some(50));
        assert_eq!(next.select.as_deref(), Some("id"));
    }

    #[test]
    fn test_field_data_type_names() {
        assert_eq!(
            serde_json::to_value(SearchFieldDataType::SingleCollection).unwrap(),
            "Collection(Edm.Single)"
        );
        assert_eq!(
            serde_json::to_value(SearchFieldDataType::Int64).unwrap(),
            "Edm.Int64"
        );
    }
}
