//! Azure AI Search connector for SearchMem.
//!
//! Implements [`searchmem_core::MemoryDb`] on top of an Azure AI Search
//! service: index names are normalized to what the engine accepts, abstract
//! schemas are compiled to index definitions, tag filters become OData
//! expressions, and engine scores are mapped back to cosine similarity.
//!
//! # Main types
//!
//! - [`AzureSearchMemory`] — The memory store.
//! - [`AzureSearchConfig`] — Endpoint, key and query switches.
//! - [`AzureSchemaCompiler`] — Compiles a [`searchmem_core::MemoryDbSchema`] into an [`IndexDefinition`].
//! - [`ClientRegistry`] — One shared index client per normalized index name.
//! - [`SearchService`] / [`SearchIndexClient`] — The engine seam; [`RestSearchService`] talks REST.

/// Connection settings.
pub mod config;
/// Mapping between records and stored documents.
pub mod document;
/// Engine wire types and client traits.
pub mod engine;
/// Tag filter to OData translation.
pub mod filter;
/// The memory store.
pub mod memory;
/// Index name normalization.
pub mod naming;
/// Cached per-index clients.
pub mod registry;
/// REST implementation of the engine traits.
pub mod rest;
/// Abstract schema compilation.
pub mod schema;
/// Engine score and cosine similarity conversions.
pub mod score;

pub use config::{AzureSearchConfig, SearchBehavior};
pub use document::{memory_record_schema, SearchDocument};
pub use engine::{
    IndexDefinition, IndexDocumentsOptions, IndexingResult, SearchHit, SearchIndexClient,
    SearchPage, SearchRequest, SearchService,
};
pub use filter::translate_filters;
pub use memory::AzureSearchMemory;
pub use naming::normalize_index_name;
pub use registry::ClientRegistry;
pub use rest::{RestIndexClient, RestSearchService};
pub use schema::{AzureSchemaCompiler, IndexSchemaCompiler};
pub use score::{score_to_similarity, similarity_to_score};
