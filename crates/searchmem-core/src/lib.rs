//! Core types shared by SearchMem memory stores.
//!
//! This crate holds everything that does not depend on a particular search
//! engine: the record model, abstract index schemas, tag filters, the
//! embedding contract and the [`MemoryDb`] interface implemented by stores.
//!
//! # Main types
//!
//! - [`SearchMemError`] — Unified error enum for stores and embedders.
//! - [`MemoryRecord`] — An id, an embedding, filterable tags and a payload.
//! - [`MemoryFilter`] — A conjunction of tag constraints.
//! - [`MemoryDbSchema`] — Abstract index schema compiled by each engine target.
//! - [`EmbeddingGenerator`] — Trait for turning text into vectors.
//! - [`MemoryDb`] — Trait implemented by vector database connectors.

/// Embedding generator trait and implementations.
pub mod embedding;
/// Error type and result alias.
pub mod error;
/// The storage-agnostic memory interface.
pub mod memory_db;
/// Records, tags and filters.
pub mod record;
/// Abstract index schemas.
pub mod schema;

pub use embedding::{
    EmbeddingConfig, EmbeddingGenerator, EmbeddingProvider, HashingEmbedding, OpenAiEmbedding,
};
pub use error::{SearchMemError, SearchMemResult};
pub use memory_db::{MemoryDb, MemoryRecordStream, RecordStream, ScoredRecord};
pub use record::{MemoryFilter, MemoryRecord, TagCollection, TagConstraint};
pub use schema::{FieldType, MemoryDbField, MemoryDbSchema, VectorMetric};
