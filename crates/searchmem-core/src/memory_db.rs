use crate::error::SearchMemResult;
use crate::record::{MemoryFilter, MemoryRecord};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// A record paired with its relevance score.
pub type ScoredRecord = (MemoryRecord, f64);

/// Lazily pulled search results. Dropping the stream stops further engine requests.
pub type RecordStream = BoxStream<'static, SearchMemResult<ScoredRecord>>;

/// Lazily pulled records from a filtered scan.
pub type MemoryRecordStream = BoxStream<'static, SearchMemResult<MemoryRecord>>;

/// Storage-agnostic interface over a vector database.
///
/// Every operation takes an optional cancellation token; cancelling it aborts
/// the in-flight request with [`SearchMemError::Cancelled`](crate::SearchMemError::Cancelled).
#[async_trait]
pub trait MemoryDb: Send + Sync {
    /// Creates the index if it does not exist yet. Calling it twice is harmless.
    async fn create_index(
        &self,
        index: &str,
        vector_size: usize,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<()>;

    /// Names of the indexes currently present in the database.
    async fn get_indexes(&self, cancel: Option<CancellationToken>) -> SearchMemResult<Vec<String>>;

    /// Deletes an index and everything stored in it.
    async fn delete_index(&self, index: &str, cancel: Option<CancellationToken>)
        -> SearchMemResult<()>;

    /// Inserts or replaces a batch of records, all or nothing.
    ///
    /// Returns the written ids in input order, one per record.
    async fn upsert_batch(
        &self,
        index: &str,
        records: Vec<MemoryRecord>,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<Vec<String>>;

    /// Inserts or replaces a single record and returns its id.
    async fn upsert(
        &self,
        index: &str,
        record: MemoryRecord,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<String> {
        let id = record.id.clone();
        self.upsert_batch(index, vec![record], cancel).await?;
        Ok(id)
    }

    /// Streams the records most similar to `text`, best first.
    ///
    /// `limit == 0` means no limit. Records scoring below `min_relevance` are skipped.
    #[allow(clippy::too_many_arguments)]
    fn get_similar_list(
        &self,
        index: &str,
        text: &str,
        filters: &[MemoryFilter],
        min_relevance: f64,
        limit: usize,
        with_embeddings: bool,
        cancel: Option<CancellationToken>,
    ) -> RecordStream;

    /// Streams the records matching `filters`, without any similarity ranking.
    fn get_list(
        &self,
        index: &str,
        filters: &[MemoryFilter],
        limit: usize,
        with_embeddings: bool,
        cancel: Option<CancellationToken>,
    ) -> MemoryRecordStream;

    /// Deletes a record. Deleting a missing record, or from a missing index, is not an error.
    async fn delete(
        &self,
        index: &str,
        record: &MemoryRecord,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<()>;
}
