use crate::config::{AzureSearchConfig, SearchBehavior};
use crate::document::{encode_id, memory_record_schema, select_fields, SearchDocument, VECTOR_FIELD};
use crate::engine::{
    IndexDocumentsOptions, SearchIndexClient, SearchRequest, SearchService, VectorFilterMode,
    VectorQuery,
};
use crate::filter::translate_filters;
use crate::naming::normalize_index_name;
use crate::registry::ClientRegistry;
use crate::rest::RestSearchService;
use crate::schema::{AzureSchemaCompiler, IndexSchemaCompiler};
use crate::score::{score_to_similarity, similarity_to_score};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, TryStreamExt};
use searchmem_core::{
    EmbeddingGenerator, MemoryDb, MemoryDbSchema, MemoryFilter, MemoryRecord, MemoryRecordStream,
    RecordStream, ScoredRecord, SearchMemError, SearchMemResult,
};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engines reject vector fields with fewer dimensions.
pub const MIN_VECTOR_SIZE: usize = 2;

/// Neighbour count requested by vector queries without a limit.
pub const UNBOUNDED_NEAREST_NEIGHBORS: usize = 1000;

/// Memory store backed by Azure AI Search.
///
/// Index names are normalized before every engine call (see
/// [`normalize_index_name`]). Searches against an index that does not exist
/// yield nothing, while writes fail with [`SearchMemError::IndexNotFound`].
///
/// When hybrid search is enabled, similarity searches also send the query
/// text and the engine returns a combined lexical and vector score. That
/// score is not cosine similarity: it is returned unchanged and
/// `min_relevance` is compared against it as-is.
pub struct AzureSearchMemory {
    service: Arc<dyn SearchService>,
    clients: ClientRegistry,
    embedder: Arc<dyn EmbeddingGenerator>,
    behavior: SearchBehavior,
}

impl AzureSearchMemory {
    /// Connects to the service described by `config`.
    ///
    /// Fails with [`SearchMemError::Config`] when the settings are invalid or
    /// no embedding generator is given.
    pub fn new(
        config: &AzureSearchConfig,
        embedder: Option<Arc<dyn EmbeddingGenerator>>,
    ) -> SearchMemResult<Self> {
        let embedder = embedder.ok_or_else(|| {
            SearchMemError::Config("an embedding generator is required".to_string())
        })?;
        let service = Arc::new(RestSearchService::new(config)?);
        Ok(Self::with_service(service, embedder, config.behavior()))
    }

    /// Uses an already built engine service.
    pub fn with_service(
        service: Arc<dyn SearchService>,
        embedder: Arc<dyn EmbeddingGenerator>,
        behavior: SearchBehavior,
    ) -> Self {
        Self {
            clients: ClientRegistry::new(Arc::clone(&service)),
            service,
            embedder,
            behavior,
        }
    }

    /// Creates an index from a caller schema unless it already exists.
    ///
    /// The schema is compiled before any network call, so schema errors never
    /// reach the engine.
    pub async fn create_index_with_schema(
        &self,
        index: &str,
        schema: &MemoryDbSchema,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<()> {
        let name = normalize_index_name(index)?;
        let definition = AzureSchemaCompiler.compile(&name, schema)?;

        if self.index_exists(&name, cancel.as_ref()).await? {
            debug!(index = %name, "Index already exists");
            return Ok(());
        }

        match guarded(cancel.as_ref(), self.service.create_index(&definition)).await {
            Ok(()) => {
                info!(index = %name, "Index created");
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                info!(index = %name, "Index was created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn index_exists(&self, name: &str, cancel: Option<&CancellationToken>) -> SearchMemResult<bool> {
        let names = guarded(cancel, self.service.list_index_names()).await?;
        Ok(names.iter().any(|n| n.to_lowercase() == name))
    }

    fn session_id(&self) -> Option<String> {
        self.behavior
            .use_sticky_sessions
            .then(|| Uuid::new_v4().simple().to_string())
    }
}

#[async_trait]
impl MemoryDb for AzureSearchMemory {
    async fn create_index(
        &self,
        index: &str,
        vector_size: usize,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<()> {
        let schema = memory_record_schema(vector_size.max(MIN_VECTOR_SIZE));
        self.create_index_with_schema(index, &schema, cancel).await
    }

    async fn get_indexes(&self, cancel: Option<CancellationToken>) -> SearchMemResult<Vec<String>> {
        guarded(cancel.as_ref(), self.service.list_index_names()).await
    }

    async fn delete_index(&self, index: &str, cancel: Option<CancellationToken>) -> SearchMemResult<()> {
        let name = normalize_index_name(index)?;
        guarded(cancel.as_ref(), self.service.delete_index(&name)).await?;
        info!(index = %name, "Index deleted");
        Ok(())
    }

    async fn upsert_batch(
        &self,
        index: &str,
        records: Vec<MemoryRecord>,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<Vec<String>> {
        let client = self.clients.get_client(index)?;
        let documents = records
            .iter()
            .map(SearchDocument::from_record)
            .collect::<SearchMemResult<Vec<_>>>()?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let options = IndexDocumentsOptions {
            throw_on_any_error: true,
        };
        match guarded(cancel.as_ref(), client.upload_documents(documents, options)).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(SearchMemError::IndexNotFound(client.index_name().to_string()));
            }
            Err(e) => return Err(e),
        }

        debug!(index = %client.index_name(), count = records.len(), "Records upserted");
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    fn get_similar_list(
        &self,
        index: &str,
        text: &str,
        filters: &[MemoryFilter],
        min_relevance: f64,
        limit: usize,
        with_embeddings: bool,
        cancel: Option<CancellationToken>,
    ) -> RecordStream {
        let hybrid = self.behavior.use_hybrid_search;
        let plan = translate_filters(filters).and_then(|filter| {
            let client = self.clients.get_client(index)?;
            Ok(QueryPlan {
                request: SearchRequest {
                    search: hybrid.then(|| text.to_string()),
                    filter,
                    select: Some(select_fields(with_embeddings).join(",")),
                    top: (limit > 0).then_some(limit),
                    vector_filter_mode: Some(VectorFilterMode::PreFilter),
                    session_id: self.session_id(),
                    ..Default::default()
                },
                client,
                min_score: Some(if hybrid {
                    min_relevance
                } else {
                    similarity_to_score(min_relevance)
                }),
                to_similarity: !hybrid,
                limit,
                with_embeddings,
            })
        });

        let query_vector = Embed {
            embedder: Arc::clone(&self.embedder),
            text: text.to_string(),
            k: if limit > 0 { limit } else { UNBOUNDED_NEAREST_NEIGHBORS },
        };

        execute(plan, Some(query_vector), cancel).boxed()
    }

    fn get_list(
        &self,
        index: &str,
        filters: &[MemoryFilter],
        limit: usize,
        with_embeddings: bool,
        cancel: Option<CancellationToken>,
    ) -> MemoryRecordStream {
        let plan = translate_filters(filters).and_then(|filter| {
            let client = self.clients.get_client(index)?;
            Ok(QueryPlan {
                request: SearchRequest {
                    filter,
                    select: Some(select_fields(with_embeddings).join(",")),
                    top: (limit > 0).then_some(limit),
                    session_id: self.session_id(),
                    ..Default::default()
                },
                client,
                min_score: None,
                to_similarity: false,
                limit,
                with_embeddings,
            })
        });

        execute(plan, None, cancel)
            .map_ok(|(record, _)| record)
            .boxed()
    }

    async fn delete(
        &self,
        index: &str,
        record: &MemoryRecord,
        cancel: Option<CancellationToken>,
    ) -> SearchMemResult<()> {
        let client = self.clients.get_client(index)?;
        let results =
            match guarded(cancel.as_ref(), client.delete_documents(vec![encode_id(&record.id)])).await {
                Ok(results) => results,
                Err(e) if e.is_not_found() => {
                    warn!(index = %client.index_name(), "Index not found, nothing to delete");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

        // A 404 item means the key was already gone.
        match results.iter().find(|r| !r.status && r.status_code != 404) {
            Some(failed) => Err(SearchMemError::engine(
                failed.status_code,
                failed
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("delete of '{}' failed", failed.key)),
            )),
            None => Ok(()),
        }
    }
}

/// A query ready to run against one index.
struct QueryPlan {
    client: Arc<dyn SearchIndexClient>,
    request: SearchRequest,
    /// Hits below this engine score are skipped.
    min_score: Option<f64>,
    /// Convert engine scores to cosine similarity before yielding.
    to_similarity: bool,
    /// 0 means unbounded.
    limit: usize,
    with_embeddings: bool,
}

/// Text to embed into the vector clause of a query.
struct Embed {
    embedder: Arc<dyn EmbeddingGenerator>,
    text: String,
    k: usize,
}

/// Runs a query and streams its hits page by page.
///
/// Nothing happens until the stream is polled. The next page is only
/// requested once the current one is consumed and the limit is not reached.
/// A missing index ends the stream without error.
fn execute(
    plan: SearchMemResult<QueryPlan>,
    embed: Option<Embed>,
    cancel: Option<CancellationToken>,
) -> impl Stream<Item = SearchMemResult<ScoredRecord>> + Send + 'static {
    try_stream! {
        let QueryPlan {
            client,
            mut request,
            min_score,
            to_similarity,
            limit,
            with_embeddings,
        } = plan?;

        if let Some(embed) = embed {
            let vector = guarded(cancel.as_ref(), embed.embedder.generate(&embed.text)).await?;
            request.vector_queries = vec![VectorQuery::nearest(vector, embed.k, VECTOR_FIELD)];
        }

        let mut yielded = 0usize;
        let mut next = Some(request);

        'pages: while let Some(request) = next.take() {
            let page = match guarded(cancel.as_ref(), client.search(&request)).await {
                Err(e) if e.is_not_found() => {
                    warn!(index = %client.index_name(), "Index not found, no results");
                    break 'pages;
                }
                other => other?,
            };
            debug!(index = %client.index_name(), hits = page.value.len(), "Fetched result page");

            for hit in page.value {
                if min_score.is_some_and(|min| hit.score < min) {
                    continue;
                }
                let score = if to_similarity {
                    score_to_similarity(hit.score)
                } else {
                    hit.score
                };
                let record = hit.document.into_record(with_embeddings)?;
                yield (record, score);

                yielded += 1;
                if limit > 0 && yielded >= limit {
                    break 'pages;
                }
            }

            next = page.next_page_parameters;
        }
    }
}

/// Awaits `fut` unless `cancel` fires first, in which case the request is
/// dropped and [`SearchMemError::Cancelled`] is returned.
async fn guarded<T, F>(cancel: Option<&CancellationToken>, fut: F) -> SearchMemResult<T>
where
    F: Future<Output = SearchMemResult<T>>,
{
    let Some(token) = cancel else {
        return fut.await;
    };
    if token.is_cancelled() {
        return Err(SearchMemError::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(SearchMemError::Cancelled),
        result = fut => result,
    }
}
