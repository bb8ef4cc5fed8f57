use crate::config::AzureSearchConfig;
use crate::document::{SearchDocument, ID_FIELD};
use crate::engine::{
    IndexDefinition, IndexDocumentsOptions, IndexingResult, SearchIndexClient, SearchPage,
    SearchRequest, SearchService,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use searchmem_core::{SearchMemError, SearchMemResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connection details shared by the service and every index client.
#[derive(Debug)]
struct Connection {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    api_version: String,
}

impl Connection {
    /// `{endpoint}/{segments...}?api-version=...`, with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> SearchMemResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| SearchMemError::Config(format!("endpoint '{}' cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
    }
}

/// Sends a request and turns non-2xx answers into [`SearchMemError::Engine`].
async fn send(request: RequestBuilder) -> SearchMemResult<Response> {
    let resp = request
        .send()
        .await
        .map_err(|e| SearchMemError::Http(e.to_string()))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(SearchMemError::engine(status.as_u16(), message))
}

async fn read_json<T: for<'de> Deserialize<'de>>(resp: Response) -> SearchMemResult<T> {
    resp.json::<T>()
        .await
        .map_err(|e| SearchMemError::Http(format!("invalid engine response: {e}")))
}

#[derive(Deserialize)]
struct IndexNameList {
    value: Vec<IndexName>,
}

#[derive(Deserialize)]
struct IndexName {
    name: String,
}

#[derive(Deserialize)]
struct IndexingResponse {
    value: Vec<IndexingResult>,
}

/// Azure AI Search over its REST API.
pub struct RestSearchService {
    conn: Arc<Connection>,
}

impl RestSearchService {
    /// Builds the service from validated settings.
    pub fn new(config: &AzureSearchConfig) -> SearchMemResult<Self> {
        let endpoint = config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchMemError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            conn: Arc::new(Connection {
                http,
                endpoint,
                api_key: config.api_key.clone(),
                api_version: config.api_version.clone(),
            }),
        })
    }
}

#[async_trait]
impl SearchService for RestSearchService {
    async fn list_index_names(&self) -> SearchMemResult<Vec<String>> {
        let mut url = self.conn.url(&["indexes"])?;
        url.query_pairs_mut().append_pair("$select", "name");

        let resp = send(self.conn.request(Method::GET, url)).await?;
        let list: IndexNameList = read_json(resp).await?;
        Ok(list.value.into_iter().map(|i| i.name).collect())
    }

    async fn create_index(&self, definition: &IndexDefinition) -> SearchMemResult<()> {
        let url = self.conn.url(&["indexes"])?;
        debug!(index = %definition.name, fields = definition.fields.len(), "Creating index");
        send(self.conn.request(Method::POST, url).json(definition)).await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> SearchMemResult<()> {
        let url = self.conn.url(&["indexes", name])?;
        send(self.conn.request(Method::DELETE, url)).await?;
        Ok(())
    }

    fn index_client(&self, name: &str) -> Arc<dyn SearchIndexClient> {
        Arc::new(RestIndexClient {
            conn: Arc::clone(&self.conn),
            index: name.to_string(),
        })
    }
}

/// REST client bound to one index.
pub struct RestIndexClient {
    conn: Arc<Connection>,
    index: String,
}

impl RestIndexClient {
    async fn post_batch(&self, actions: Vec<serde_json::Value>) -> SearchMemResult<Vec<IndexingResult>> {
        let url = self.conn.url(&["indexes", &self.index, "docs", "index"])?;
        let body = serde_json::json!({ "value": actions });
        let resp = send(self.conn.request(Method::POST, url).json(&body)).await?;
        let results: IndexingResponse = read_json(resp).await?;
        Ok(results.value)
    }
}

#[async_trait]
impl SearchIndexClient for RestIndexClient {
    fn index_name(&self) -> &str {
        &self.index
    }

    async fn upload_documents(
        &self,
        documents: Vec<SearchDocument>,
        options: IndexDocumentsOptions,
    ) -> SearchMemResult<Vec<IndexingResult>> {
        let mut actions = Vec::with_capacity(documents.len());
        for doc in documents {
            let mut action = serde_json::to_value(doc)?;
            action["@search.action"] = serde_json::json!("upload");
            actions.push(action);
        }

        let results = self.post_batch(actions).await?;
        if options.throw_on_any_error {
            if let Some(failed) = results.iter().find(|r| !r.status) {
                let failures = results.iter().filter(|r| !r.status).count();
                return Err(SearchMemError::engine(
                    failed.status_code,
                    format!(
                        "{failures} of {} documents failed, first key '{}': {}",
                        results.len(),
                        failed.key,
                        failed.error_message.as_deref().unwrap_or("unknown error")
                    ),
                ));
            }
        }
        Ok(results)
    }

    async fn delete_documents(&self, keys: Vec<String>) -> SearchMemResult<Vec<IndexingResult>> {
        let actions = keys
            .into_iter()
            .map(|key| {
                let mut action = serde_json::Map::new();
                action.insert("@search.action".to_string(), "delete".into());
                action.insert(ID_FIELD.to_string(), key.into());
                serde_json::Value::Object(action)
            })
            .collect();
        self.post_batch(actions).await
    }

    async fn search(&self, request: &SearchRequest) -> SearchMemResult<SearchPage> {
        let url = self.conn.url(&["indexes", &self.index, "docs", "search"])?;
        let resp = send(self.conn.request(Method::POST, url).json(request)).await?;
        read_json(resp).await
    }
}
