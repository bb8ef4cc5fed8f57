use reqwest::Url;
use searchmem_core::{SearchMemError, SearchMemResult};
use serde::{Deserialize, Serialize};

/// Connection and query settings for an Azure AI Search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSearchConfig {
    /// Service endpoint, e.g. `https://my-service.search.windows.net`.
    pub endpoint: String,
    /// Admin API key.
    pub api_key: String,
    /// REST API version sent with every request.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Combine lexical and vector scoring. Scores are then returned on the
    /// engine's hybrid scale instead of cosine similarity.
    #[serde(default)]
    pub use_hybrid_search: bool,
    /// Tag each query with a fresh session id so the engine tries to route it
    /// to the same replica.
    #[serde(default)]
    pub use_sticky_sessions: bool,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Query behaviour switches taken from [`AzureSearchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchBehavior {
    /// See [`AzureSearchConfig::use_hybrid_search`].
    pub use_hybrid_search: bool,
    /// See [`AzureSearchConfig::use_sticky_sessions`].
    pub use_sticky_sessions: bool,
}

impl AzureSearchConfig {
    /// Creates a config with default API version and behaviour.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: default_api_version(),
            use_hybrid_search: false,
            use_sticky_sessions: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Checks the settings and returns the parsed endpoint.
    pub fn validate(&self) -> SearchMemResult<Url> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(SearchMemError::Config(
                "the search endpoint is empty".to_string(),
            ));
        }
        let url = Url::parse(endpoint).map_err(|e| {
            SearchMemError::Config(format!("invalid search endpoint '{endpoint}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(SearchMemError::Config(format!(
                "the search endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(SearchMemError::Config(
                "the search API key is empty".to_string(),
            ));
        }
        if self.api_version.trim().is_empty() {
            return Err(SearchMemError::Config(
                "the search API version is empty".to_string(),
            ));
        }
        Ok(url)
    }

    /// The query switches of this config.
    pub fn behavior(&self) -> SearchBehavior {
        SearchBehavior {
            use_hybrid_search: self.use_hybrid_search,
            use_sticky_sessions: self.use_sticky_sessions,
        }
    }
}
