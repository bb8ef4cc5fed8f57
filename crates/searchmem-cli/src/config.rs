use searchmem_azure::AzureSearchConfig;
use searchmem_core::{EmbeddingConfig, EmbeddingProvider};
use serde::Deserialize;
use std::path::Path;

/// Overrides `search.api_key`.
pub const SEARCH_KEY_VAR: &str = "SEARCHMEM_API_KEY";
/// Overrides `embedding.api_key`.
pub const EMBEDDING_KEY_VAR: &str = "OPENAI_API_KEY";

/// Contents of `searchmem.toml`.
#[derive(Debug, Deserialize)]
pub struct SearchMemConfig {
    pub search: AzureSearchConfig,
    #[serde(default = "default_embedding")]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

fn default_embedding() -> EmbeddingConfig {
    EmbeddingConfig {
        provider: EmbeddingProvider::OpenAi,
        model: "text-embedding-3-small".to_string(),
        api_key: String::new(),
        api_base_url: None,
        dimension: 1536,
        timeout_secs: 30,
    }
}

impl SearchMemConfig {
    /// Reads and parses a config file, then applies environment overrides.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_overrides(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Replaces API keys with the values of [`SEARCH_KEY_VAR`] and
    /// [`EMBEDDING_KEY_VAR`] when they are set and non-empty.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(SEARCH_KEY_VAR).filter(|k| !k.is_empty()) {
            self.search.api_key = key;
        }
        if let Some(key) = lookup(EMBEDDING_KEY_VAR).filter(|k| !k.is_empty()) {
            self.embedding.api_key = key;
        }
    }
}
