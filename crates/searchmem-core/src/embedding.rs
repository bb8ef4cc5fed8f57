use crate::error::{SearchMemError, SearchMemResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Turns text into a fixed-length embedding vector.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Embeds a single text.
    async fn generate(&self, text: &str) -> SearchMemResult<Vec<f32>>;

    /// Number of dimensions of the vectors this generator produces.
    fn dimension(&self) -> usize;
}

/// Which embedding backend to build from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Any OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAi,
    /// Offline feature hashing, no network needed.
    Hashing,
}

/// Settings for an [`EmbeddingGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Model name sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides `https://api.openai.com`.
    pub api_base_url: Option<String>,
    /// Length of the produced vectors.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Per-request timeout for remote providers.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// API root used by [`OpenAiEmbedding`].
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
    }

    /// Builds the configured generator.
    pub fn build(&self) -> SearchMemResult<Arc<dyn EmbeddingGenerator>> {
        if self.dimension == 0 {
            return Err(SearchMemError::Config(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        match self.provider {
            EmbeddingProvider::OpenAi => {
                if self.api_key.trim().is_empty() {
                    return Err(SearchMemError::Config(
                        "the OpenAI embedding provider requires an api_key".to_string(),
                    ));
                }
                Ok(Arc::new(OpenAiEmbedding::new(self.clone())?))
            }
            EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedding::new(self.dimension))),
        }
    }
}

/// Embeddings from an OpenAI-compatible API.
pub struct OpenAiEmbedding {
    config: EmbeddingConfig,
    http: reqwest::Client,
}

impl OpenAiEmbedding {
    /// Builds the HTTP client with the configured timeout.
    pub fn new(config: EmbeddingConfig) -> SearchMemResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchMemError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl EmbeddingGenerator for OpenAiEmbedding {
    async fn generate(&self, text: &str) -> SearchMemResult<Vec<f32>> {
        let url = format!(
            "{}/v1/embeddings",
            self.config.base_url().trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "dimensions": self.config.dimension,
        });

        debug!(model = %self.config.model, chars = text.len(), "Requesting embedding");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchMemError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SearchMemError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(SearchMemError::Embedding(format!(
                "embedding API error {status}: {resp_body}"
            )));
        }

        parse_embedding_response(&resp_body)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

fn parse_embedding_response(body: &serde_json::Value) -> SearchMemResult<Vec<f32>> {
    let values = body["data"][0]["embedding"].as_array().ok_or_else(|| {
        SearchMemError::Embedding("response has no data[0].embedding array".to_string())
    })?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| SearchMemError::Embedding(format!("non-numeric component: {v}")))
        })
        .collect()
}

/// Deterministic embedding for offline use and tests.
///
/// Words and their character trigrams are hashed into signed buckets
/// (the hashing trick), weighted by `1 + ln(count)`, and the vector is
/// L2-normalized. Trigrams keep inflected forms of a word close together.
pub struct HashingEmbedding {
    dimension: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.4;

impl HashingEmbedding {
    /// A generator producing vectors of `dimension` components (at least 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = feature_hash(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingGenerator for HashingEmbedding {
    async fn generate(&self, text: &str) -> SearchMemResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SearchMemError::Embedding(
                "cannot embed empty text".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            *counts.entry(word).or_default() += 1;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (word, count) in counts {
            let tf = 1.0 + (count as f32).ln();
            self.add_feature(&mut vector, word, tf * WORD_WEIGHT);

            let padded: Vec<char> = format!("^{word}$").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &gram, tf * TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Polynomial string hash finished with the splitmix64 mixer, stable across
/// platforms and releases.
fn feature_hash(feature: &str) -> u64 {
    let mut h = feature
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(u64::from(b)));
    h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    #[tokio::test]
    async fn test_hashing_vector_is_unit_length() {
        let emb = HashingEmbedding::new(48);
        let v = emb.generate("Invoice #4411 is overdue").await.unwrap();
        assert_eq!(v.len(), 48);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_hashing_ranks_related_text_first() {
        let emb = HashingEmbedding::new(512);
        let query = emb.generate("overdue invoice payment reminder").await.unwrap();
        let related = emb.generate("reminder: the invoice payment is overdue").await.unwrap();
        let unrelated = emb.generate("hiking trail around the alpine lake").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hashing_keeps_word_forms_close() {
        let emb = HashingEmbedding::new(512);
        let singular = emb.generate("embedding").await.unwrap();
        let plural = emb.generate("embeddings").await.unwrap();
        let other = emb.generate("tractor").await.unwrap();
        assert!(cosine(&singular, &plural) > 0.3);
        assert!(cosine(&singular, &plural) > cosine(&singular, &other));
    }

    #[tokio::test]
    async fn test_hashing_rejects_blank_text() {
        let emb = HashingEmbedding::default();
        assert!(matches!(
            emb.generate(" \t\n").await,
            Err(SearchMemError::Embedding(_))
        ));
    }

    #[test]
    fn test_feature_hash_is_stable() {
        assert_eq!(feature_hash("ledger"), feature_hash("ledger"));
        assert_ne!(feature_hash("ledger"), feature_hash("legder"));
    }

    fn openai_config(base_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingProvider::OpenAi,
            model: "text-embedding-3-small".to_string(),
            api_key: "sk-test".to_string(),
            api_base_url: Some(base_url),
            dimension: 3,
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_openai_parses_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3], "index": 0 }]
            })))
            .mount(&server)
            .await;

        let emb = openai_config(server.uri()).build().unwrap();
        let v = emb.generate("hello").await.unwrap();
        assert_eq!(v.len(), 3);
        assert!((v[1] - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_openai_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let emb = OpenAiEmbedding::new(openai_config(server.uri())).unwrap();
        let err = emb.generate("hello").await.unwrap_err();
        assert!(matches!(err, SearchMemError::Embedding(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_openai_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": [{ "embedding": [0.5] }] }))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let emb = OpenAiEmbedding::new(openai_config(server.uri())).unwrap();
        let err = emb.generate("hello").await.unwrap_err();
        assert!(matches!(err, SearchMemError::Http(_)));
    }

    #[test]
    fn test_config_requires_api_key_for_openai() {
        let mut config = openai_config("http://localhost".to_string());
        config.api_key.clear();
        assert!(matches!(config.build(), Err(SearchMemError::Config(_))));
    }
}
