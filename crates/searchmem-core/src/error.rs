use thiserror::Error;

/// A convenience `Result` alias using [`SearchMemError`].
pub type SearchMemResult<T> = Result<T, SearchMemError>;

/// Errors produced by memory stores, schema compilers and embedding generators.
#[derive(Error, Debug)]
pub enum SearchMemError {
    /// Invalid or missing connection settings, detected at construction time.
    #[error("Config error: {0}")]
    Config(String),

    /// The schema does not have exactly one key field and one vector field.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A field type tag that no compiler knows how to map.
    #[error("Unsupported field type: {0}")]
    UnsupportedFieldType(String),

    /// A vector metric the engine cannot be configured with.
    #[error("Unsupported vector metric: {0}")]
    UnsupportedVectorMetric(String),

    /// A malformed argument, e.g. an empty or overlong index name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A write targeted an index that does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// A failure reported by the search engine, with its original status.
    #[error("Engine error {status}: {message}")]
    Engine {
        /// HTTP-style status code returned by the engine.
        status: u16,
        /// Message returned by the engine.
        message: String,
    },

    /// A failure reported by the embedding provider.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A transport-level HTTP failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A stored document could not be turned back into a record.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchMemError {
    /// Builds an [`SearchMemError::Engine`] error.
    pub fn engine(status: u16, message: impl Into<String>) -> Self {
        Self::Engine {
            status,
            message: message.into(),
        }
    }

    /// True when the engine reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Engine { status: 404, .. } | Self::IndexNotFound(_))
    }

    /// True when the engine rejected a create because the target already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Engine { status: 409, .. })
    }
}
