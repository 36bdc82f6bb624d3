use thiserror::Error;

#[derive(Debug, Error)]
pub enum VertexError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Artifact error: {0}")]
    ArtifactError(String),
}

impl From<reqwest::Error> for VertexError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key as a query parameter.
        let timed_out = e.is_timeout();
        let message = e.without_url().to_string();
        if timed_out {
            VertexError::Timeout(message)
        } else {
            VertexError::RequestError(message)
        }
    }
}

impl From<serde_json::Error> for VertexError {
    fn from(e: serde_json::Error) -> Self {
        VertexError::SerializationError(e.to_string())
    }
}

impl VertexError {
    /// Transport-level failures that a different key or a later attempt may fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, VertexError::RequestError(_) | VertexError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, VertexError>;
