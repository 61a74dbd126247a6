//! Transport-level error types.

use thiserror::Error;

use tokenindex_core::IndexerError;

/// Errors that can occur while talking to the node's REST API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure (refused, reset, DNS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The node answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Circuit breaker is open, the node is considered unhealthy.
    #[error("Circuit breaker open for node: {url}")]
    CircuitOpen { url: String },

    /// Response body could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::CircuitOpen { .. } | Self::Deserialization(_) => false,
        }
    }
}

impl From<TransportError> for IndexerError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout { ms } => IndexerError::Timeout { ms },
            // An open circuit heals on its own; the monitor may retry later.
            TransportError::CircuitOpen { .. } => IndexerError::Rpc(e.to_string()),
            e if e.is_retryable() => IndexerError::Rpc(e.to_string()),
            e => IndexerError::Node(e.to_string()),
        }
    }
}
