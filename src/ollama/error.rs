//! Error types for the Ollama API client.

use thiserror::Error;

/// Errors that can occur when talking to an Ollama server.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// The server returned a non-success HTTP status.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Underlying network failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
