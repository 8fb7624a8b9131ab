//! Request and response types for the Ollama `/api/generate` endpoint.
//!
//! The `context` field is the opaque continuation token that lets the
//! server maintain conversation state across iterations of a job. The
//! engine passes it through unmodified and never inspects its contents.

use serde::{Deserialize, Serialize};

/// Request body for `/api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "llama3.1").
    pub model: String,
    /// The composed prompt text.
    pub prompt: String,
    /// Always false: the engine consumes one complete reply per call.
    pub stream: bool,
    /// Opaque continuation token from the previous reply, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, context: Option<Vec<i64>>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            context,
        }
    }
}

/// Response body from `/api/generate` (non-streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The model's free-text reply.
    pub response: String,
    /// Updated continuation token to thread into the next request.
    #[serde(default)]
    pub context: Option<Vec<i64>>,
    /// Whether generation finished.
    #[serde(default)]
    pub done: bool,
}
