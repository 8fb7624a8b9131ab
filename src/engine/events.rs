//! Progress events streamed to whoever is watching a job.
//!
//! Wire shapes mirror the push-message payloads consumed by clients:
//! a `type` discriminator plus a camelCase `data` payload. Events are
//! emitted synchronously in iteration order; a dropped receiver is not a
//! job fault.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::job::AbortReason;

/// One event in a job's progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum JobEvent {
    Iteration(IterationEvent),
    Completion(CompletionEvent),
    Abort(AbortEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationEvent {
    pub iteration: u32,
    /// Phase label, e.g. "compiled".
    pub status: String,
    pub main_code: String,
    pub test_code: String,
    pub compiler_output: String,
    pub compiled_successfully: bool,
    pub error_type: String,
    pub elapsed_seconds: u64,
    pub prompt_size: usize,
    pub llm_response_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    /// "success" — aborted jobs emit [`AbortEvent`] instead.
    pub final_status: String,
    pub total_iterations: u32,
    pub total_time: String,
    pub code: String,
    pub tests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortEvent {
    pub reason: AbortReason,
    pub iteration: u32,
    pub last_error: String,
    pub last_error_type: String,
}

/// Sending half of a job's event stream. Send failures are swallowed: a
/// receiver that went away means nobody is listening, never that the job
/// should stop.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}
