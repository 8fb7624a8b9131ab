//! Job lifecycle data: one [`ExecutionJob`] per end-to-end attempt to
//! satisfy a task via iterative generation and validation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classify::ErrorKind;
use crate::compiler::CompilationResult;
use crate::config::CrucibleConfig;
use crate::language::Language;

/// Lifecycle state of a job. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// Why a job stopped without success. Orthogonal to [`ErrorKind`], which
/// names why the generated code failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    UserCancelled,
    TotalTimeout,
    PromptSizeExceeded,
    LlmError,
    EmptyLlmResponse,
    ExtractionFailed,
    CompilationFailed,
    InfrastructureErrorPersistent,
    SameErrorThreshold,
    MaxIterationsReached,
    InternalPanic,
    Unknown,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AbortReason::UserCancelled => "user_cancelled",
            AbortReason::TotalTimeout => "total_timeout",
            AbortReason::PromptSizeExceeded => "prompt_size_exceeded",
            AbortReason::LlmError => "llm_error",
            AbortReason::EmptyLlmResponse => "empty_llm_response",
            AbortReason::ExtractionFailed => "extraction_failed",
            AbortReason::CompilationFailed => "compilation_failed",
            AbortReason::InfrastructureErrorPersistent => "infrastructure_error_persistent",
            AbortReason::SameErrorThreshold => "same_error_threshold",
            AbortReason::MaxIterationsReached => "max_iterations_reached",
            AbortReason::InternalPanic => "internal_panic",
            AbortReason::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// The immutable threshold set handed to the controller at construction.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_iterations: u32,
    pub timeout: Duration,
    pub compile_timeout: Duration,
    pub max_prompt_bytes: usize,
    pub same_error_threshold: usize,
    pub feedback_char_budget: usize,
}

impl Limits {
    pub fn from_config(config: &CrucibleConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            timeout: Duration::from_secs(config.timeout_secs),
            compile_timeout: Duration::from_secs(config.compile_timeout_secs),
            max_prompt_bytes: config.max_prompt_bytes,
            same_error_threshold: config.same_error_threshold,
            feedback_char_budget: config.feedback_char_budget,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from_config(&CrucibleConfig::default())
    }
}

/// Shared view of the iteration index a job is currently on. The
/// controller writes it at the top of every pass; status queries read it
/// while the job runs.
#[derive(Debug, Clone, Default)]
pub struct IterationCounter(Arc<AtomicU32>);

impl IterationCounter {
    pub fn set(&self, iteration: u32) {
        self.0.store(iteration, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Conversation state threaded through the model client across iterations.
/// The context token is opaque and never inspected. Grows monotonically,
/// never shared across jobs.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub context: Option<Vec<i64>>,
    pub prompt_history: Vec<String>,
    pub error_history: Vec<ErrorKind>,
    pub last_error_message: String,
}

/// Append-only per-iteration measurements.
#[derive(Debug, Clone, Default)]
pub struct IterationMetrics {
    pub iteration_count: u32,
    pub prompt_sizes: Vec<usize>,
    pub llm_response_times: Vec<Duration>,
    pub last_error_kind: Option<ErrorKind>,
    pub same_error_count: usize,
}

/// One user request being processed. Owned exclusively by the controller
/// for its lifetime; immutable once terminal.
#[derive(Debug)]
pub struct ExecutionJob {
    pub id: Uuid,
    pub language: Language,
    pub task: String,
    pub model: String,
    pub limits: Limits,
    pub cancel: CancellationToken,
    pub live_iteration: IterationCounter,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub conversation: ConversationState,
    pub metrics: IterationMetrics,
    pub final_result: Option<CompilationResult>,
    pub abort_reason: Option<AbortReason>,
}

impl ExecutionJob {
    pub fn new(language: Language, task: String, model: String, limits: Limits) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            task,
            model,
            limits,
            cancel: CancellationToken::new(),
            live_iteration: IterationCounter::default(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            conversation: ConversationState::default(),
            metrics: IterationMetrics::default(),
            final_result: None,
            abort_reason: None,
        }
    }
}
