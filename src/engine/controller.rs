//! The iteration engine: drives one job through its
//! generate → extract → compile → classify loop, with every safeguard from
//! the abort policy applied in priority order.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::classify::ErrorKind;
use crate::compiler::CompileBackend;
use crate::extract::Extractor;
use crate::ollama::{GenerateRequest, ModelClient};

use super::events::{AbortEvent, CompletionEvent, EventSink, IterationEvent, JobEvent};
use super::job::{AbortReason, ExecutionJob, JobStatus};
use super::policy::{self, Decision};
use super::prompt::PromptBuilder;

/// Owns one job's execution. Generic over the model client and compile
/// backend so tests can script both seams.
pub struct JobController<M, B> {
    model: M,
    backend: B,
    sink: EventSink,
}

impl<M: ModelClient, B: CompileBackend> JobController<M, B> {
    pub fn new(model: M, backend: B, sink: EventSink) -> Self {
        Self {
            model,
            backend,
            sink,
        }
    }

    /// Run the job to a terminal state. The job is mutated in place and is
    /// immutable once `status` is `Completed` or `Aborted`.
    pub async fn run(&self, job: &mut ExecutionJob) {
        job.status = JobStatus::Running;
        let start = Instant::now();
        let limits = job.limits.clone();
        let cancel = job.cancel.clone();
        let profile = job.language.profile();
        let extractor = Extractor::new();
        let prompts = PromptBuilder::new(limits.feedback_char_budget);
        let mut infra_retry_used = false;

        for iteration in 1..=limits.max_iterations {
            if cancel.is_cancelled() {
                self.abort(job, AbortReason::UserCancelled, "user cancelled execution");
                return;
            }
            if start.elapsed() > limits.timeout {
                self.abort(job, AbortReason::TotalTimeout, "total timeout exceeded");
                return;
            }

            job.metrics.iteration_count = iteration;
            job.live_iteration.set(iteration);
            info!(job = %job.id, iteration, max = limits.max_iterations, "iteration started");

            // Phase 1: generate.
            let last_error = job
                .metrics
                .last_error_kind
                .map(|kind| (kind, job.conversation.last_error_message.as_str()));
            let (prompt, prompt_size) =
                prompts.build(&job.task, job.language, iteration, last_error);

            if prompt_size > limits.max_prompt_bytes {
                self.abort(
                    job,
                    AbortReason::PromptSizeExceeded,
                    format!(
                        "prompt size exceeded: {prompt_size} > {} bytes",
                        limits.max_prompt_bytes
                    ),
                );
                return;
            }
            job.metrics.prompt_sizes.push(prompt_size);

            let req = GenerateRequest::new(
                job.model.clone(),
                prompt.clone(),
                job.conversation.context.clone(),
            );
            let remaining = limits.timeout.saturating_sub(start.elapsed());
            let llm_start = Instant::now();
            let reply = tokio::select! {
                _ = cancel.cancelled() => {
                    self.abort(job, AbortReason::UserCancelled, "user cancelled during model call");
                    return;
                }
                _ = tokio::time::sleep(remaining) => {
                    self.abort(job, AbortReason::TotalTimeout, "total timeout exceeded during model call");
                    return;
                }
                result = self.model.generate(&req) => result,
            };
            job.metrics.llm_response_times.push(llm_start.elapsed());

            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    self.abort(job, AbortReason::LlmError, format!("model call failed: {err}"));
                    return;
                }
            };
            if reply.response.is_empty() {
                self.abort(
                    job,
                    AbortReason::EmptyLlmResponse,
                    "model returned an empty response",
                );
                return;
            }
            job.conversation.context = reply.context;
            job.conversation.prompt_history.push(prompt);

            // Phase 2: extract.
            let extraction = extractor.extract(&reply.response, &profile);
            debug!(job = %job.id, strategy = extraction.strategy, "code extracted");
            if extraction.main_code.is_empty() {
                self.abort(
                    job,
                    AbortReason::ExtractionFailed,
                    "no usable code recovered from model response",
                );
                return;
            }

            // Phases 3-5: compile, classify, decide. The inner loop exists
            // for the infrastructure retry, which re-runs the compile with
            // the same code instead of consuming a fresh generation.
            loop {
                let attempt_cancel = cancel.child_token();
                let result = match self
                    .backend
                    .compile(&attempt_cancel, &extraction.main_code, &extraction.test_code)
                    .await
                {
                    Ok(result) => result,
                    Err(err) => {
                        self.abort(
                            job,
                            AbortReason::CompilationFailed,
                            format!("compile backend failed: {err}"),
                        );
                        return;
                    }
                };

                self.sink.send(JobEvent::Iteration(IterationEvent {
                    iteration,
                    status: "compiled".to_string(),
                    main_code: extraction.main_code.clone(),
                    test_code: extraction.test_code.clone(),
                    compiler_output: result.output.clone(),
                    compiled_successfully: result.success,
                    error_type: result.error_kind.to_string(),
                    elapsed_seconds: start.elapsed().as_secs(),
                    prompt_size,
                    llm_response_time: job
                        .metrics
                        .llm_response_times
                        .last()
                        .map(|d| d.as_millis() as u64)
                        .unwrap_or(0),
                }));

                if result.success {
                    info!(job = %job.id, iteration, "submission passed");
                    job.final_result = Some(result);
                    job.status = JobStatus::Completed;
                    self.sink.send(JobEvent::Completion(CompletionEvent {
                        final_status: "success".to_string(),
                        total_iterations: iteration,
                        total_time: format!("{:.1}s", start.elapsed().as_secs_f64()),
                        code: extraction.main_code.clone(),
                        tests: extraction.test_code.clone(),
                    }));
                    return;
                }

                job.conversation.error_history.push(result.error_kind);
                job.metrics.last_error_kind = Some(result.error_kind);
                job.metrics.same_error_count =
                    policy::trailing_same_count(&job.conversation.error_history);
                if result.error_kind != ErrorKind::Infrastructure {
                    // Infrastructure noise is never fed back to the model.
                    job.conversation.last_error_message = result.feedback_message();
                }

                match policy::evaluate(
                    &job.conversation.error_history,
                    iteration,
                    &limits,
                    infra_retry_used,
                ) {
                    Decision::Continue => break,
                    Decision::RetryWithoutGeneration => {
                        warn!(job = %job.id, iteration, "infrastructure error, retrying compile without new generation");
                        infra_retry_used = true;
                    }
                    Decision::Abort(reason) => {
                        let message = abort_message(reason, &limits, result.error_kind);
                        if reason == AbortReason::MaxIterationsReached {
                            // The cap abort keeps the last result around.
                            job.final_result = Some(result);
                        }
                        self.abort(job, reason, message);
                        return;
                    }
                }
            }
        }

        // The policy aborts at the iteration cap, so the loop cannot fall
        // through while running; keep a terminal state anyway.
        if job.status == JobStatus::Running {
            self.abort(job, AbortReason::Unknown, "loop ended without a terminal decision");
        }
    }

    fn abort(&self, job: &mut ExecutionJob, reason: AbortReason, message: impl Into<String>) {
        let message = message.into();
        warn!(job = %job.id, %reason, message, "job aborted");
        job.status = JobStatus::Aborted;
        job.abort_reason = Some(reason);
        let last_error_type = job
            .conversation
            .error_history
            .last()
            .copied()
            .unwrap_or(ErrorKind::Unknown);
        self.sink.send(JobEvent::Abort(AbortEvent {
            reason,
            iteration: job.metrics.iteration_count,
            last_error: message,
            last_error_type: last_error_type.to_string(),
        }));
    }
}

fn abort_message(
    reason: AbortReason,
    limits: &crate::engine::job::Limits,
    kind: ErrorKind,
) -> String {
    match reason {
        AbortReason::SameErrorThreshold => format!(
            "model stuck with the same {kind} error after {} attempts",
            limits.same_error_threshold
        ),
        AbortReason::MaxIterationsReached => {
            format!("max iterations ({}) reached", limits.max_iterations)
        }
        AbortReason::InfrastructureErrorPersistent => {
            "persistent infrastructure error".to_string()
        }
        other => other.to_string(),
    }
}
