//! Job registry and supervision.
//!
//! The manager owns no job directly: each submitted job runs on its own
//! task, and a watcher task records the terminal outcome. A panic inside a
//! job task is contained there and surfaces as an aborted job, never as a
//! crashed process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::compiler::ToolchainBackend;
use crate::config::CrucibleConfig;
use crate::error::CrucibleError;
use crate::language::Language;
use crate::ollama::OllamaClient;

use super::controller::JobController;
use super::events::{AbortEvent, EventSink, JobEvent};
use super::job::{AbortReason, ExecutionJob, IterationCounter, JobStatus, Limits};

/// What a caller submits. The optional fields override the configured
/// defaults for this job only, so concurrent jobs can carry different
/// budgets.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub language: Language,
    pub task: String,
    /// Overrides the configured default model when set.
    pub model: Option<String>,
    /// Overrides the configured iteration cap when set.
    pub max_iterations: Option<u32>,
    /// Overrides the configured wall-clock budget when set.
    pub timeout_secs: Option<u64>,
}

/// Handed back on submit: the job id plus the receiving half of its event
/// stream.
pub struct JobSubmission {
    pub id: Uuid,
    pub events: tokio::sync::mpsc::UnboundedReceiver<JobEvent>,
}

/// Point-in-time view of a job. `iteration` and `elapsed_seconds` track a
/// running job live; once terminal they are frozen at the final values.
#[derive(Debug, Clone)]
pub struct JobStatusReport {
    pub id: Uuid,
    pub language: Language,
    pub status: JobStatus,
    pub iteration: u32,
    pub elapsed_seconds: u64,
    pub abort_reason: Option<AbortReason>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct JobState {
    status: JobStatus,
    abort_reason: Option<AbortReason>,
    /// Set by the watcher when the job reaches a terminal state.
    elapsed: Option<Duration>,
}

struct JobEntry {
    language: Language,
    created_at: DateTime<Utc>,
    started: Instant,
    cancel: CancellationToken,
    live_iteration: IterationCounter,
    state: Arc<Mutex<JobState>>,
}

pub struct JobManager {
    config: CrucibleConfig,
    jobs: Mutex<HashMap<Uuid, JobEntry>>,
}

impl JobManager {
    pub fn new(config: CrucibleConfig) -> Self {
        Self {
            config,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Start a job on its own task and return its id and event stream.
    pub fn submit(&self, request: JobRequest) -> JobSubmission {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let limits = effective_limits(&self.config, &request);
        let mut job = ExecutionJob::new(request.language, request.task, model.clone(), limits);
        let id = job.id;
        let started = Instant::now();
        let (sink, events) = EventSink::channel();

        let state = Arc::new(Mutex::new(JobState {
            status: JobStatus::Running,
            abort_reason: None,
            elapsed: None,
        }));
        {
            let mut jobs = self.jobs.lock().unwrap();
            jobs.insert(
                id,
                JobEntry {
                    language: job.language,
                    created_at: job.created_at,
                    started,
                    cancel: job.cancel.clone(),
                    live_iteration: job.live_iteration.clone(),
                    state: state.clone(),
                },
            );
        }

        info!(job = %id, language = %job.language, model, "job submitted");

        let client = OllamaClient::new(self.config.ollama_url.clone());
        let backend = ToolchainBackend::new(
            job.language,
            Duration::from_secs(self.config.compile_timeout_secs),
        );
        let controller = JobController::new(client, backend, sink.clone());
        let live = job.live_iteration.clone();
        let run: JoinHandle<ExecutionJob> = tokio::spawn(async move {
            controller.run(&mut job).await;
            job
        });
        tokio::spawn(watch_job(run, started, state, live, sink));

        JobSubmission { id, events }
    }

    pub fn status(&self, id: Uuid) -> Result<JobStatusReport, CrucibleError> {
        let jobs = self.jobs.lock().unwrap();
        let entry = jobs
            .get(&id)
            .ok_or_else(|| CrucibleError::JobNotFound(id.to_string()))?;
        let state = entry.state.lock().unwrap().clone();
        let elapsed = state.elapsed.unwrap_or_else(|| entry.started.elapsed());
        Ok(JobStatusReport {
            id,
            language: entry.language,
            status: state.status,
            iteration: entry.live_iteration.get(),
            elapsed_seconds: elapsed.as_secs(),
            abort_reason: state.abort_reason,
            created_at: entry.created_at,
        })
    }

    /// Request cancellation. Idempotent; takes effect at the job's next
    /// cancellation point.
    pub fn cancel(&self, id: Uuid) -> Result<(), CrucibleError> {
        let jobs = self.jobs.lock().unwrap();
        let entry = jobs
            .get(&id)
            .ok_or_else(|| CrucibleError::JobNotFound(id.to_string()))?;
        info!(job = %id, "cancellation requested");
        entry.cancel.cancel();
        Ok(())
    }

    /// Drop terminal jobs from the registry, returning how many were
    /// removed. Running jobs are kept; their ids stay queryable.
    pub fn reap_finished(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, entry| {
            let status = entry.state.lock().unwrap().status;
            !matches!(status, JobStatus::Completed | JobStatus::Aborted)
        });
        before - jobs.len()
    }
}

/// The per-job limit set: the config snapshot with the request's overrides
/// applied on top.
fn effective_limits(config: &CrucibleConfig, request: &JobRequest) -> Limits {
    let mut limits = Limits::from_config(config);
    if let Some(max) = request.max_iterations {
        limits.max_iterations = max;
    }
    if let Some(secs) = request.timeout_secs {
        limits.timeout = Duration::from_secs(secs);
    }
    limits
}

/// Record the job's terminal outcome once its task finishes. A panicked
/// task becomes an `internal_panic` abort.
async fn watch_job(
    handle: JoinHandle<ExecutionJob>,
    started: Instant,
    state: Arc<Mutex<JobState>>,
    live: IterationCounter,
    sink: EventSink,
) {
    match handle.await {
        Ok(job) => {
            let mut s = state.lock().unwrap();
            s.status = job.status;
            s.abort_reason = job.abort_reason;
            s.elapsed = Some(started.elapsed());
        }
        Err(err) if err.is_panic() => {
            error!("job task panicked: {err}");
            {
                let mut s = state.lock().unwrap();
                s.status = JobStatus::Aborted;
                s.abort_reason = Some(AbortReason::InternalPanic);
                s.elapsed = Some(started.elapsed());
            }
            sink.send(JobEvent::Abort(AbortEvent {
                reason: AbortReason::InternalPanic,
                iteration: live.get(),
                last_error: "internal error while executing the job".to_string(),
                last_error_type: "unknown".to_string(),
            }));
        }
        // Task cancellation only happens at runtime shutdown.
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wait_for_abort(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> AbortEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event stream closed without an abort");
            if let JobEvent::Abort(abort) = event {
                return abort;
            }
        }
    }

    async fn wait_for_terminal(manager: &JobManager, id: Uuid) -> JobStatusReport {
        for _ in 0..200 {
            let report = manager.status(id).unwrap();
            if matches!(report.status, JobStatus::Completed | JobStatus::Aborted) {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn status_of_unknown_job_is_an_error() {
        let manager = JobManager::new(CrucibleConfig::default());
        let err = manager.status(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CrucibleError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn cancel_of_unknown_job_is_an_error() {
        let manager = JobManager::new(CrucibleConfig::default());
        let err = manager.cancel(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CrucibleError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn model_failure_aborts_the_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let config = CrucibleConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let manager = JobManager::new(config);
        let mut submission = manager.submit(JobRequest {
            language: Language::Go,
            task: "double an integer".into(),
            model: None,
            max_iterations: None,
            timeout_secs: None,
        });

        let abort = wait_for_abort(&mut submission.events).await;
        assert_eq!(abort.reason, AbortReason::LlmError);

        let report = wait_for_terminal(&manager, submission.id).await;
        assert_eq!(report.status, JobStatus::Aborted);
        assert_eq!(report.abort_reason, Some(AbortReason::LlmError));
        assert_eq!(report.iteration, 1);
    }

    #[tokio::test]
    async fn status_reports_live_progress_while_running() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_json(serde_json::json!({ "response": "late" })),
            )
            .mount(&server)
            .await;

        let config = CrucibleConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let manager = JobManager::new(config);
        let submission = manager.submit(JobRequest {
            language: Language::Go,
            task: "double an integer".into(),
            model: None,
            max_iterations: None,
            timeout_secs: None,
        });

        // The job blocks inside iteration 1 on the delayed model call.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let report = manager.status(submission.id).unwrap();
        assert_eq!(report.status, JobStatus::Running);
        assert_eq!(report.iteration, 1);
        assert!(report.elapsed_seconds < 10);

        manager.cancel(submission.id).unwrap();
    }

    #[tokio::test]
    async fn cancel_aborts_a_running_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_json(serde_json::json!({ "response": "late" })),
            )
            .mount(&server)
            .await;

        let config = CrucibleConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let manager = JobManager::new(config);
        let mut submission = manager.submit(JobRequest {
            language: Language::Python,
            task: "reverse a string".into(),
            model: None,
            max_iterations: None,
            timeout_secs: None,
        });

        // Give the job a moment to reach the model call.
        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.cancel(submission.id).unwrap();

        let abort = wait_for_abort(&mut submission.events).await;
        assert_eq!(abort.reason, AbortReason::UserCancelled);

        let report = wait_for_terminal(&manager, submission.id).await;
        assert_eq!(report.abort_reason, Some(AbortReason::UserCancelled));
    }

    #[tokio::test]
    async fn request_timeout_override_aborts_the_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_json(serde_json::json!({ "response": "late" })),
            )
            .mount(&server)
            .await;

        // The config carries the default 300s budget; the request caps it
        // at zero for this job only.
        let config = CrucibleConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let manager = JobManager::new(config);
        let mut submission = manager.submit(JobRequest {
            language: Language::Go,
            task: "double an integer".into(),
            model: None,
            max_iterations: None,
            timeout_secs: Some(0),
        });

        let abort = wait_for_abort(&mut submission.events).await;
        assert_eq!(abort.reason, AbortReason::TotalTimeout);
    }

    #[test]
    fn request_overrides_apply_over_the_config_snapshot() {
        let config = CrucibleConfig::default();
        let request = JobRequest {
            language: Language::Go,
            task: "task".into(),
            model: None,
            max_iterations: Some(3),
            timeout_secs: Some(42),
        };
        let limits = effective_limits(&config, &request);
        assert_eq!(limits.max_iterations, 3);
        assert_eq!(limits.timeout, Duration::from_secs(42));
        // Untouched fields keep the config values.
        assert_eq!(limits.same_error_threshold, config.same_error_threshold);

        let plain = JobRequest {
            max_iterations: None,
            timeout_secs: None,
            ..request
        };
        let defaults = effective_limits(&config, &plain);
        assert_eq!(defaults.max_iterations, config.max_iterations);
        assert_eq!(defaults.timeout, Duration::from_secs(config.timeout_secs));
    }

    #[tokio::test]
    async fn reap_drops_only_terminal_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_json(serde_json::json!({ "response": "late" })),
            )
            .mount(&server)
            .await;

        let config = CrucibleConfig {
            ollama_url: server.uri(),
            ..Default::default()
        };
        let manager = JobManager::new(config);

        let running = manager.submit(JobRequest {
            language: Language::Go,
            task: "double an integer".into(),
            model: None,
            max_iterations: None,
            timeout_secs: None,
        });
        let mut finished = manager.submit(JobRequest {
            language: Language::Go,
            task: "double an integer".into(),
            model: None,
            max_iterations: None,
            timeout_secs: Some(0),
        });

        wait_for_abort(&mut finished.events).await;
        wait_for_terminal(&manager, finished.id).await;

        assert_eq!(manager.reap_finished(), 1);
        assert!(manager.status(finished.id).is_err());
        assert!(manager.status(running.id).is_ok());

        manager.cancel(running.id).unwrap();
    }

    #[tokio::test]
    async fn panicking_job_task_becomes_internal_panic() {
        let (sink, mut rx) = EventSink::channel();
        let state = Arc::new(Mutex::new(JobState {
            status: JobStatus::Running,
            abort_reason: None,
            elapsed: None,
        }));
        let live = IterationCounter::default();
        live.set(2);
        let handle: JoinHandle<ExecutionJob> = tokio::spawn(async { panic!("boom") });

        watch_job(handle, Instant::now(), state.clone(), live, sink).await;

        let s = state.lock().unwrap().clone();
        assert_eq!(s.status, JobStatus::Aborted);
        assert_eq!(s.abort_reason, Some(AbortReason::InternalPanic));
        assert!(s.elapsed.is_some());
        match rx.try_recv().unwrap() {
            JobEvent::Abort(abort) => {
                assert_eq!(abort.reason, AbortReason::InternalPanic);
                assert_eq!(abort.iteration, 2);
            }
            other => panic!("expected abort event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn watcher_records_completed_outcome() {
        let (sink, _rx) = EventSink::channel();
        let state = Arc::new(Mutex::new(JobState {
            status: JobStatus::Running,
            abort_reason: None,
            elapsed: None,
        }));
        let handle: JoinHandle<ExecutionJob> = tokio::spawn(async {
            let mut job = ExecutionJob::new(
                Language::Go,
                "task".into(),
                "llama3.1".into(),
                Limits::default(),
            );
            job.status = JobStatus::Completed;
            job.metrics.iteration_count = 4;
            job
        });

        watch_job(
            handle,
            Instant::now(),
            state.clone(),
            IterationCounter::default(),
            sink,
        )
        .await;

        let s = state.lock().unwrap().clone();
        assert_eq!(s.status, JobStatus::Completed);
        assert!(s.abort_reason.is_none());
        // The terminal elapsed value freezes the status clock.
        assert!(s.elapsed.is_some());
    }
}
