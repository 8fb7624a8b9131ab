//! The execution engine: job state, the iteration controller, the abort
//! policy, prompt composition, progress events and the job registry.

pub mod controller;
pub mod events;
pub mod job;
pub mod manager;
pub mod policy;
pub mod prompt;

pub use controller::JobController;
pub use events::{AbortEvent, CompletionEvent, EventSink, IterationEvent, JobEvent};
pub use job::{AbortReason, ExecutionJob, JobStatus, Limits};
pub use manager::{JobManager, JobRequest, JobStatusReport, JobSubmission};
