//! The abort policy: a pure decision function over a job's accumulated
//! error history.
//!
//! The controller calls [`evaluate`] after every non-success compile
//! result; the function never touches the job itself, which keeps the
//! continuation rules independently testable.

use crate::classify::ErrorKind;

use super::job::{AbortReason, Limits};

/// What the controller should do after a non-success result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Feed the error back and run another iteration.
    Continue,
    /// Infrastructure failure: re-run the compile once without consuming a
    /// fresh generation. The model cannot fix the environment.
    RetryWithoutGeneration,
    /// Stop the job with the given reason.
    Abort(AbortReason),
}

/// Decide whether the loop continues. `error_history` already includes the
/// current iteration's kind as its last element.
pub fn evaluate(
    error_history: &[ErrorKind],
    iteration: u32,
    limits: &Limits,
    infra_retry_used: bool,
) -> Decision {
    let current = match error_history.last() {
        Some(kind) => *kind,
        None => return Decision::Continue,
    };

    if current == ErrorKind::Infrastructure {
        if infra_retry_used {
            return Decision::Abort(AbortReason::InfrastructureErrorPersistent);
        }
        return Decision::RetryWithoutGeneration;
    }

    if is_stuck(error_history, limits.same_error_threshold) {
        return Decision::Abort(AbortReason::SameErrorThreshold);
    }

    if iteration >= limits.max_iterations {
        return Decision::Abort(AbortReason::MaxIterationsReached);
    }

    Decision::Continue
}

/// True when the most recent `threshold` kinds are identical and not
/// success: the model is not making progress.
fn is_stuck(error_history: &[ErrorKind], threshold: usize) -> bool {
    if error_history.len() < threshold {
        return false;
    }
    let recent = &error_history[error_history.len() - threshold..];
    let first = recent[0];
    first != ErrorKind::Success && recent.iter().all(|kind| *kind == first)
}

/// Length of the trailing run of identical error kinds.
pub fn trailing_same_count(error_history: &[ErrorKind]) -> usize {
    let Some(last) = error_history.last() else {
        return 0;
    };
    error_history
        .iter()
        .rev()
        .take_while(|kind| *kind == last)
        .count()
}
