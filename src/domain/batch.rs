//! Batch results: terminal outcomes for one invocation's fixed set of jobs.

use serde::Serialize;

use crate::domain::job::{FailureReason, JobOutcome};
use crate::domain::prompt::{Category, PromptRequest};

/// Terminal outcomes of one batch run, in input order.
///
/// Invariant: `completed.len() + failed.len()` equals the number of input
/// requests; every request reaches exactly one terminal outcome.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    /// Requests that produced an image, paired with the raw bytes.
    #[serde(skip)]
    pub completed: Vec<(PromptRequest, Vec<u8>)>,
    /// Requests that failed, paired with why.
    pub failed: Vec<(PromptRequest, FailureReason)>,
}

impl BatchResult {
    /// Build a result from per-job outcomes already sorted into input order.
    pub fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        let mut result = BatchResult::default();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed(job) => {
                    result.completed.push((job.request, job.state.image));
                }
                JobOutcome::Failed(job) => {
                    result.failed.push((job.request, job.state.reason));
                }
            }
        }
        result
    }

    /// Total number of terminal outcomes recorded.
    pub fn len(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no request completed at all.
    pub fn all_failed(&self) -> bool {
        self.completed.is_empty() && !self.failed.is_empty()
    }

    /// The (category, index) pairs that did not complete.
    pub fn missing(&self) -> Vec<(Category, usize)> {
        self.failed
            .iter()
            .map(|(request, _)| (request.category, request.index))
            .collect()
    }

    /// Human-readable failure messages, one per failed request.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(request, reason)| {
                format!(
                    "Failed to generate {}: {}",
                    request.archive_path(),
                    reason.to_error_message()
                )
            })
            .collect()
    }
}
