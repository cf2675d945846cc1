//! State transitions for inference jobs using the typestate pattern.
//!
//! Transitions record facts observed from the server; the poll loop in
//! [`crate::client`] decides when each fact has been observed.
//!
//! ```text
//! Job<Pending> ──queued(id)──> Job<Queued> ──acknowledged()──> Job<Running>
//!      │                           │                                │
//!      │                           └──failed(reason)──┐             ├──completed(bytes)──> Job<Completed>
//!      └──rejected(msg)──> Job<Failed> <──────────────┴─────────────┴──failed(reason)────> Job<Failed>
//! ```
//!
//! Every job reaches exactly one terminal state; there is no retry
//! transition; retry policy belongs to the caller, not the job.

use chrono::Utc;

use super::state::{
    Completed, Failed, FailureReason, Job, JobId, JobOutcome, Pending, Queued, Running,
};
use crate::domain::prompt::PromptRequest;

impl Job<Pending> {
    /// Create a new unsubmitted job for a request.
    pub fn new(request: PromptRequest) -> Self {
        Job {
            state: Pending {},
            request,
        }
    }

    /// The server accepted the job and assigned an id.
    pub fn queued(self, job_id: JobId) -> Job<Queued> {
        Job {
            state: Queued {
                job_id,
                submitted_at: Utc::now(),
            },
            request: self.request,
        }
    }

    /// The server rejected the job document at submit time.
    pub fn rejected(self, message: String) -> Job<Failed> {
        Job {
            state: Failed {
                reason: FailureReason::Submission { message },
                job_id: None,
                failed_at: Utc::now(),
            },
            request: self.request,
        }
    }
}

impl Job<Queued> {
    /// First successful contact with the status endpoint.
    pub fn acknowledged(self) -> Job<Running> {
        Job {
            state: Running {
                job_id: self.state.job_id,
                submitted_at: self.state.submitted_at,
                first_seen_at: Utc::now(),
            },
            request: self.request,
        }
    }

    /// Terminal failure before any status contact was made, e.g. the wait
    /// budget ran out while the status endpoint was unreachable.
    pub fn failed(self, reason: FailureReason) -> Job<Failed> {
        Job {
            state: Failed {
                reason,
                job_id: Some(self.state.job_id),
                failed_at: Utc::now(),
            },
            request: self.request,
        }
    }
}

impl Job<Running> {
    /// The job finished and its first image output was fetched.
    pub fn completed(self, image: Vec<u8>, filename: String) -> Job<Completed> {
        Job {
            state: Completed {
                job_id: self.state.job_id,
                image,
                filename,
                submitted_at: self.state.submitted_at,
                completed_at: Utc::now(),
            },
            request: self.request,
        }
    }

    /// The job reached a terminal failure.
    pub fn failed(self, reason: FailureReason) -> Job<Failed> {
        Job {
            state: Failed {
                reason,
                job_id: Some(self.state.job_id),
                failed_at: Utc::now(),
            },
            request: self.request,
        }
    }
}

impl From<Job<Completed>> for JobOutcome {
    fn from(job: Job<Completed>) -> Self {
        JobOutcome::Completed(job)
    }
}

impl From<Job<Failed>> for JobOutcome {
    fn from(job: Job<Failed>) -> Self {
        JobOutcome::Failed(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompt::Category;

    fn test_request() -> PromptRequest {
        PromptRequest::new(Category::Background, 0, "a quiet courtyard at dusk")
    }

    #[test]
    fn full_lifecycle_to_completed() {
        let job = Job::new(test_request());
        let queued = job.queued(JobId("abc-123".to_string()));
        assert_eq!(queued.state.job_id.0, "abc-123");

        let running = queued.acknowledged();
        assert!(running.state.first_seen_at >= running.state.submitted_at);

        let completed = running.completed(vec![1, 2, 3], "out_00001.png".to_string());
        assert_eq!(completed.state.image, vec![1, 2, 3]);
        assert_eq!(completed.state.job_id.0, "abc-123");
        assert_eq!(completed.request.index, 0);
    }

    #[test]
    fn rejection_is_terminal_without_job_id() {
        let job = Job::new(test_request());
        let failed = job.rejected("queue full".to_string());
        assert!(failed.state.job_id.is_none());
        assert!(matches!(
            failed.state.reason,
            FailureReason::Submission { .. }
        ));
    }

    #[test]
    fn running_failure_keeps_job_id() {
        let failed = Job::new(test_request())
            .queued(JobId("xyz".to_string()))
            .acknowledged()
            .failed(FailureReason::Execution {
                message: "node 7 errored".to_string(),
            });

        assert_eq!(failed.state.job_id.as_ref().unwrap().0, "xyz");
        assert!(
            failed
                .state
                .reason
                .to_error_message()
                .contains("node 7 errored")
        );
    }

    #[test]
    fn timeout_reason_reports_waited_budget() {
        let reason = FailureReason::Timeout { waited_ms: 300_000 };
        assert!(reason.is_timeout());
        assert!(reason.to_error_message().contains("300000ms"));
    }
}
