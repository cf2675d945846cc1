//! Job lifecycle types using the typestate pattern.
//!
//! One job tracks one text-to-image generation request from submission
//! through to a terminal state. The server owns the authoritative job state;
//! these types record the facts the client has observed so far. Each state
//! is a distinct type parameter on `Job<State>`, so a job can only perform
//! operations valid for its current state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::prompt::PromptRequest;

/// Marker trait for valid job states.
pub trait JobState: Send + Sync {}

/// One inference job as tracked by the client.
///
/// The generic parameter `T` represents the current state of the job.
/// Ownership sits with the inference client for the duration of one
/// submit-poll-fetch cycle and transfers to the orchestrator once terminal.
#[derive(Debug, Clone, Serialize)]
pub struct Job<T: JobState> {
    /// The current state of the job.
    pub state: T,
    /// The request this job was created from.
    pub request: PromptRequest,
}

/// Opaque job identifier assigned by the inference server.
///
/// The server's queue is an externally-owned state machine; this id is only
/// ever echoed back in status polls and output fetches, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId(id)
    }
}

impl std::ops::Deref for JobId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Job States
// ============================================================================

/// Job has not been submitted yet.
#[derive(Debug, Clone, Serialize)]
pub struct Pending {}

impl JobState for Pending {}

/// Job was accepted into the server's queue but has not been observed in
/// the history endpoint yet.
#[derive(Debug, Clone, Serialize)]
pub struct Queued {
    pub job_id: JobId,
    pub submitted_at: DateTime<Utc>,
}

impl JobState for Queued {}

/// The server has acknowledged the job in at least one status poll.
///
/// ComfyUI does not distinguish queued from executing in its history
/// surface, so this state records "the poll loop is making contact" rather
/// than device-level progress.
#[derive(Debug, Clone, Serialize)]
pub struct Running {
    pub job_id: JobId,
    pub submitted_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
}

impl JobState for Running {}

/// Job finished and its output image has been fetched.
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub job_id: JobId,
    /// Raw bytes of the first image output.
    #[serde(skip)]
    pub image: Vec<u8>,
    /// Server-side filename of the fetched output.
    pub filename: String,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl JobState for Completed {}

/// Reason why a job failed.
///
/// These are per-job facts recorded in the batch result; they never
/// propagate as crate errors past the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FailureReason {
    /// The server rejected the job document at submit time.
    Submission { message: String },

    /// The server accepted the job but reported an execution error.
    Execution { message: String },

    /// Polling exceeded the wait budget without a terminal state.
    /// The job may still be running server-side; no cancellation primitive
    /// exists, so the abandoned job keeps consuming the device.
    Timeout { waited_ms: u64 },

    /// Transport-level failure while fetching the output image.
    Network { error: String },

    /// The server reported completion but the history entry carried no
    /// image outputs.
    MissingOutput,
}

impl FailureReason {
    /// Returns a human-readable error message for this failure reason.
    pub fn to_error_message(&self) -> String {
        match self {
            FailureReason::Submission { message } => {
                format!("Job submission rejected: {}", message)
            }
            FailureReason::Execution { message } => {
                format!("Server execution error: {}", message)
            }
            FailureReason::Timeout { waited_ms } => {
                format!("Job did not reach a terminal state within {}ms", waited_ms)
            }
            FailureReason::Network { error } => {
                format!("Network error: {}", error)
            }
            FailureReason::MissingOutput => {
                "Job completed but produced no image outputs".to_string()
            }
        }
    }

    /// Returns true for timeouts, whose server-side job may still be live.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout { .. })
    }
}

/// Job reached a terminal failure.
#[derive(Debug, Clone, Serialize)]
pub struct Failed {
    pub reason: FailureReason,
    /// The server-assigned id, if submission got that far.
    pub job_id: Option<JobId>,
    pub failed_at: DateTime<Utc>,
}

impl JobState for Failed {}

// ============================================================================
// Terminal outcome
// ============================================================================

/// Result of driving one job to a terminal state.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job produced an image.
    Completed(Job<Completed>),
    /// The job failed; the reason says how.
    Failed(Job<Failed>),
}

impl JobOutcome {
    /// The request this outcome belongs to.
    pub fn request(&self) -> &PromptRequest {
        match self {
            JobOutcome::Completed(job) => &job.request,
            JobOutcome::Failed(job) => &job.request,
        }
    }
}
