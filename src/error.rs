//! Error types for the asset-generation pipeline.

use thiserror::Error;

use crate::domain::prompt::Category;

/// Result type alias using the vibepack error type.
pub type Result<T> = std::result::Result<T, VibepackError>;

/// Invocation-level errors.
///
/// Per-job failures (submission rejections, execution errors, timeouts) are
/// deliberately NOT represented here; they are recorded as
/// [`FailureReason`](crate::domain::job::FailureReason) values inside the
/// batch result and never abort an invocation on their own.
#[derive(Error, Debug)]
pub enum VibepackError {
    /// Upstream prompt expansion failed or returned an incomplete set.
    #[error("Prompt generation failed: {0}")]
    PromptGeneration(String),

    /// Required model files are not resolvable by the inference server.
    #[error("Models unavailable: {0}")]
    ModelsUnavailable(String),

    /// Assembly refused under the fail-whole policy.
    #[error("Assembly failed: {} asset(s) missing", missing.len())]
    Assembly {
        /// The (category, index) pairs that did not complete.
        missing: Vec<(Category, usize)>,
    },

    /// Every job in the batch failed; there is nothing to package.
    #[error("All image generations failed")]
    AllJobsFailed {
        /// Human-readable failure messages, one per job.
        failures: Vec<String>,
    },

    /// Caller-supplied request is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
