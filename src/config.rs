//! Pipeline configuration.
//!
//! Everything the core needs is carried explicitly in [`PipelineConfig`]
//! and handed to constructors; nothing reads process environment state, so
//! the core stays testable without environment setup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when some, but not all, jobs in a batch fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Any failed job aborts the invocation with an assembly error.
    FailWhole,
    /// Package whatever completed and report the missing assets.
    ReturnPartial,
}

/// Configuration for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the inference server (e.g. `http://127.0.0.1:8188`).
    pub base_url: String,

    /// Interval between status polls for one job.
    pub poll_interval: Duration,

    /// Wait budget per job, from submission to terminal state.
    pub job_timeout: Duration,

    /// Maximum jobs in flight at once. The server typically fronts a single
    /// compute device, so this defaults to 1; raise it only if the server
    /// advertises deeper concurrent capacity.
    pub max_concurrent_jobs: usize,

    /// Policy applied at assembly time when the batch partially failed.
    pub on_partial_failure: PartialFailurePolicy,

    /// Where required model files live. `None` skips the presence check.
    pub model_dir: Option<PathBuf>,

    /// Total budget for waiting on server readiness before the batch starts.
    pub health_timeout: Duration,

    /// Interval between readiness probes.
    pub health_poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8188".to_string(),
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(300),
            max_concurrent_jobs: 1,
            on_partial_failure: PartialFailurePolicy::ReturnPartial,
            model_dir: None,
            health_timeout: Duration::from_secs(300),
            health_poll_interval: Duration::from_millis(500),
        }
    }
}
