//! Core domain types for the vibepack pipeline.
//!
//! This module contains pure domain types with no transport dependencies:
//! - Prompt categories and requests
//! - The job typestate machine
//! - Batch results

pub mod batch;
pub mod job;
pub mod prompt;

// Re-export commonly used types from each submodule
pub use batch::BatchResult;
pub use job::{FailureReason, Job, JobId, JobOutcome};
pub use prompt::{Category, PromptRequest, PromptSet};
