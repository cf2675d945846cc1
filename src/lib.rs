//! Asset-generation pipeline against a job-queue-based inference server.
//!
//! Given a short "vibe" description, this crate expands it into per-category
//! image prompts, submits each prompt as a text-to-image job to a ComfyUI
//! server, polls every job to a terminal state, and packages the resulting
//! images into a categorized zip archive returned base64-encoded.
//!
//! The interesting part is the batch machinery: N logical requests become N
//! asynchronous server-side jobs, each tracked through an explicit state
//! machine (queued, running, completed/failed/timed out), with partial
//! failure isolated per job and the final archive ordered deterministically
//! by (category, index) regardless of completion order.

pub mod assembler;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod workflow;

// Re-export commonly used types
pub use assembler::AssetArchive;
pub use client::InferenceClient;
pub use config::{PartialFailurePolicy, PipelineConfig};
pub use domain::{BatchResult, Category, FailureReason, Job, JobId, JobOutcome, PromptRequest, PromptSet};
pub use error::{Result, VibepackError};
pub use orchestrator::BatchOrchestrator;
pub use pipeline::{ErrorResponse, GenerateRequest, GenerateResponse, Pipeline};
pub use prompts::{ClaudePromptExpander, PromptExpander, StaticPromptExpander};
pub use server::{ComfyHttpServer, InferenceServer, MockInferenceServer, MockJobScript};
pub use workflow::WorkflowBuilder;
