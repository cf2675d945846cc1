//! Inference server abstraction.
//!
//! This module defines the `InferenceServer` trait over the server's
//! job-queue HTTP surface (submit, status poll, output fetch), enabling
//! testability with a mock implementation. The production implementation
//! speaks ComfyUI's routes: `POST /prompt`, `GET /history/{id}`,
//! `GET /view`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::error::Result;

// ============================================================================
// Wire types
// ============================================================================

/// Response body of a successful job submission.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueResponse {
    pub prompt_id: Option<String>,
}

/// Reference to one output image, as reported in the job history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_kind")]
    pub kind: String,
}

fn default_image_kind() -> String {
    "output".to_string()
}

/// Outputs of one graph node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// One job's entry in the server's history endpoint.
///
/// A job only appears here once the server has picked it up; absence means
/// it is still queued or running.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: HistoryStatus,
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutput>,
}

impl HistoryEntry {
    /// True if the server reported an execution error for this job.
    pub fn is_error(&self) -> bool {
        self.status.status_str.as_deref() == Some("error")
    }

    /// Joined error messages from the status block.
    pub fn error_message(&self) -> String {
        if self.status.messages.is_empty() {
            return "unknown execution error".to_string();
        }
        self.status
            .messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// First image output from any node, if one exists.
    pub fn first_image(&self) -> Option<&ImageRef> {
        self.outputs
            .values()
            .flat_map(|node| node.images.iter())
            .next()
    }

    /// True once the server has recorded node outputs, whether or not any
    /// of them are images.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Trait over the inference server's job-queue surface.
///
/// The core depends only on: submit-returns-id, poll-returns-terminal-status
/// -and-output-refs, fetch-returns-bytes. Job ids are opaque; the server
/// owns all job state.
#[async_trait]
pub trait InferenceServer: Send + Sync {
    /// Submit a job document to the server's queue.
    ///
    /// Returns immediately with the server-assigned id; completion is
    /// observed separately via [`job_history`](Self::job_history). Not
    /// idempotent: every call creates a new server-side job.
    async fn submit_job(&self, workflow: &Value) -> Result<JobId>;

    /// Look up a job in the history endpoint.
    ///
    /// `Ok(None)` means the job has not reached the history yet (still
    /// queued or executing).
    async fn job_history(&self, job_id: &JobId) -> Result<Option<HistoryEntry>>;

    /// Fetch the raw bytes of one output image.
    async fn fetch_output(&self, image: &ImageRef) -> Result<Vec<u8>>;

    /// Probe whether the server is up and responding.
    async fn health_check(&self) -> bool;
}

// ============================================================================
// Production implementation using reqwest
// ============================================================================

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a ComfyUI server.
#[derive(Clone)]
pub struct ComfyHttpServer {
    client: reqwest::Client,
    base_url: String,
}

impl ComfyHttpServer {
    /// Create a client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl InferenceServer for ComfyHttpServer {
    #[tracing::instrument(skip(self, workflow))]
    async fn submit_job(&self, workflow: &Value) -> Result<JobId> {
        let client_id = Uuid::new_v4().to_string();
        let url = format!("{}/prompt", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(SUBMIT_TIMEOUT)
            .json(&serde_json::json!({
                "prompt": workflow,
                "client_id": client_id,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("/prompt returned {}: {}", status, body).into());
        }

        let queued: QueueResponse = response.json().await?;
        let prompt_id = queued
            .prompt_id
            .ok_or_else(|| anyhow::anyhow!("no prompt_id in /prompt response"))?;

        tracing::info!(job_id = %prompt_id, "Submitted job");
        Ok(JobId(prompt_id))
    }

    async fn job_history(&self, job_id: &JobId) -> Result<Option<HistoryEntry>> {
        let url = format!("{}/history/{}", self.base_url, job_id);

        let response = self.client.get(&url).timeout(POLL_TIMEOUT).send().await?;
        if !response.status().is_success() {
            tracing::debug!(
                job_id = %job_id,
                status = response.status().as_u16(),
                "History poll returned non-success status"
            );
            return Ok(None);
        }

        // The history endpoint returns a map keyed by job id; the job is
        // absent until the server has picked it up.
        let mut history: HashMap<String, HistoryEntry> = response.json().await?;
        Ok(history.remove(&job_id.0))
    }

    async fn fetch_output(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let url = format!("{}/view", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                anyhow::anyhow!("failed to fetch image {}: HTTP {}", image.filename, status)
                    .into(),
            );
        }

        let bytes = response.bytes().await?;
        tracing::debug!(
            filename = %image.filename,
            bytes = bytes.len(),
            "Fetched output image"
        );
        Ok(bytes.to_vec())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/system_stats", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Test/Mock implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Scripted terminal behavior for one mock job.
#[derive(Debug, Clone)]
pub enum MockJobOutcome {
    /// Job completes with one image output.
    Image { filename: String, bytes: Vec<u8> },
    /// Job fails server-side with an execution error.
    ExecutionError { message: String },
    /// Job completes with node outputs but no images.
    NoOutputs,
    /// Job never appears in the history (for timeout testing).
    NeverFinishes,
}

/// Script for one job, consumed in submission order.
#[derive(Debug, Clone)]
pub struct MockJobScript {
    /// If set, the submission itself is rejected with this message.
    pub submit_error: Option<String>,
    /// Number of polls that return "not in history yet" before the
    /// terminal entry appears.
    pub pending_polls: usize,
    /// Terminal behavior once the pending polls are exhausted.
    pub outcome: MockJobOutcome,
}

impl MockJobScript {
    /// A job that completes immediately with the given image bytes.
    pub fn image(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            submit_error: None,
            pending_polls: 0,
            outcome: MockJobOutcome::Image {
                filename: filename.into(),
                bytes,
            },
        }
    }

    /// A job whose submission is rejected.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            submit_error: Some(message.into()),
            pending_polls: 0,
            outcome: MockJobOutcome::NeverFinishes,
        }
    }

    /// A job that fails server-side after entering the queue.
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self {
            submit_error: None,
            pending_polls: 0,
            outcome: MockJobOutcome::ExecutionError {
                message: message.into(),
            },
        }
    }

    /// A job that never reaches a terminal state.
    pub fn never_finishes() -> Self {
        Self {
            submit_error: None,
            pending_polls: 0,
            outcome: MockJobOutcome::NeverFinishes,
        }
    }

    /// Delay the terminal entry by this many polls.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }
}

struct MockJob {
    remaining_pending: usize,
    outcome: MockJobOutcome,
}

#[derive(Default)]
struct MockState {
    scripts: VecDeque<MockJobScript>,
    keyed_scripts: HashMap<String, VecDeque<MockJobScript>>,
    jobs: HashMap<String, MockJob>,
    outputs: HashMap<String, Vec<u8>>,
    submitted_workflows: Vec<Value>,
    poll_counts: HashMap<String, usize>,
    next_id: usize,
    healthy: bool,
}

/// Mock inference server for testing.
///
/// Jobs are scripted in submission order: each `submit_job` consumes the
/// next [`MockJobScript`] and binds it to a fresh id. Submitting without a
/// script is an error, matching the fail-loud behavior of an unconfigured
/// mock.
#[derive(Clone)]
pub struct MockInferenceServer {
    state: Arc<Mutex<MockState>>,
}

impl MockInferenceServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                healthy: true,
                ..MockState::default()
            })),
        }
    }

    /// Queue the script for the next submitted job.
    pub fn script_job(&self, script: MockJobScript) {
        self.state.lock().scripts.push_back(script);
    }

    /// Queue a script bound to a specific positive-prompt text.
    ///
    /// Keyed scripts take precedence over the submission-order queue; they
    /// make tests deterministic when jobs are submitted concurrently.
    pub fn script_job_for_prompt(&self, prompt: &str, script: MockJobScript) {
        self.state
            .lock()
            .keyed_scripts
            .entry(prompt.to_string())
            .or_default()
            .push_back(script);
    }

    /// Toggle the health probe result.
    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().healthy = healthy;
    }

    /// Number of jobs submitted so far.
    pub fn submit_count(&self) -> usize {
        self.state.lock().submitted_workflows.len()
    }

    /// Workflow documents received, in submission order.
    pub fn submitted_workflows(&self) -> Vec<Value> {
        self.state.lock().submitted_workflows.clone()
    }

    /// Number of history polls recorded for a job.
    pub fn poll_count(&self, job_id: &JobId) -> usize {
        self.state
            .lock()
            .poll_counts
            .get(&job_id.0)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MockInferenceServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceServer for MockInferenceServer {
    async fn submit_job(&self, workflow: &Value) -> Result<JobId> {
        let mut state = self.state.lock();
        state.submitted_workflows.push(workflow.clone());

        // The positive prompt lives in node 4 of the t2i graph.
        let prompt = workflow["4"]["inputs"]["text"].as_str().map(str::to_owned);
        let keyed = prompt.and_then(|p| {
            state
                .keyed_scripts
                .get_mut(&p)
                .and_then(|queue| queue.pop_front())
        });

        let script = match keyed {
            Some(script) => script,
            None => state.scripts.pop_front().ok_or_else(|| {
                anyhow::anyhow!("no mock job script configured for this submission")
            })?,
        };

        if let Some(message) = script.submit_error {
            return Err(anyhow::anyhow!(message).into());
        }

        state.next_id += 1;
        let id = format!("mock-job-{}", state.next_id);

        if let MockJobOutcome::Image { filename, bytes } = &script.outcome {
            state.outputs.insert(filename.clone(), bytes.clone());
        }
        state.jobs.insert(
            id.clone(),
            MockJob {
                remaining_pending: script.pending_polls,
                outcome: script.outcome,
            },
        );

        Ok(JobId(id))
    }

    async fn job_history(&self, job_id: &JobId) -> Result<Option<HistoryEntry>> {
        let mut state = self.state.lock();
        *state.poll_counts.entry(job_id.0.clone()).or_insert(0) += 1;

        let job = match state.jobs.get_mut(&job_id.0) {
            Some(job) => job,
            None => return Ok(None),
        };

        if job.remaining_pending > 0 {
            job.remaining_pending -= 1;
            return Ok(None);
        }

        let entry = match &job.outcome {
            MockJobOutcome::NeverFinishes => return Ok(None),
            MockJobOutcome::ExecutionError { message } => HistoryEntry {
                status: HistoryStatus {
                    status_str: Some("error".to_string()),
                    messages: vec![Value::String(message.clone())],
                },
                outputs: HashMap::new(),
            },
            MockJobOutcome::NoOutputs => HistoryEntry {
                status: HistoryStatus::default(),
                outputs: HashMap::from([("10".to_string(), NodeOutput { images: vec![] })]),
            },
            MockJobOutcome::Image { filename, .. } => HistoryEntry {
                status: HistoryStatus {
                    status_str: Some("success".to_string()),
                    messages: vec![],
                },
                outputs: HashMap::from([(
                    "10".to_string(),
                    NodeOutput {
                        images: vec![ImageRef {
                            filename: filename.clone(),
                            subfolder: String::new(),
                            kind: "output".to_string(),
                        }],
                    },
                )]),
            },
        };

        Ok(Some(entry))
    }

    async fn fetch_output(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let state = self.state.lock();
        state
            .outputs
            .get(&image.filename)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no mock output named {}", image.filename).into())
    }

    async fn health_check(&self) -> bool {
        self.state.lock().healthy
    }
}
