//! Inference client: one submit-poll-fetch cycle per job.
//!
//! The server's queue is the authoritative state machine; this client
//! drives the local [`Job`] typestate from observed server facts, polling
//! at a fixed interval inside a bounded wait budget. Failures are returned
//! as terminal job outcomes, never as crate errors; retry policy belongs
//! to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::config::PipelineConfig;
use crate::domain::job::{Failed, FailureReason, Job, JobOutcome, Pending, Queued, Running};
use crate::domain::prompt::PromptRequest;
use crate::server::InferenceServer;

/// Client driving jobs against one inference server.
pub struct InferenceClient<S: InferenceServer> {
    server: Arc<S>,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl<S: InferenceServer> InferenceClient<S> {
    pub fn new(server: Arc<S>, config: &PipelineConfig) -> Self {
        Self {
            server,
            poll_interval: config.poll_interval,
            job_timeout: config.job_timeout,
        }
    }

    /// Submit a job document for a request.
    ///
    /// Not idempotent: every call consumes server-side compute. A rejection
    /// is a terminal per-job fact, returned as `Err(Job<Failed>)`.
    pub async fn submit(
        &self,
        request: PromptRequest,
        workflow: &Value,
    ) -> Result<Job<Queued>, Job<Failed>> {
        let job = Job::<Pending>::new(request);

        match self.server.submit_job(workflow).await {
            Ok(job_id) => {
                tracing::info!(
                    job_id = %job_id,
                    asset = %job.request,
                    "Job queued"
                );
                Ok(job.queued(job_id))
            }
            Err(e) => {
                tracing::warn!(asset = %job.request, error = %e, "Job submission rejected");
                Err(job.rejected(e.to_string()))
            }
        }
    }

    /// Poll a queued job until it reaches a terminal state or the wait
    /// budget elapses.
    ///
    /// On timeout the server-side job is left alone; no cancellation
    /// primitive exists, so it may keep running and consuming the device.
    pub async fn await_completion(&self, job: Job<Queued>) -> JobOutcome {
        let deadline = Instant::now() + self.job_timeout;
        let job_id = job.state.job_id.clone();
        let mut job = PollingJob::Queued(job);

        loop {
            if Instant::now() >= deadline {
                let waited_ms = self.job_timeout.as_millis() as u64;
                tracing::warn!(
                    job_id = %job_id,
                    waited_ms,
                    "Job timed out; abandoned server-side job may still be running"
                );
                return job.failed(FailureReason::Timeout { waited_ms }).into();
            }

            tokio::time::sleep(self.poll_interval).await;

            let entry = match self.server.job_history(&job_id).await {
                Ok(entry) => entry,
                Err(e) => {
                    // Transient poll failure; keep trying within the budget.
                    tracing::warn!(job_id = %job_id, error = %e, "History poll failed");
                    continue;
                }
            };

            let running = job.acknowledged();

            let entry = match entry {
                Some(entry) => entry,
                None => {
                    // Not in history yet: still queued or executing.
                    job = PollingJob::Running(running);
                    continue;
                }
            };

            if entry.is_error() {
                let message = entry.error_message();
                tracing::warn!(job_id = %job_id, error = %message, "Job failed server-side");
                return running.failed(FailureReason::Execution { message }).into();
            }

            if let Some(image) = entry.first_image() {
                match self.server.fetch_output(image).await {
                    Ok(bytes) => {
                        tracing::info!(
                            job_id = %job_id,
                            filename = %image.filename,
                            bytes = bytes.len(),
                            "Job completed"
                        );
                        return running.completed(bytes, image.filename.clone()).into();
                    }
                    Err(e) => {
                        return running
                            .failed(FailureReason::Network {
                                error: e.to_string(),
                            })
                            .into();
                    }
                }
            }

            if entry.has_outputs() {
                // Terminal entry with outputs but no images.
                tracing::warn!(job_id = %job_id, "Job completed without image outputs");
                return running.failed(FailureReason::MissingOutput).into();
            }

            // Entry exists but carries no outputs yet; poll again.
            job = PollingJob::Running(running);
        }
    }

    /// Submit and drive one job to a terminal outcome.
    pub async fn run_job(&self, request: PromptRequest, workflow: &Value) -> JobOutcome {
        match self.submit(request, workflow).await {
            Ok(queued) => self.await_completion(queued).await,
            Err(failed) => failed.into(),
        }
    }
}

/// Poll-loop holder: the job before and after first status contact.
enum PollingJob {
    Queued(Job<Queued>),
    Running(Job<Running>),
}

impl PollingJob {
    fn acknowledged(self) -> Job<Running> {
        match self {
            PollingJob::Queued(job) => job.acknowledged(),
            PollingJob::Running(job) => job,
        }
    }

    fn failed(self, reason: FailureReason) -> Job<Failed> {
        match self {
            PollingJob::Queued(job) => job.failed(reason),
            PollingJob::Running(job) => job.failed(reason),
        }
    }
}
