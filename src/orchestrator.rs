//! Batch orchestrator: drives a fixed set of requests to terminal outcomes.
//!
//! Concurrency is bounded by a semaphore sized to the server's advertised
//! concurrent-job capacity (default 1, matching a single compute device).
//! Outcomes land in input-order slots, so the final [`BatchResult`] ordering
//! never depends on completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::InferenceClient;
use crate::config::PipelineConfig;
use crate::domain::batch::BatchResult;
use crate::domain::job::{Job, JobOutcome};
use crate::domain::prompt::PromptRequest;
use crate::server::InferenceServer;
use crate::workflow::WorkflowBuilder;

/// Orchestrator for one invocation's batch of generation jobs.
pub struct BatchOrchestrator<S: InferenceServer + 'static> {
    client: Arc<InferenceClient<S>>,
    builder: WorkflowBuilder,
    semaphore: Arc<Semaphore>,
}

impl<S: InferenceServer + 'static> BatchOrchestrator<S> {
    pub fn new(server: Arc<S>, config: &PipelineConfig) -> Self {
        Self {
            client: Arc::new(InferenceClient::new(server, config)),
            builder: WorkflowBuilder::new(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
        }
    }

    /// Replace the default workflow builder (model names, sampler settings).
    pub fn with_workflow_builder(mut self, builder: WorkflowBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Drive every request to a terminal outcome.
    ///
    /// A failed or timed-out job is recorded and processing continues; one
    /// bad prompt never aborts the batch. Blocks until all requests are
    /// terminal: `result.len() == requests.len()` on return.
    #[tracing::instrument(skip(self, requests), fields(batch_size = requests.len()))]
    pub async fn run_batch(&self, requests: Vec<PromptRequest>) -> BatchResult {
        let total = requests.len();
        tracing::info!(total, "Batch starting");

        // Kept so a panicked task can still be accounted for in its slot.
        let fallback: Vec<PromptRequest> = requests.clone();

        let mut join_set: JoinSet<(usize, JobOutcome)> = JoinSet::new();
        for (slot, request) in requests.into_iter().enumerate() {
            let client = self.client.clone();
            let semaphore = self.semaphore.clone();
            let workflow =
                self.builder
                    .build_t2i(&request.prompt_text, request.width, request.height, None);

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("orchestrator semaphore is never closed");

                tracing::info!(
                    slot,
                    asset = %request,
                    "Generating asset"
                );
                let outcome = client.run_job(request, &workflow).await;
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<JobOutcome>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    slots[slot] = Some(outcome);
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Job task panicked");
                }
            }
        }

        // Every request reaches exactly one terminal outcome, even if its
        // task died before reporting one.
        let outcomes: Vec<JobOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(slot, outcome)| {
                outcome.unwrap_or_else(|| {
                    Job::new(fallback[slot].clone())
                        .rejected("job task terminated unexpectedly".to_string())
                        .into()
                })
            })
            .collect();

        let result = BatchResult::from_outcomes(outcomes);
        tracing::info!(
            completed = result.completed.len(),
            failed = result.failed.len(),
            "Batch finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::FailureReason;
    use crate::domain::prompt::Category;
    use crate::server::{MockInferenceServer, MockJobScript};
    use std::time::Duration;

    fn fast_config(max_concurrent_jobs: usize) -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(5),
            job_timeout: Duration::from_millis(500),
            max_concurrent_jobs,
            ..PipelineConfig::default()
        }
    }

    fn requests(num_per_category: usize) -> Vec<PromptRequest> {
        let mut out = Vec::new();
        for category in Category::ALL {
            for index in 0..num_per_category {
                out.push(PromptRequest::new(
                    category,
                    index,
                    format!("{} prompt {}", category, index),
                ));
            }
        }
        out
    }

    #[test_log::test(tokio::test)]
    async fn every_request_reaches_exactly_one_outcome() {
        let server = MockInferenceServer::new();
        let input = requests(2);
        for (n, request) in input.iter().enumerate() {
            server.script_job_for_prompt(
                &request.prompt_text,
                MockJobScript::image(format!("out_{}.png", n), vec![n as u8; 8]),
            );
        }

        let orchestrator = BatchOrchestrator::new(Arc::new(server), &fast_config(1));
        let result = orchestrator.run_batch(input.clone()).await;

        assert_eq!(result.len(), input.len());
        assert_eq!(result.completed.len(), 6);
        assert!(result.failed.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn one_failure_does_not_affect_the_rest() {
        let server = MockInferenceServer::new();
        let input = requests(1);

        server.script_job_for_prompt(
            &input[0].prompt_text,
            MockJobScript::image("a.png", vec![1]),
        );
        server.script_job_for_prompt(
            &input[1].prompt_text,
            MockJobScript::execution_error("node crashed"),
        );
        server.script_job_for_prompt(
            &input[2].prompt_text,
            MockJobScript::image("c.png", vec![3]),
        );

        let orchestrator = BatchOrchestrator::new(Arc::new(server), &fast_config(1));
        let result = orchestrator.run_batch(input).await;

        assert_eq!(result.completed.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0.category, Category::FemaleOutfit);
        assert!(matches!(
            result.failed[0].1,
            FailureReason::Execution { .. }
        ));
    }

    #[test_log::test(tokio::test)]
    async fn result_order_matches_input_order_under_concurrency() {
        let server = MockInferenceServer::new();
        let input = requests(2);

        // Give earlier requests longer poll delays so they complete last.
        for (n, request) in input.iter().enumerate() {
            let delay = (input.len() - n) * 4;
            server.script_job_for_prompt(
                &request.prompt_text,
                MockJobScript::image(format!("out_{}.png", n), vec![n as u8; 4])
                    .with_pending_polls(delay),
            );
        }

        let orchestrator = BatchOrchestrator::new(Arc::new(server), &fast_config(3));
        let result = orchestrator.run_batch(input.clone()).await;

        assert_eq!(result.completed.len(), input.len());
        for (n, (request, bytes)) in result.completed.iter().enumerate() {
            assert_eq!(request, &input[n]);
            assert_eq!(bytes, &vec![n as u8; 4]);
        }
    }

    #[test_log::test(tokio::test)]
    async fn timeout_is_recorded_and_batch_terminates() {
        let server = MockInferenceServer::new();
        let input = requests(1);

        server.script_job_for_prompt(
            &input[0].prompt_text,
            MockJobScript::never_finishes(),
        );
        server.script_job_for_prompt(
            &input[1].prompt_text,
            MockJobScript::image("f.png", vec![2]),
        );
        server.script_job_for_prompt(
            &input[2].prompt_text,
            MockJobScript::image("m.png", vec![3]),
        );

        let orchestrator = BatchOrchestrator::new(Arc::new(server), &fast_config(1));
        let result = orchestrator.run_batch(input).await;

        assert_eq!(result.completed.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].1.is_timeout());
    }

    #[test_log::test(tokio::test)]
    async fn workflow_documents_carry_request_resolution() {
        let server = MockInferenceServer::new();
        let input = vec![PromptRequest::new(Category::MaleOutfit, 0, "sherwani")];
        server.script_job_for_prompt("sherwani", MockJobScript::image("m.png", vec![1]));

        let orchestrator = BatchOrchestrator::new(Arc::new(server.clone()), &fast_config(1));
        orchestrator.run_batch(input).await;

        let workflows = server.submitted_workflows();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0]["6"]["inputs"]["width"], 768);
        assert_eq!(workflows[0]["6"]["inputs"]["height"], 1024);
    }
}
