//! End-to-end pipeline: vibe description in, base64 asset pack out.

use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::assembler::AssetArchive;
use crate::config::PipelineConfig;
use crate::error::{Result, VibepackError};
use crate::models::verify_models;
use crate::orchestrator::BatchOrchestrator;
use crate::prompts::PromptExpander;
use crate::server::InferenceServer;

/// Caller-facing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub vibe_name: String,
    pub vibe_description: String,
    pub num_assets: usize,
}

impl GenerateRequest {
    fn validate(&self) -> Result<()> {
        if self.vibe_name.trim().is_empty() {
            return Err(VibepackError::InvalidInput("vibe_name is required".into()));
        }
        if self.vibe_description.trim().is_empty() {
            return Err(VibepackError::InvalidInput(
                "vibe_description is required".into(),
            ));
        }
        if self.num_assets == 0 {
            return Err(VibepackError::InvalidInput(
                "num_assets must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

/// Caller-facing success response.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    /// Base64-encoded zip of the categorized asset pack.
    pub zip_base64: String,
    pub vibe_name: String,
    /// Images inside the archive; `3 * num_assets` under full success.
    pub total_images: usize,
    /// Per-asset failure messages when the pack is partial.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Caller-facing failure object.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub error: String,
}

impl From<&VibepackError> for ErrorResponse {
    fn from(error: &VibepackError) -> Self {
        let kind = match error {
            VibepackError::PromptGeneration(_) => "prompt_generation",
            VibepackError::ModelsUnavailable(_) => "models_unavailable",
            VibepackError::Assembly { .. } => "assembly",
            VibepackError::AllJobsFailed { .. } => "all_jobs_failed",
            VibepackError::InvalidInput(_) => "invalid_input",
            VibepackError::HttpClient(_) => "http",
            VibepackError::Serialization(_) => "serialization",
            VibepackError::Other(_) => "internal",
        };
        ErrorResponse {
            kind,
            error: error.to_string(),
        }
    }
}

/// One invocation of the asset-generation pipeline.
pub struct Pipeline<S: InferenceServer + 'static, P: PromptExpander> {
    server: Arc<S>,
    expander: P,
    config: PipelineConfig,
}

impl<S: InferenceServer + 'static, P: PromptExpander> Pipeline<S, P> {
    pub fn new(server: Arc<S>, expander: P, config: PipelineConfig) -> Self {
        Self {
            server,
            expander,
            config,
        }
    }

    /// Run one invocation end to end.
    ///
    /// Fatal paths (prompt generation, models unavailable, assembly under
    /// fail-whole, all jobs failed) return `Err` with no payload; partial
    /// failure under return-partial yields a smaller archive plus warnings.
    #[tracing::instrument(skip(self, request), fields(vibe_name = %request.vibe_name))]
    pub async fn run(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        request.validate()?;

        tracing::info!(
            num_assets = request.num_assets,
            total_images = request.num_assets * 3,
            "Invocation started"
        );

        if let Some(model_dir) = &self.config.model_dir {
            for action in verify_models(model_dir)? {
                tracing::info!(action = %action, "Model check");
            }
        }

        self.wait_for_server().await?;

        let set = self
            .expander
            .expand(
                &request.vibe_name,
                &request.vibe_description,
                request.num_assets,
            )
            .await?;
        let prompt_requests = set.into_requests(request.num_assets)?;

        let orchestrator = BatchOrchestrator::new(self.server.clone(), &self.config);
        let result = orchestrator.run_batch(prompt_requests).await;

        if result.all_failed() {
            return Err(VibepackError::AllJobsFailed {
                failures: result.failure_messages(),
            });
        }

        let warnings = result.failure_messages();
        let archive = AssetArchive::assemble(&result, self.config.on_partial_failure)?;
        let zip_base64 = BASE64_STANDARD.encode(archive.to_zip_bytes()?);

        tracing::info!(
            total_images = archive.len(),
            missing = archive.missing.len(),
            "Invocation complete"
        );

        Ok(GenerateResponse {
            zip_base64,
            vibe_name: request.vibe_name,
            total_images: archive.len(),
            warnings,
        })
    }

    /// Block until the inference server responds, within the health budget.
    async fn wait_for_server(&self) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.config.health_timeout;

        loop {
            if self.server.health_check().await {
                tracing::info!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Inference server is ready"
                );
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "inference server did not become ready within {:?}",
                    self.config.health_timeout
                )
                .into());
            }
            tokio::time::sleep(self.config.health_poll_interval).await;
        }
    }
}
