//! Model-presence check.
//!
//! A precondition invoked once before the first submission: the inference
//! server must be able to resolve the model files the workflow names.
//! Downloading missing files is the hosting environment's job, not the
//! core's. This only verifies and reports.

use std::path::Path;

use crate::error::{Result, VibepackError};

/// One required model file, relative to the models base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFile {
    pub filename: &'static str,
    pub subdir: &'static str,
}

/// The Qwen-Image file set the default workflow references.
pub const REQUIRED_MODELS: [ModelFile; 3] = [
    ModelFile {
        filename: "qwen_image_fp8_e4m3fn.safetensors",
        subdir: "diffusion_models",
    },
    ModelFile {
        filename: "qwen_2.5_vl_7b_fp8_scaled.safetensors",
        subdir: "text_encoders",
    },
    ModelFile {
        filename: "qwen_image_vae.safetensors",
        subdir: "vae",
    },
];

/// Verify that every required model file exists under `base_dir`.
///
/// Returns one action string per file (for startup logs). Any missing file
/// fails the whole invocation with [`VibepackError::ModelsUnavailable`].
pub fn verify_models(base_dir: &Path) -> Result<Vec<String>> {
    let mut actions = Vec::with_capacity(REQUIRED_MODELS.len());
    let mut missing = Vec::new();

    for model in REQUIRED_MODELS {
        let path = base_dir.join(model.subdir).join(model.filename);
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
                tracing::info!(path = %path.display(), size_mb, "Model found");
                actions.push(format!("found {} ({:.0} MB)", model.filename, size_mb));
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "Model missing");
                missing.push(format!("{}/{}", model.subdir, model.filename));
            }
        }
    }

    if !missing.is_empty() {
        return Err(VibepackError::ModelsUnavailable(format!(
            "missing model files: {}",
            missing.join(", ")
        )));
    }

    Ok(actions)
}
