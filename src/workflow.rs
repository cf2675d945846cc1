//! Job spec builder: ComfyUI API-format workflow documents for
//! Qwen-Image text-to-image generation.
//!
//! Building a workflow is a pure transform from (prompt, size, seed) to the
//! graph document the server executes; no state, no IO.

use rand::Rng;
use serde_json::{Value, json};

/// Constructs text-to-image workflow documents.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    pub unet_model: String,
    pub clip_model: String,
    pub vae_model: String,
    pub steps: u32,
    pub cfg: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub auraflow_shift: f64,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self {
            unet_model: "qwen_image_fp8_e4m3fn.safetensors".to_string(),
            clip_model: "qwen_2.5_vl_7b_fp8_scaled.safetensors".to_string(),
            vae_model: "qwen_image_vae.safetensors".to_string(),
            steps: 15,
            cfg: 1.0,
            sampler_name: "euler".to_string(),
            scheduler: "simple".to_string(),
            auraflow_shift: 3.1,
        }
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a text-to-image workflow.
    ///
    /// A `None` seed draws a random one, so repeated submissions of the
    /// same prompt produce distinct images.
    pub fn build_t2i(&self, prompt: &str, width: u32, height: u32, seed: Option<u64>) -> Value {
        let seed = seed.unwrap_or_else(|| rand::rng().random_range(0..u32::MAX as u64));

        json!({
            // Load diffusion model
            "1": {
                "class_type": "UNETLoader",
                "inputs": {
                    "unet_name": self.unet_model,
                    "weight_dtype": "fp8_e4m3fn",
                },
            },
            // Model sampling config for Qwen
            "2": {
                "class_type": "ModelSamplingAuraFlow",
                "inputs": {
                    "shift": self.auraflow_shift,
                    "model": ["1", 0],
                },
            },
            // Load text encoder
            "3": {
                "class_type": "CLIPLoader",
                "inputs": {
                    "clip_name": self.clip_model,
                    "type": "qwen_image",
                    "device": "default",
                },
            },
            // Positive prompt
            "4": {
                "class_type": "CLIPTextEncode",
                "inputs": {
                    "text": prompt,
                    "clip": ["3", 0],
                },
            },
            // Negative prompt (empty, CFG=1.0 ignores it)
            "5": {
                "class_type": "CLIPTextEncode",
                "inputs": {
                    "text": "",
                    "clip": ["3", 0],
                },
            },
            // Empty latent (SD3 format for Qwen)
            "6": {
                "class_type": "EmptySD3LatentImage",
                "inputs": {
                    "width": width,
                    "height": height,
                    "batch_size": 1,
                },
            },
            // Sampler
            "7": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": seed,
                    "steps": self.steps,
                    "cfg": self.cfg,
                    "sampler_name": self.sampler_name,
                    "scheduler": self.scheduler,
                    "denoise": 1.0,
                    "model": ["2", 0],
                    "positive": ["4", 0],
                    "negative": ["5", 0],
                    "latent_image": ["6", 0],
                },
            },
            // Load VAE
            "8": {
                "class_type": "VAELoader",
                "inputs": {
                    "vae_name": self.vae_model,
                },
            },
            // Decode latent to image
            "9": {
                "class_type": "VAEDecode",
                "inputs": {
                    "samples": ["7", 0],
                    "vae": ["8", 0],
                },
            },
            // Save output
            "10": {
                "class_type": "SaveImage",
                "inputs": {
                    "filename_prefix": "vibepack_asset",
                    "images": ["9", 0],
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_carries_prompt_and_size() {
        let builder = WorkflowBuilder::new();
        let workflow = builder.build_t2i("a misty harbor at dawn", 768, 1024, Some(42));

        assert_eq!(workflow["4"]["inputs"]["text"], "a misty harbor at dawn");
        assert_eq!(workflow["6"]["inputs"]["width"], 768);
        assert_eq!(workflow["6"]["inputs"]["height"], 1024);
        assert_eq!(workflow["7"]["inputs"]["seed"], 42);
    }

    #[test]
    fn workflow_is_deterministic_under_fixed_seed() {
        let builder = WorkflowBuilder::new();
        let a = builder.build_t2i("prompt", 1024, 1024, Some(7));
        let b = builder.build_t2i("prompt", 1024, 1024, Some(7));
        assert_eq!(a, b);
    }

    #[test]
    fn workflow_wires_sampler_to_latent_and_encoders() {
        let workflow = WorkflowBuilder::new().build_t2i("p", 1024, 1024, Some(0));

        let sampler = &workflow["7"]["inputs"];
        assert_eq!(sampler["positive"], serde_json::json!(["4", 0]));
        assert_eq!(sampler["negative"], serde_json::json!(["5", 0]));
        assert_eq!(sampler["latent_image"], serde_json::json!(["6", 0]));
        assert_eq!(workflow["10"]["class_type"], "SaveImage");
    }
}
