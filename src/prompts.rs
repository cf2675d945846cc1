//! Prompt expansion: turning a vibe description into per-category image
//! prompts via a language-model call.
//!
//! The call is a synchronous request/response collaborator from the core's
//! perspective; everything here is a single call-and-parse wrapper behind
//! the `PromptExpander` trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::prompt::PromptSet;
use crate::error::{Result, VibepackError};

const SYSTEM_PROMPT: &str = "\
You are a prompt engineer for Qwen-Image, an AI text-to-image generation model.
Generate vivid, detailed image generation prompts optimized for high-quality output.

Guidelines:
- Each prompt must be self-contained and richly descriptive.
- Focus on: visual style, lighting, mood, color palette, composition, specific details.
- Art style: semi-realistic digital art, high detail, professional quality.
- Do NOT include text, watermarks, or UI elements in prompt descriptions.";

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Trait for the prompt-expansion collaborator.
#[async_trait]
pub trait PromptExpander: Send + Sync {
    /// Generate `num_assets` prompts for each of the three categories.
    ///
    /// Implementations report upstream failures as
    /// [`VibepackError::PromptGeneration`]; count validation happens when
    /// the set is flattened into requests.
    async fn expand(
        &self,
        vibe_name: &str,
        vibe_description: &str,
        num_assets: usize,
    ) -> Result<PromptSet>;
}

// ============================================================================
// Production implementation against an Anthropic-compatible messages API
// ============================================================================

/// Prompt expander backed by the Claude messages API.
#[derive(Clone)]
pub struct ClaudePromptExpander {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudePromptExpander {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point at a different API endpoint (e.g. a proxy).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn user_prompt(vibe_name: &str, vibe_description: &str, num_assets: usize) -> String {
        format!(
            "Vibe: \"{vibe_name}\"\n\
             Description: {vibe_description}\n\n\
             Generate image prompts for this vibe across three categories:\n\n\
             1. \"backgrounds\" — {num_assets} unique background/environment scenes (1024x1024 square format).\n   \
             These should be varied environments matching the vibe aesthetic. No people in the scene.\n   \
             Focus on architecture, landscapes, interiors, or atmospheric settings.\n\n\
             2. \"female\" — {num_assets} female outfit/costume prompts (768x1024 portrait format).\n   \
             Full outfit displayed on a plain/neutral background. Fashion photography style.\n   \
             Show the complete clothing ensemble clearly. NO face or person — clothing only,\n   \
             displayed as if on an invisible mannequin or laid flat. Include accessories.\n\n\
             3. \"male\" — {num_assets} male outfit/costume prompts (768x1024 portrait format).\n   \
             Same style as female — full outfit on neutral background, clothing only, no face.\n   \
             Include accessories and footwear.\n\n\
             Each prompt should be 2-4 sentences of vivid visual description."
        )
    }

    fn tool_schema() -> Value {
        json!({
            "name": "generate_prompts",
            "description": "Generate structured image generation prompts for each category.",
            "input_schema": {
                "type": "object",
                "properties": {
                    "backgrounds": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Background/environment scene prompts",
                    },
                    "female": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Female outfit/costume prompts",
                    },
                    "male": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Male outfit/costume prompts",
                    },
                },
                "required": ["backgrounds", "female", "male"],
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[async_trait]
impl PromptExpander for ClaudePromptExpander {
    #[tracing::instrument(skip(self, vibe_description))]
    async fn expand(
        &self,
        vibe_name: &str,
        vibe_description: &str,
        num_assets: usize,
    ) -> Result<PromptSet> {
        let body = json!({
            "model": self.model,
            "max_tokens": 4096,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": Self::user_prompt(vibe_name, vibe_description, num_assets),
            }],
            "tools": [Self::tool_schema()],
            "tool_choice": {"type": "tool", "name": "generate_prompts"},
        });

        let response = self
            .client
            .post(&self.api_url)
            .timeout(REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| VibepackError::PromptGeneration(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VibepackError::PromptGeneration(format!(
                "messages API returned {}: {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VibepackError::PromptGeneration(e.to_string()))?;

        let tool_input = parsed
            .content
            .into_iter()
            .find(|block| {
                block.kind == "tool_use" && block.name.as_deref() == Some("generate_prompts")
            })
            .and_then(|block| block.input)
            .ok_or_else(|| {
                VibepackError::PromptGeneration(
                    "messages API did not return the expected tool_use block".to_string(),
                )
            })?;

        let set: PromptSet = serde_json::from_value(tool_input)
            .map_err(|e| VibepackError::PromptGeneration(format!("malformed tool input: {e}")))?;

        tracing::info!(
            backgrounds = set.backgrounds.len(),
            female = set.female.len(),
            male = set.male.len(),
            "Prompts generated"
        );
        Ok(set)
    }
}

// ============================================================================
// Test/Mock implementation
// ============================================================================

/// Prompt expander returning a fixed set, for tests.
#[derive(Clone, Default)]
pub struct StaticPromptExpander {
    set: PromptSet,
    error: Option<String>,
}

impl StaticPromptExpander {
    pub fn new(set: PromptSet) -> Self {
        Self { set, error: None }
    }

    /// An expander that always fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            set: PromptSet::default(),
            error: Some(message.into()),
        }
    }

    /// Formulaic prompts, `num_assets` per category.
    pub fn formulaic(vibe_name: &str, num_assets: usize) -> Self {
        let prompts = |kind: &str| {
            (0..num_assets)
                .map(|n| format!("{vibe_name} {kind} scene {n}"))
                .collect()
        };
        Self::new(PromptSet {
            backgrounds: prompts("background"),
            female: prompts("female outfit"),
            male: prompts("male outfit"),
        })
    }
}

#[async_trait]
impl PromptExpander for StaticPromptExpander {
    async fn expand(
        &self,
        _vibe_name: &str,
        _vibe_description: &str,
        _num_assets: usize,
    ) -> Result<PromptSet> {
        match &self.error {
            Some(message) => Err(VibepackError::PromptGeneration(message.clone())),
            None => Ok(self.set.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_names_vibe_and_counts() {
        let prompt = ClaudePromptExpander::user_prompt("mughal_royale", "royal court", 2);
        assert!(prompt.contains("mughal_royale"));
        assert!(prompt.contains("royal court"));
        assert!(prompt.contains("2 unique background/environment scenes"));
    }

    #[test]
    fn tool_use_block_parses_into_prompt_set() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "thinking..."},
                {"type": "tool_use", "name": "generate_prompts", "input": {
                    "backgrounds": ["b1"],
                    "female": ["f1"],
                    "male": ["m1"],
                }}
            ]
        });

        let parsed: MessagesResponse = serde_json::from_value(raw).unwrap();
        let input = parsed
            .content
            .into_iter()
            .find(|b| b.kind == "tool_use")
            .and_then(|b| b.input)
            .unwrap();
        let set: PromptSet = serde_json::from_value(input).unwrap();
        assert_eq!(set.backgrounds, vec!["b1"]);
        assert_eq!(set.male, vec!["m1"]);
    }

    #[tokio::test]
    async fn static_expander_returns_its_set() {
        let expander = StaticPromptExpander::formulaic("noir", 2);
        let set = expander.expand("noir", "dark alleys", 2).await.unwrap();
        assert_eq!(set.backgrounds.len(), 2);
        assert_eq!(set.female.len(), 2);
        assert_eq!(set.male.len(), 2);
    }

    #[tokio::test]
    async fn failing_expander_surfaces_prompt_generation_error() {
        let expander = StaticPromptExpander::failing("api down");
        let err = expander.expand("noir", "dark", 1).await.unwrap_err();
        assert!(matches!(err, VibepackError::PromptGeneration(_)));
    }
}
