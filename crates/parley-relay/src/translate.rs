//! **Translation collaborator** — text in, translated text out.
//!
//! `ChatTranslator` talks to an OpenAI-compatible chat-completions endpoint
//! with a fixed interpreter instruction per direction. An empty string is the
//! failure signal; the pipeline degrades rather than erroring.

use crate::config::ApiSettings;
use crate::error::{RelayError, RelayResult};
use serde::Deserialize;
use serde_json::json;

/// Seam for the translation model. Constructed once at startup and shared.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` under the given instruction. Empty result means the
    /// collaborator produced nothing usable.
    async fn translate(&self, text: &str, instruction: &str) -> RelayResult<String>;
}

/// Production translator against an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct ChatTranslator {
    settings: ApiSettings,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatTranslator {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str, instruction: &str) -> RelayResult<String> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        let body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": instruction},
                {"role": "user", "content": text},
            ],
            "temperature": 0.2,
            "max_tokens": 1024,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| RelayError::Translate(e.to_string()))?;

        let parsed: ChatResponse = response.json().await?;
        let translation = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(translation)
    }
}

/// Test translator that returns a fixed mapping, or echoes the input.
pub struct FixedTranslator {
    pub output: Option<String>,
}

impl FixedTranslator {
    pub fn echo() -> Self {
        Self { output: None }
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
        }
    }
}

#[async_trait::async_trait]
impl Translator for FixedTranslator {
    async fn translate(&self, text: &str, _instruction: &str) -> RelayResult<String> {
        Ok(self.output.clone().unwrap_or_else(|| text.to_string()))
    }
}
