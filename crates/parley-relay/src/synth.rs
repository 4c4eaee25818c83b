//! **Synthesis collaborator** — text in, compressed audio bytes out.
//!
//! `SpeechSynthesizer` posts to an OpenAI-compatible speech endpoint and
//! collects the streamed body into one buffer; the whole clip is delivered to
//! listeners as a single binary frame. Zero bytes is the failure signal.

use crate::config::ApiSettings;
use crate::error::{RelayError, RelayResult};
use futures_util::StreamExt;
use serde_json::json;

/// Seam for the speech-synthesis engine. Constructed once at startup and shared.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the given voice. Empty output means failure.
    async fn synthesize(&self, text: &str, voice: &str) -> RelayResult<Vec<u8>>;
}

/// Production synthesizer against an OpenAI-compatible speech API.
#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl SpeechSynthesizer {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for SpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> RelayResult<Vec<u8>> {
        let url = format!("{}/audio/speech", self.settings.base_url);
        let body = json!({
            "model": self.settings.model,
            "voice": voice,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| RelayError::Synthesis(e.to_string()))?;

        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RelayError::Synthesis(e.to_string()))?;
            audio.extend_from_slice(&chunk);
        }
        Ok(audio)
    }
}

/// Test synthesizer returning a canned clip, or nothing at all.
pub struct CannedSynthesizer {
    pub audio: Vec<u8>,
}

impl CannedSynthesizer {
    pub fn new(audio: Vec<u8>) -> Self {
        Self { audio }
    }

    /// Always returns zero bytes, the failure signal.
    pub fn silent() -> Self {
        Self { audio: Vec::new() }
    }
}

#[async_trait::async_trait]
impl Synthesizer for CannedSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> RelayResult<Vec<u8>> {
        Ok(self.audio.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_synthesizer_round_trip() {
        let synth = CannedSynthesizer::new(vec![1, 2, 3]);
        assert_eq!(synth.synthesize("hi", "any").await.unwrap(), vec![1, 2, 3]);
        assert!(CannedSynthesizer::silent()
            .synthesize("hi", "any")
            .await
            .unwrap()
            .is_empty());
    }
}
