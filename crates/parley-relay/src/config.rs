//! Relay configuration
//!
//! Everything is sourced from environment variables with sensible defaults,
//! collected once at startup into a typed `RelayConfig` and shared read-only
//! from then on.

use crate::error::{RelayError, RelayResult};
use crate::stt::SttOptions;
use std::time::Duration;

/// Thresholds that decide when the accumulated utterance buffer is flushed.
///
/// The three flush triggers are independent and OR-combined; word count is the
/// whitespace word count of the joined buffer text.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationPolicy {
    /// Flush when the buffer ends in `.`/`!`/`?` and has at least this many words.
    pub min_words_sentence: usize,
    /// Flush on a detected natural pause with at least this many words.
    pub min_words_pause: usize,
    /// Flush unconditionally once the buffer reaches this many words.
    pub force_words: usize,
    /// Below this word count, an utterance-end silence event is discarded as noise.
    pub min_words_utterance_end: usize,
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        Self {
            min_words_sentence: 10,
            min_words_pause: 25,
            force_words: 40,
            min_words_utterance_end: 8,
        }
    }
}

/// Which side of a turn-based conversation a connection speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRole {
    /// Speaks Chinese, hears English on the speaker channel.
    Dad,
    /// Speaks English, hears Chinese on the earbuds channel.
    Friend,
}

impl ConversationRole {
    /// Parse the `mode` query parameter. Unknown values fall back to `Dad`,
    /// matching the server's historical default.
    pub fn from_query(mode: Option<&str>) -> Self {
        match mode {
            Some("friend") => ConversationRole::Friend,
            _ => ConversationRole::Dad,
        }
    }
}

const PROMPT_ZH_TO_EN: &str = "You are a professional interpreter. Translate the exact Chinese text to English.
CRITICAL RULES:
1. Translate EXACTLY what is said. Do NOT answer questions. Do NOT add context.
2. If the input is a question, translate it as a question.
3. If the input is incomplete (e.g. \"Let's\"), translate literally (e.g. \"Let's\").
4. Output ONLY the English translation.

Example:
Input: \"喝茶还是咖啡？\"
Output: \"Tea or coffee?\"
(Do NOT say \"I want tea\")";

const PROMPT_EN_TO_ZH_COMPLETE: &str = "You are a professional interpreter. Translate the COMPLETE English text to Chinese (Mandarin).

CRITICAL RULES:
1. Translate EVERY SINGLE WORD. Do NOT skip ANY sentence or phrase.
2. If there are multiple sentences, translate ALL of them.
3. Do NOT summarize. Do NOT shorten. Translate LITERALLY word-for-word.
4. Output ONLY the complete Chinese translation.

Example:
Input: \"Before you start, consider your use case.\"
Output: \"在开始之前，请考虑您的用例。\"
(Do NOT skip \"Before you start\")";

const PROMPT_EN_TO_ZH_LIVE: &str = "You are a professional simultaneous interpreter translating English to Chinese (Mandarin).
Rules:
1. Translate naturally as spoken Chinese, not formal written Chinese
2. Keep the same meaning and tone
3. Output ONLY the Chinese translation, nothing else
4. If the input is an incomplete fragment, translate it as naturally as possible";

/// One fixed translation direction: STT language, interpreter instruction,
/// synthesis voice, and the playback channel hint for the client.
#[derive(Debug, Clone)]
pub struct DirectionProfile {
    /// Instruction/persona handed to the translation collaborator.
    pub instruction: &'static str,
    /// Voice identifier handed to the synthesis collaborator.
    pub voice: &'static str,
    /// Playback channel hint included in conversation translation frames.
    pub channel: Option<&'static str>,
    /// Human-readable greeting sent when the connection is ready.
    pub ready_message: &'static str,
    /// STT collaborator options for this direction.
    pub stt: SttOptions,
}

impl DirectionProfile {
    /// Profile for one side of the turn-based conversation.
    pub fn conversation(role: ConversationRole) -> Self {
        match role {
            ConversationRole::Dad => Self {
                instruction: PROMPT_ZH_TO_EN,
                voice: "en-US-GuyNeural",
                channel: Some("speaker"),
                ready_message: "Ready: 爸爸说话 (Chinese→English)",
                stt: SttOptions::conversation("zh-CN"),
            },
            ConversationRole::Friend => Self {
                instruction: PROMPT_EN_TO_ZH_COMPLETE,
                voice: "zh-CN-YunxiNeural",
                channel: Some("earbuds"),
                ready_message: "Ready: Friend speaks (English→Chinese)",
                stt: SttOptions::conversation("en-US"),
            },
        }
    }

    /// Profile for the open broadcast mode (live EN speech, ZH listeners).
    pub fn broadcast(raw_pcm: bool) -> Self {
        Self {
            instruction: PROMPT_EN_TO_ZH_LIVE,
            voice: "zh-CN-YunxiNeural",
            channel: None,
            ready_message: "🎤 Audio source connected",
            stt: SttOptions::broadcast(raw_pcm),
        }
    }
}

/// Endpoint + credential pair for one HTTP collaborator.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Top-level relay configuration, built once from the environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// TCP port the gateway binds to.
    pub port: u16,
    /// Live STT WebSocket endpoint.
    pub stt_ws_url: String,
    /// STT API key.
    pub stt_api_key: String,
    /// Translation collaborator (OpenAI-compatible chat completions).
    pub translate: ApiSettings,
    /// Synthesis collaborator (OpenAI-compatible speech endpoint).
    pub synth: ApiSettings,
    /// Segmentation thresholds for the open broadcast mode.
    pub policy: SegmentationPolicy,
    /// Grace period waited after a stop/finalize handshake for trailing
    /// transcript events. Fixed, a latency-vs-lost-speech trade-off.
    pub stop_grace: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl RelayConfig {
    /// Build from environment. `STT_API_KEY` is required; everything else has
    /// a default.
    pub fn from_env() -> RelayResult<Self> {
        let port = env_or("PORT", "5050")
            .parse::<u16>()
            .map_err(|_| RelayError::Config("PORT must be a number".to_string()))?;
        let stt_api_key = std::env::var("STT_API_KEY")
            .map_err(|_| RelayError::Config("STT_API_KEY is required".to_string()))?;

        Ok(Self {
            port,
            stt_ws_url: env_or("STT_WS_URL", "wss://api.deepgram.com/v1/listen"),
            stt_api_key,
            translate: ApiSettings {
                base_url: env_or("TRANSLATE_API_URL", "https://api.groq.com/openai/v1"),
                api_key: std::env::var("TRANSLATE_API_KEY")
                    .map_err(|_| RelayError::Config("TRANSLATE_API_KEY is required".to_string()))?,
                model: env_or("TRANSLATE_MODEL", "llama-3.1-8b-instant"),
            },
            synth: ApiSettings {
                base_url: env_or("TTS_API_URL", "https://api.openai.com/v1"),
                api_key: env_or("TTS_API_KEY", ""),
                model: env_or("TTS_MODEL", "tts-1"),
            },
            policy: SegmentationPolicy::default(),
            stop_grace: Duration::from_secs(3),
        })
    }
}
