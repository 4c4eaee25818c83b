//! Wire messages exchanged with connected clients
//!
//! Text frames carry JSON with a `type` tag in both directions. Binary frames
//! are raw audio (inbound: capture audio, outbound: synthesized speech) and
//! never JSON.

use serde::{Deserialize, Serialize};

/// Control messages clients send on text frames.
///
/// Tagged so that a new message kind must be handled explicitly; anything that
/// fails to parse is a protocol error and is silently ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// End the current round (conversation mode) or the audio source (browser).
    Stop,
    /// Liveness probe, answered with `pong` on the same connection.
    Ping,
    /// Playback gain requested by a browser, relayed to every listener.
    Volume { value: f64 },
}

impl ControlMessage {
    /// Parse a text frame. `None` for anything malformed.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Messages the relay sends to clients on text frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A finished utterance together with its translation.
    Translation {
        original: String,
        translation: String,
        /// Playback channel hint, present only in conversation mode.
        #[serde(skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Human-readable state change, best-effort.
    Status { message: String },
    /// Running transcript of the current conversation round.
    TranscriptionUpdate { text: String },
    /// Answer to `ping`.
    Pong,
    /// Relayed playback gain.
    Volume { value: f64 },
    /// A collaborator or connection failure visible to this client.
    Error { message: String },
}

impl OutboundMessage {
    pub fn status(message: impl Into<String>) -> Self {
        OutboundMessage::Status { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error { message: message.into() }
    }

    /// Serialize for a text frame. Serialization of these variants cannot
    /// fail, so this is infallible for callers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
