//! Error types for the relay core

use thiserror::Error;

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the relay core
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("STT connection error: {0}")]
    SttConnect(String),

    #[error("STT stream error: {0}")]
    SttStream(String),

    #[error("Translation error: {0}")]
    Translate(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::SttStream(err.to_string())
    }
}
