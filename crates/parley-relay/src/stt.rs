//! **Speech-to-text collaborator** — live streaming transcription over WebSocket.
//!
//! The relay never looks inside the STT engine; it sends raw audio and a
//! `Finalize` control frame, and consumes a stream of [`TranscriptEvent`]s.
//! `SttConnector` is the seam: `LiveSttConnector` speaks the provider's live
//! protocol, `ScriptedStt` replays a fixed script for tests.

use crate::error::{RelayError, RelayResult};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// What a transcript event represents at the stream level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    /// A results event carrying transcript text; `is_final` says whether the
    /// text is stable or an interim hypothesis the engine may still revise.
    Partial,
    /// The engine detected end-of-utterance silence. Carries no text.
    UtteranceEnd,
}

/// One event from the STT collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub text: String,
    /// The engine asserts this text will not be revised.
    pub is_final: bool,
    /// A natural pause was detected at the end of this result.
    pub speech_final: bool,
    pub kind: TranscriptKind,
}

impl TranscriptEvent {
    /// A stable fragment the engine will not revise.
    pub fn final_fragment(text: impl Into<String>, speech_final: bool) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            speech_final,
            kind: TranscriptKind::Partial,
        }
    }

    /// An interim hypothesis, subject to revision.
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            speech_final: false,
            kind: TranscriptKind::Partial,
        }
    }

    /// Stream-level silence marker.
    pub fn utterance_end() -> Self {
        Self {
            text: String::new(),
            is_final: false,
            speech_final: false,
            kind: TranscriptKind::UtteranceEnd,
        }
    }
}

/// Stream configuration handed to the STT collaborator at connect time.
#[derive(Debug, Clone)]
pub struct SttOptions {
    pub model: &'static str,
    pub language: &'static str,
    /// Raw sample encoding, e.g. `linear16`. `None` lets the engine
    /// auto-detect a container format (WebM/Opus from browsers).
    pub encoding: Option<&'static str>,
    /// Only meaningful together with `encoding`.
    pub sample_rate: Option<u32>,
    pub channels: u32,
    pub smart_format: bool,
    pub punctuate: bool,
    pub interim_results: bool,
    /// Silence endpoint timing in milliseconds.
    pub endpointing_ms: u32,
    /// Utterance gap timing in milliseconds.
    pub utterance_end_ms: u32,
}

impl SttOptions {
    /// Options for the open broadcast mode: tight endpointing, English input.
    /// `raw_pcm` is true for capture bridges sending 16 kHz linear PCM.
    pub fn broadcast(raw_pcm: bool) -> Self {
        Self {
            model: "nova-3",
            language: "en-US",
            encoding: raw_pcm.then_some("linear16"),
            sample_rate: raw_pcm.then_some(16000),
            channels: 1,
            smart_format: true,
            punctuate: true,
            interim_results: true,
            endpointing_ms: 500,
            utterance_end_ms: 1500,
        }
    }

    /// Options for a conversation round: relaxed endpointing so the speaker
    /// can think mid-sentence without triggering a flush.
    pub fn conversation(language: &'static str) -> Self {
        Self {
            model: "nova-2",
            language,
            encoding: None,
            sample_rate: None,
            channels: 1,
            smart_format: true,
            punctuate: true,
            interim_results: true,
            endpointing_ms: 3000,
            utterance_end_ms: 2000,
        }
    }

    /// Query-string form for the live connect URL.
    pub fn query_string(&self) -> String {
        let mut pairs = vec![
            format!("model={}", self.model),
            format!("language={}", self.language),
            format!("smart_format={}", self.smart_format),
            format!("punctuate={}", self.punctuate),
            format!("interim_results={}", self.interim_results),
            format!("endpointing={}", self.endpointing_ms),
            format!("utterance_end_ms={}", self.utterance_end_ms),
            format!("channels={}", self.channels),
        ];
        if let Some(encoding) = self.encoding {
            pairs.push(format!("encoding={encoding}"));
        }
        if let Some(rate) = self.sample_rate {
            pairs.push(format!("sample_rate={rate}"));
        }
        pairs.join("&")
    }
}

/// Commands the relay sends into an open STT stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SttCommand {
    /// Raw audio bytes to transcribe.
    Audio(Vec<u8>),
    /// Flush buffered audio into final results without closing the stream.
    Finalize,
}

/// One open STT stream: a command sender and an event receiver.
///
/// Dropping `commands` closes the stream; the event channel closing signals
/// that the collaborator hung up (orderly or not).
pub struct SttSession {
    pub commands: mpsc::Sender<SttCommand>,
    pub events: mpsc::Receiver<TranscriptEvent>,
}

/// Seam for opening STT streams. Constructed once at startup and shared.
#[async_trait::async_trait]
pub trait SttConnector: Send + Sync {
    async fn open(&self, opts: &SttOptions) -> RelayResult<SttSession>;
}

/// Production connector for a live STT WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct LiveSttConnector {
    ws_url: String,
    api_key: String,
}

/// Wire shape of a live results event. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct LiveMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
    channel: Option<LiveChannel>,
}

#[derive(Debug, Deserialize)]
struct LiveChannel {
    #[serde(default)]
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Deserialize)]
struct LiveAlternative {
    #[serde(default)]
    transcript: String,
}

impl LiveSttConnector {
    pub fn new(ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
        }
    }

    fn parse_event(text: &str) -> Option<TranscriptEvent> {
        let msg: LiveMessage = serde_json::from_str(text).ok()?;
        match msg.kind.as_deref() {
            Some("UtteranceEnd") => Some(TranscriptEvent::utterance_end()),
            Some("Results") => {
                let transcript = msg
                    .channel?
                    .alternatives
                    .into_iter()
                    .next()
                    .map(|alt| alt.transcript)?;
                Some(TranscriptEvent {
                    text: transcript,
                    is_final: msg.is_final,
                    speech_final: msg.speech_final,
                    kind: TranscriptKind::Partial,
                })
            }
            // Metadata, SpeechStarted and friends carry nothing we consume.
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl SttConnector for LiveSttConnector {
    async fn open(&self, opts: &SttOptions) -> RelayResult<SttSession> {
        let url = format!("{}?{}", self.ws_url, opts.query_string());
        let mut request = url
            .into_client_request()
            .map_err(|e| RelayError::SttConnect(e.to_string()))?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", self.api_key)
                .parse()
                .map_err(|_| RelayError::SttConnect("invalid API key header".to_string()))?,
        );

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| RelayError::SttConnect(e.to_string()))?;
        debug!(model = opts.model, language = opts.language, "STT stream opened");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SttCommand>(256);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(256);

        // Writer: drains relay commands into the provider socket. Ends when
        // the session's command sender is dropped.
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let frame = match cmd {
                    SttCommand::Audio(bytes) => Message::Binary(bytes),
                    SttCommand::Finalize => Message::Text(r#"{"type":"Finalize"}"#.to_string()),
                };
                if let Err(e) = ws_tx.send(frame).await {
                    warn!("STT send failed: {e}");
                    break;
                }
            }
            let _ = ws_tx
                .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()))
                .await;
            let _ = ws_tx.close().await;
        });

        // Reader: parses provider frames into transcript events. Dropping the
        // event sender tells the consumer the stream is gone.
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = LiveSttConnector::parse_event(&text) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("STT stream error: {e}");
                        break;
                    }
                }
            }
        });

        Ok(SttSession {
            commands: cmd_tx,
            events: event_rx,
        })
    }
}

/// Test connector: replays a fixed script of events and swallows commands.
pub struct ScriptedStt {
    script: Vec<TranscriptEvent>,
    close_after_script: bool,
}

impl ScriptedStt {
    /// Replays the script, then keeps the stream open until the caller hangs up.
    pub fn new(script: Vec<TranscriptEvent>) -> Self {
        Self {
            script,
            close_after_script: false,
        }
    }

    /// Replays the script, then ends the event stream (engine hang-up).
    pub fn closing(script: Vec<TranscriptEvent>) -> Self {
        Self {
            script,
            close_after_script: true,
        }
    }
}

#[async_trait::async_trait]
impl SttConnector for ScriptedStt {
    async fn open(&self, _opts: &SttOptions) -> RelayResult<SttSession> {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let script = self.script.clone();
        let close_after_script = self.close_after_script;
        tokio::spawn(async move {
            for event in script {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            if close_after_script {
                return;
            }
            // Hold the stream open (event sender alive) until the caller
            // hangs up.
            let _keep_open = event_tx;
            while cmd_rx.recv().await.is_some() {}
        });
        Ok(SttSession {
            commands: cmd_tx,
            events: event_rx,
        })
    }
}
