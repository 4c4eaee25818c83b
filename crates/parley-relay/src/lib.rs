//! # Parley Relay - Live Speech Translation Core
//!
//! Relays live speech through a streaming STT collaborator, segments the
//! transcript stream into translatable utterances, runs each one through a
//! translate-then-synthesize pipeline, and fans text and audio out to a pool
//! of listening WebSocket clients.
//!
//! ## Architecture
//!
//! ```text
//! audio bytes ──> [STT collaborator] ──> TranscriptEvent
//!                                            │
//!                      ┌─────────────────────┴──────────────┐
//!                      │ Segmenter (open broadcast)         │
//!                      │ TurnController (conversation mode) │
//!                      └─────────────────────┬──────────────┘
//!                                            │ finished utterance
//!                                  TranslationPipeline
//!                                 (translate ─> synthesize)
//!                                            │
//!                                   ConnectionRegistry
//!                                 (broadcast to listeners)
//! ```
//!
//! Two operating modes share this core: an open broadcast (one audio source,
//! N listeners) and a turn-based two-party conversation (one round per
//! connection, bounded by a stop/finalize handshake).

pub mod config;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod registry;
pub mod relay;
pub mod segmenter;
pub mod stt;
pub mod synth;
pub mod translate;
pub mod turn;

pub use config::{ApiSettings, ConversationRole, DirectionProfile, RelayConfig, SegmentationPolicy};
pub use error::{RelayError, RelayResult};
pub use messages::{ControlMessage, OutboundMessage};
pub use pipeline::{PipelineOutput, TranslationPipeline};
pub use registry::{ConnectionId, ConnectionRegistry, Frame, ListenerHandle};
pub use relay::Relay;
pub use segmenter::Segmenter;
pub use stt::{
    LiveSttConnector, ScriptedStt, SttCommand, SttConnector, SttOptions, SttSession,
    TranscriptEvent, TranscriptKind,
};
pub use synth::{CannedSynthesizer, SpeechSynthesizer, Synthesizer};
pub use translate::{ChatTranslator, FixedTranslator, Translator};
pub use turn::{TurnController, TurnState};
