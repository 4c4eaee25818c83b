//! **Turn controller** — one round of a strictly alternating conversation.
//!
//! A round runs `Listening -> Stopping -> Flushing -> Delivering -> Complete`.
//! While listening, final fragments accumulate and the latest interim
//! hypothesis is tracked so nothing said right before the stop is lost. The
//! stop handshake asks the STT collaborator to flush, waits a fixed grace
//! period for trailing events, merges buffer and interim into one blob, and
//! hands it to the pipeline exactly once.

use crate::config::DirectionProfile;
use crate::messages::OutboundMessage;
use crate::pipeline::TranslationPipeline;
use crate::registry::ListenerHandle;
use crate::stt::{SttCommand, TranscriptEvent, TranscriptKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle of one conversation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Listening,
    Stopping,
    Flushing,
    Delivering,
    Complete,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Listening => "listening",
            TurnState::Stopping => "stopping",
            TurnState::Flushing => "flushing",
            TurnState::Delivering => "delivering",
            TurnState::Complete => "complete",
        }
    }
}

/// Drives one round for one conversation connection.
pub struct TurnController {
    profile: DirectionProfile,
    state: TurnState,
    /// Accepted final fragments for this round.
    buffer: Vec<String>,
    /// Latest interim hypothesis since the last final fragment.
    interim: String,
    grace: Duration,
}

impl TurnController {
    pub fn new(profile: DirectionProfile, grace: Duration) -> Self {
        Self {
            profile,
            state: TurnState::Listening,
            buffer: Vec::new(),
            interim: String::new(),
            grace,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn profile(&self) -> &DirectionProfile {
        &self.profile
    }

    /// Feed one transcript event. Returns the joined running transcript when
    /// a final fragment was accepted, for a `transcription_update` push.
    ///
    /// Utterance-end markers are stream-level silence hints; a round is only
    /// bounded by the stop handshake, so they are ignored here.
    pub fn on_event(&mut self, event: &TranscriptEvent) -> Option<String> {
        if event.kind == TranscriptKind::UtteranceEnd || event.text.is_empty() {
            return None;
        }
        if event.is_final {
            self.buffer.push(event.text.clone());
            self.interim.clear();
            Some(self.buffer.join(" "))
        } else {
            self.interim = event.text.clone();
            None
        }
    }

    /// Merge accumulated finals with the trailing interim into one blob,
    /// clearing both.
    fn merged_text(&mut self) -> String {
        let mut parts = Vec::new();
        if !self.buffer.is_empty() {
            parts.push(self.buffer.join(" "));
            self.buffer.clear();
        }
        if !self.interim.is_empty() {
            parts.push(std::mem::take(&mut self.interim));
        }
        parts.join(" ")
    }

    fn transition(&mut self, next: TurnState) {
        debug!("turn {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    /// A hard STT failure mid-round: report it and end the round undelivered.
    pub fn fail(&mut self, out: &ListenerHandle, reason: &str) {
        warn!("turn aborted: {reason}");
        out.send_message(&OutboundMessage::status(format!(
            "Speech service unavailable: {reason}"
        )));
        self.transition(TurnState::Complete);
    }

    /// Run the stop handshake to completion. Called when the speaker sends
    /// `stop` while the round is `Listening`.
    pub async fn finish_round(
        &mut self,
        commands: &mpsc::Sender<SttCommand>,
        events: &mut mpsc::Receiver<TranscriptEvent>,
        pipeline: &TranslationPipeline,
        out: &ListenerHandle,
    ) {
        debug_assert_eq!(self.state, TurnState::Listening);
        self.transition(TurnState::Stopping);

        if commands.send(SttCommand::Finalize).await.is_err() {
            self.fail(out, "stream closed before finalize");
            return;
        }

        // Bounded grace: absorb trailing events until the timer expires. The
        // timer wins regardless of whether anything more arrives.
        let grace = self.grace;
        let stream_closed = tokio::time::timeout(grace, async {
            while let Some(event) = events.recv().await {
                if let Some(update) = self.on_event(&event) {
                    out.send_message(&OutboundMessage::TranscriptionUpdate { text: update });
                }
            }
            true
        })
        .await
        .unwrap_or(false);

        if stream_closed {
            self.fail(out, "stream closed during flush");
            return;
        }

        self.transition(TurnState::Flushing);
        let text = self.merged_text();
        if text.is_empty() {
            info!("nothing said this round");
            self.transition(TurnState::Complete);
            return;
        }

        self.transition(TurnState::Delivering);
        info!("📝 Processing turn text: {text}");
        if let Some(output) = pipeline.process(&text, &self.profile).await {
            out.send_message(&OutboundMessage::Translation {
                original: text,
                translation: output.translation,
                channel: self.profile.channel.map(str::to_string),
            });
            if let Some(audio) = output.audio {
                info!("🔊 Turn audio ready: {} bytes", audio.len());
                out.send_binary(audio);
            }
        }
        self.transition(TurnState::Complete);
    }
}
