//! **Relay** — the composition root shared by every connection task.
//!
//! Owns the registry, the translation pipeline and the STT connector seam.
//! Connection handlers borrow it to open STT streams, feed the segmenter and
//! fan finished utterances out to the listeners.

use crate::config::{DirectionProfile, RelayConfig};
use crate::messages::OutboundMessage;
use crate::pipeline::TranslationPipeline;
use crate::registry::ConnectionRegistry;
use crate::segmenter::Segmenter;
use crate::stt::{SttConnector, TranscriptEvent};
use crate::synth::Synthesizer;
use crate::translate::Translator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Shared relay state: collaborators are constructed once at startup and
/// injected; none of this is mutated afterwards.
pub struct Relay {
    pub registry: ConnectionRegistry,
    pub pipeline: TranslationPipeline,
    pub stt: Arc<dyn SttConnector>,
    pub config: RelayConfig,
    broadcast_profile: DirectionProfile,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        stt: Arc<dyn SttConnector>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            pipeline: TranslationPipeline::new(translator, synthesizer),
            stt,
            config,
            broadcast_profile: DirectionProfile::broadcast(false),
        }
    }

    /// Translate one finished utterance and fan the results out to every
    /// listener: the text frame first, then the audio frame.
    pub async fn broadcast_utterance(&self, text: String) {
        let Some(output) = self.pipeline.process(&text, &self.broadcast_profile).await else {
            return;
        };
        self.registry.broadcast_message(&OutboundMessage::Translation {
            original: text,
            translation: output.translation,
            channel: None,
        });
        if let Some(audio) = output.audio {
            info!("🔊 Broadcasting {} bytes of audio", audio.len());
            self.registry.broadcast_binary(&audio);
        }
    }

    /// Open-broadcast event loop: run transcript events through a fresh
    /// segmenter until the stream ends. Events are handled strictly in
    /// arrival order; the pipeline round-trip intentionally backpressures
    /// the event stream rather than reordering utterances.
    pub async fn pump_transcripts(&self, mut events: mpsc::Receiver<TranscriptEvent>) {
        let mut segmenter = Segmenter::new(self.config.policy);
        while let Some(event) = events.recv().await {
            if let Some(utterance) = segmenter.accept(&event) {
                info!(
                    "👂 Heard ({} words): {utterance}",
                    utterance.split_whitespace().count()
                );
                self.broadcast_utterance(utterance).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Frame, ListenerHandle};
    use crate::stt::ScriptedStt;
    use crate::synth::CannedSynthesizer;
    use crate::translate::FixedTranslator;

    fn test_relay(translation: &str, audio: Vec<u8>) -> Relay {
        let config = RelayConfig {
            port: 0,
            stt_ws_url: "wss://example.invalid".to_string(),
            stt_api_key: "test".to_string(),
            translate: crate::config::ApiSettings {
                base_url: String::new(),
                api_key: String::new(),
                model: String::new(),
            },
            synth: crate::config::ApiSettings {
                base_url: String::new(),
                api_key: String::new(),
                model: String::new(),
            },
            policy: Default::default(),
            stop_grace: std::time::Duration::from_secs(3),
        };
        Relay::new(
            config,
            Arc::new(ScriptedStt::new(Vec::new())),
            Arc::new(FixedTranslator::with_output(translation)),
            Arc::new(CannedSynthesizer::new(audio)),
        )
    }

    #[tokio::test]
    async fn utterance_broadcasts_text_then_audio() {
        let relay = test_relay("你好世界", vec![3; 32]);
        let (listener, mut rx) = ListenerHandle::new();
        relay.registry.register_listener(listener);

        relay.broadcast_utterance("Hello world".to_string()).await;

        match rx.try_recv().unwrap() {
            Frame::Text(t) => {
                assert!(t.contains("Hello world"));
                assert!(t.contains("你好世界"));
            }
            other => panic!("expected text first, got {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Frame::Binary(b) => assert_eq!(b.len(), 32),
            other => panic!("expected audio frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_synthesis_still_broadcasts_text() {
        let relay = test_relay("嗨", Vec::new());
        let (listener, mut rx) = ListenerHandle::new();
        relay.registry.register_listener(listener);

        relay.broadcast_utterance("hi".to_string()).await;

        assert!(matches!(rx.try_recv().unwrap(), Frame::Text(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pump_segments_and_broadcasts() {
        let relay = test_relay("zh", vec![1]);
        let (listener, mut rx) = ListenerHandle::new();
        relay.registry.register_listener(listener);

        let (tx, events) = mpsc::channel(16);
        let long = "this sentence definitely has more than ten words in it total.";
        tx.send(TranscriptEvent::final_fragment(long, false)).await.unwrap();
        drop(tx);

        relay.pump_transcripts(events).await;

        match rx.try_recv().unwrap() {
            Frame::Text(t) => assert!(t.contains(long)),
            other => panic!("expected translation frame, got {other:?}"),
        }
    }
}
