//! **Translation pipeline** — translate, synthesize, hand back the results.
//!
//! Stateless; invoked once per finished utterance or conversation turn. A
//! collaborator failure degrades the result (text without audio, or nothing)
//! instead of surfacing an error, and nothing is retried here.

use crate::config::DirectionProfile;
use crate::synth::Synthesizer;
use crate::translate::Translator;
use std::sync::Arc;
use tracing::{info, warn};

/// What one pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub translation: String,
    /// `None` when synthesis failed or produced zero bytes.
    pub audio: Option<Vec<u8>>,
}

/// Translate then synthesize one utterance.
#[derive(Clone)]
pub struct TranslationPipeline {
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl TranslationPipeline {
    pub fn new(translator: Arc<dyn Translator>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            translator,
            synthesizer,
        }
    }

    /// Run both collaborators once. `None` means translation produced nothing
    /// and there is nothing to deliver.
    pub async fn process(&self, text: &str, profile: &DirectionProfile) -> Option<PipelineOutput> {
        let translation = match self.translator.translate(text, profile.instruction).await {
            Ok(t) => t,
            Err(e) => {
                warn!("translation failed: {e}");
                return None;
            }
        };
        if translation.is_empty() {
            warn!("translation came back empty, skipping utterance");
            return None;
        }
        info!("🧠 Translated: {translation}");

        let audio = match self.synthesizer.synthesize(&translation, profile.voice).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                warn!("synthesis produced no audio");
                None
            }
            Err(e) => {
                warn!("synthesis failed: {e}");
                None
            }
        };

        Some(PipelineOutput { translation, audio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversationRole, DirectionProfile};
    use crate::error::{RelayError, RelayResult};
    use crate::synth::CannedSynthesizer;
    use crate::translate::{FixedTranslator, Translator};

    struct FailingTranslator;

    #[async_trait::async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _instruction: &str) -> RelayResult<String> {
            Err(RelayError::Translate("upstream 500".to_string()))
        }
    }

    fn profile() -> DirectionProfile {
        DirectionProfile::conversation(ConversationRole::Friend)
    }

    #[tokio::test]
    async fn full_result_when_both_collaborators_succeed() {
        let pipeline = TranslationPipeline::new(
            Arc::new(FixedTranslator::with_output("你好世界")),
            Arc::new(CannedSynthesizer::new(vec![0u8; 64])),
        );
        let out = pipeline.process("Hello world", &profile()).await.unwrap();
        assert_eq!(out.translation, "你好世界");
        assert_eq!(out.audio.as_ref().map(|a| a.len()), Some(64));
    }

    #[tokio::test]
    async fn empty_translation_yields_nothing() {
        let pipeline = TranslationPipeline::new(
            Arc::new(FixedTranslator::with_output("")),
            Arc::new(CannedSynthesizer::new(vec![1])),
        );
        assert!(pipeline.process("Hello", &profile()).await.is_none());
    }

    #[tokio::test]
    async fn translator_failure_is_absorbed() {
        let pipeline = TranslationPipeline::new(
            Arc::new(FailingTranslator),
            Arc::new(CannedSynthesizer::new(vec![1])),
        );
        assert!(pipeline.process("Hello", &profile()).await.is_none());
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_to_text_only() {
        let pipeline = TranslationPipeline::new(
            Arc::new(FixedTranslator::echo()),
            Arc::new(CannedSynthesizer::silent()),
        );
        let out = pipeline.process("Hello", &profile()).await.unwrap();
        assert_eq!(out.translation, "Hello");
        assert!(out.audio.is_none());
    }
}
