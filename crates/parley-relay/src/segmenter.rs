//! **Segmenter** — decides when accumulated speech is complete enough to translate.
//!
//! Owns the utterance buffer for one stream. Final transcript fragments are
//! appended; after each one the flush triggers are evaluated and, when one
//! fires, the joined text is emitted and the buffer reset. Deterministic and
//! free of side effects beyond its own buffer, so the whole policy is unit
//! testable without any networking.

use crate::config::SegmentationPolicy;
use crate::stt::{TranscriptEvent, TranscriptKind};

/// Accumulates final transcript fragments into utterances.
#[derive(Debug)]
pub struct Segmenter {
    policy: SegmentationPolicy,
    buffer: Vec<String>,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn has_terminal_punctuation(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
}

impl Segmenter {
    pub fn new(policy: SegmentationPolicy) -> Self {
        Self {
            policy,
            buffer: Vec::new(),
        }
    }

    /// Feed one transcript event. Returns the finished utterance text when a
    /// flush trigger fires, otherwise `None`.
    pub fn accept(&mut self, event: &TranscriptEvent) -> Option<String> {
        if event.kind == TranscriptKind::UtteranceEnd {
            let joined = self.drain();
            if word_count(&joined) < self.policy.min_words_utterance_end {
                // Short trailing fragments at a silence boundary are noise,
                // not an utterance.
                return None;
            }
            return Some(joined);
        }

        if !event.is_final {
            // Interim hypothesis; the engine may still revise it.
            return None;
        }
        if event.text.is_empty() {
            return None;
        }

        self.buffer.push(event.text.clone());
        let joined = self.joined();
        let words = word_count(&joined);

        let sentence_done = has_terminal_punctuation(&joined) && words >= self.policy.min_words_sentence;
        let pause_done = event.speech_final && words >= self.policy.min_words_pause;
        let forced = words >= self.policy.force_words;

        if sentence_done || pause_done || forced {
            self.buffer.clear();
            Some(joined)
        } else {
            None
        }
    }

    /// Joined text of the pending buffer without clearing it.
    pub fn joined(&self) -> String {
        self.buffer.join(" ")
    }

    /// Read and clear the pending buffer (used by the turn flush path).
    pub fn drain(&mut self) -> String {
        let joined = self.joined();
        self.buffer.clear();
        joined
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SegmentationPolicy {
        SegmentationPolicy {
            min_words_sentence: 10,
            min_words_pause: 25,
            force_words: 40,
            min_words_utterance_end: 8,
        }
    }

    fn feed(seg: &mut Segmenter, fragments: &[&str]) -> Vec<String> {
        fragments
            .iter()
            .filter_map(|f| seg.accept(&TranscriptEvent::final_fragment(*f, false)))
            .collect()
    }

    #[test]
    fn below_all_thresholds_never_emits() {
        let mut seg = Segmenter::new(policy());
        let emitted = feed(&mut seg, &["This is", "a test.", "of the", "system."]);
        assert!(emitted.is_empty());
        assert_eq!(seg.joined(), "This is a test. of the system.");
    }

    #[test]
    fn sentence_rule_fires_at_ten_words_with_punctuation() {
        let mut seg = Segmenter::new(policy());
        assert!(feed(&mut seg, &["This is", "a test.", "of the", "system."]).is_empty());
        // Three more words bring the joined count to 10 with a trailing period.
        let out = seg
            .accept(&TranscriptEvent::final_fragment("it works now.", false))
            .expect("sentence rule should fire");
        assert_eq!(out, "This is a test. of the system. it works now.");
        assert!(seg.is_empty());
    }

    #[test]
    fn interim_results_change_nothing() {
        let mut seg = Segmenter::new(policy());
        assert!(seg.accept(&TranscriptEvent::interim("half formed tho")).is_none());
        assert!(seg.is_empty());
    }

    #[test]
    fn empty_final_fragments_are_dropped() {
        let mut seg = Segmenter::new(policy());
        assert!(seg.accept(&TranscriptEvent::final_fragment("", true)).is_none());
        assert!(seg.is_empty());
    }

    #[test]
    fn pause_rule_requires_word_count() {
        let mut seg = Segmenter::new(policy());
        // speech_final but only 6 words: no emission.
        assert!(seg
            .accept(&TranscriptEvent::final_fragment("just a few words right here", true))
            .is_none());

        // Grow past 25 words, then a speech_final fragment flushes.
        let filler = "one two three four five six seven eight nine ten";
        assert!(seg.accept(&TranscriptEvent::final_fragment(filler, false)).is_none());
        let out = seg
            .accept(&TranscriptEvent::final_fragment(filler, true))
            .expect("pause rule should fire");
        assert_eq!(out.split_whitespace().count(), 26);
        assert!(seg.is_empty());
    }

    #[test]
    fn force_rule_ignores_punctuation_and_pause() {
        let mut seg = Segmenter::new(policy());
        let twenty = "w ".repeat(20).trim_end().to_string();
        assert!(seg.accept(&TranscriptEvent::final_fragment(&twenty, false)).is_none());
        let out = seg
            .accept(&TranscriptEvent::final_fragment(&twenty, false))
            .expect("force rule should fire at 40 words");
        assert_eq!(out.split_whitespace().count(), 40);
        assert!(seg.is_empty());
    }

    #[test]
    fn utterance_end_discards_short_buffers_as_noise() {
        let mut seg = Segmenter::new(policy());
        assert!(seg.accept(&TranscriptEvent::final_fragment("uh huh", false)).is_none());
        assert!(seg.accept(&TranscriptEvent::utterance_end()).is_none());
        assert!(seg.is_empty());
    }

    #[test]
    fn utterance_end_flushes_long_buffers() {
        let mut seg = Segmenter::new(policy());
        let eight = "a b c d e f g h";
        assert!(seg.accept(&TranscriptEvent::final_fragment(eight, false)).is_none());
        let out = seg
            .accept(&TranscriptEvent::utterance_end())
            .expect("eight words meets the utterance-end floor");
        assert_eq!(out, eight);
        assert!(seg.is_empty());
    }

    #[test]
    fn utterance_end_on_empty_buffer_is_silent() {
        let mut seg = Segmenter::new(policy());
        assert!(seg.accept(&TranscriptEvent::utterance_end()).is_none());
    }

    #[test]
    fn buffer_resets_after_every_emission() {
        let mut seg = Segmenter::new(policy());
        let long = "this sentence definitely has more than ten words in it total.";
        assert!(seg.accept(&TranscriptEvent::final_fragment(long, false)).is_some());
        assert!(seg.is_empty());
        // The next round starts from scratch.
        assert!(seg.accept(&TranscriptEvent::final_fragment("short.", false)).is_none());
        assert_eq!(seg.joined(), "short.");
    }
}
