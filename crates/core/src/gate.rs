//! Filters and deduplicates finalized transcripts from the STT leg.

use tracing::debug;

/// Trimmed transcripts shorter than this are treated as noise/silence.
pub const MIN_TRANSCRIPT_CHARS: usize = 2;

/// One transcript event as normalized by an STT adapter. The adapter is the
/// only place provider-specific event names live; everything downstream
/// consumes this shape.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub text: String,
    /// Opaque token correlating events of one speech turn, when the provider
    /// supplies one.
    pub utterance_id: Option<String>,
    pub is_final: bool,
}

/// Per-session transcript filter.
///
/// Providers may emit the same finalized transcript on multiple event types;
/// the gate lets the first through and drops the rest, keyed by utterance id.
#[derive(Debug, Default)]
pub struct TranscriptGate {
    last_utterance_id: Option<String>,
}

impl TranscriptGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the filtering rules in order; returns the normalized text of
    /// an accepted event, or nothing.
    pub fn accept(&mut self, event: TranscriptEvent) -> Option<String> {
        let text = event.text.trim();
        if text.chars().count() < MIN_TRANSCRIPT_CHARS {
            debug!("Ignoring sub-threshold transcript.");
            return None;
        }
        if let Some(id) = &event.utterance_id {
            if self.last_utterance_id.as_deref() == Some(id.as_str()) {
                debug!(utterance_id = %id, "Dropping duplicate finalization.");
                return None;
            }
            self.last_utterance_id = Some(id.clone());
        }
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str, id: Option<&str>) -> TranscriptEvent {
        TranscriptEvent {
            text: text.to_string(),
            utterance_id: id.map(String::from),
            is_final: true,
        }
    }

    #[test]
    fn short_or_empty_text_is_rejected() {
        let mut gate = TranscriptGate::new();
        assert_eq!(gate.accept(event("", None)), None);
        assert_eq!(gate.accept(event("   ", None)), None);
        assert_eq!(gate.accept(event(" a ", None)), None);
        assert_eq!(gate.accept(event("ok", None)), Some("ok".to_string()));
    }

    #[test]
    fn duplicate_utterance_id_is_rejected_once_emitted() {
        let mut gate = TranscriptGate::new();
        assert_eq!(
            gate.accept(event("hello there", Some("utt-1"))),
            Some("hello there".to_string())
        );
        assert_eq!(gate.accept(event("hello there", Some("utt-1"))), None);
        assert_eq!(
            gate.accept(event("next turn", Some("utt-2"))),
            Some("next turn".to_string())
        );
    }

    #[test]
    fn events_without_id_always_pass() {
        let mut gate = TranscriptGate::new();
        assert!(gate.accept(event("hello", None)).is_some());
        assert!(gate.accept(event("hello", None)).is_some());
    }

    #[test]
    fn accepted_text_is_trimmed() {
        let mut gate = TranscriptGate::new();
        assert_eq!(
            gate.accept(event("  hi there \n", None)),
            Some("hi there".to_string())
        );
    }

    #[test]
    fn rejected_noise_does_not_consume_the_id() {
        let mut gate = TranscriptGate::new();
        assert_eq!(gate.accept(event(" ", Some("utt-1"))), None);
        assert!(gate.accept(event("real words", Some("utt-1"))).is_some());
    }
}
