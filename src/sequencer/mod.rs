//! Ordered delivery of a live session's conversation.
//!
//! Typed messages and transcribed voice fragments share one log. Typed
//! messages are always appended in arrival order. Transcribed fragments
//! pass a monotonic gate: a fragment is applied only if its index is
//! strictly greater than the highest index applied so far this session,
//! so retransmitted or late fragments are dropped with O(1) state.
//!
//! Indices are only meaningful within one session. [`Sequencer::reset_session`]
//! must run between sessions; [`session::LiveSession`] guarantees that.

pub mod session;

use crate::model::conversation::{ConversationEntry, InboundEvent, SourceKind};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use tracing::debug;

pub use session::LiveSession;

/// Single-writer merge of typed and transcribed input.
///
/// Not synchronized. Callers serialize access, either through
/// [`LiveSession`] or their own mutex.
#[derive(Debug, Default)]
pub struct Sequencer {
    /// Highest transcription index applied this session. `None` means
    /// nothing applied yet, which compares below every index.
    high_water: Option<i64>,
    log: Vec<ConversationEntry>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a typed message. Never rejected, never moves the mark.
    pub fn submit_typed(&mut self, participant: impl Into<String>, text: impl Into<String>) {
        self.log.push(ConversationEntry {
            sequence_index: None,
            source_kind: SourceKind::Typed,
            text: text.into(),
            participant: participant.into(),
        });
    }

    /// Offer a transcribed fragment. Returns whether it was applied.
    ///
    /// A `false` return is the expected outcome for a duplicate or stale
    /// delivery, not an error.
    pub fn submit_transcribed(
        &mut self,
        participant: impl Into<String>,
        index: i64,
        text: impl Into<String>,
    ) -> bool {
        if self.high_water.is_some_and(|mark| index <= mark) {
            debug!(index, high_water = ?self.high_water, "dropping stale fragment");
            metrics::sequencer_fragments().add(1, &[KeyValue::new("result", "dropped")]);
            return false;
        }

        self.high_water = Some(index);
        self.log.push(ConversationEntry {
            sequence_index: Some(index),
            source_kind: SourceKind::Transcribed,
            text: text.into(),
            participant: participant.into(),
        });
        metrics::sequencer_fragments().add(1, &[KeyValue::new("result", "accepted")]);
        true
    }

    /// Route a transport event. Typed events always return `true`.
    pub fn apply(&mut self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::Typed { text, participant } => {
                self.submit_typed(participant, text);
                true
            }
            InboundEvent::Transcribed {
                index,
                text,
                participant,
            } => self.submit_transcribed(participant, index, text),
        }
    }

    /// Forget the high-water mark. Call exactly once when a session ends.
    pub fn reset_session(&mut self) {
        self.high_water = None;
    }

    pub fn high_water_mark(&self) -> Option<i64> {
        self.high_water
    }

    /// The ordered log so far.
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.log
    }

    /// Take the log, leaving the sequencer's mark untouched.
    pub fn take_entries(&mut self) -> Vec<ConversationEntry> {
        std::mem::take(&mut self.log)
    }
}
