//! Live-session conversation entries and the events that produce them.

use serde::{Deserialize, Serialize};

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Typed by the user. Ordered by arrival.
    Typed,
    /// Produced by voice transcription. Ordered by sequence index.
    Transcribed,
}

/// One line of the ordered, append-only conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    /// Present only for transcribed entries.
    pub sequence_index: Option<i64>,
    pub source_kind: SourceKind,
    pub text: String,
    pub participant: String,
}

/// An event delivered by the live-session transport.
///
/// Typed events arrive exactly once; transcribed events may arrive out of
/// order or more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Typed {
        text: String,
        participant: String,
    },
    Transcribed {
        index: i64,
        text: String,
        participant: String,
    },
}
