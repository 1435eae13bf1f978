//! Work units pulled from the store by the drain loop.
//!
//! A work unit names a subject (an avatar) whose derived counter needs
//! recomputing. The kind decides which counter.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Which queue a unit lives on, and which effect applying it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkKind {
    /// Recompute an avatar's thumbnail count.
    ThumbnailCount,
    /// Recompute an avatar's accumulated serve time.
    ServeTime,
}

impl WorkKind {
    pub const ALL: [WorkKind; 2] = [WorkKind::ThumbnailCount, WorkKind::ServeTime];

    /// pgmq queue name backing this kind.
    pub fn queue_name(self) -> &'static str {
        match self {
            WorkKind::ThumbnailCount => "thumbnail_count",
            WorkKind::ServeTime => "serve_time",
        }
    }
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkKind::ThumbnailCount => "thumbnail-count",
            WorkKind::ServeTime => "serve-time",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail-count" => Ok(WorkKind::ThumbnailCount),
            "serve-time" => Ok(WorkKind::ServeTime),
            other => Err(crate::error::Error::Validation(format!(
                "unknown work kind: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// Opaque identifier of the subject a unit updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// One claimed unit of work. Owned by the store; the drain loop holds
/// one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub subject_id: SubjectId,
    pub kind: WorkKind,
    /// Store handle for the claimed message, used to mark it applied.
    pub receipt: i64,
}

/// Result of applying one unit's effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: bool,
    /// The value the effect set, if any. Opaque to the drain loop.
    pub result_value: Option<serde_json::Value>,
    pub message: String,
}

impl ApplyOutcome {
    pub fn applied(result_value: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            result_value: Some(result_value),
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result_value: None,
            message: message.into(),
        }
    }
}
