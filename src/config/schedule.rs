//! Timer-driven drain schedule, loaded from TOML.
//!
//! ```toml
//! [[drain]]
//! kind = "thumbnail-count"
//! interval_secs = 60
//! timeout_secs = 30
//! ```

use crate::error::{Error, Result};
use crate::model::work::WorkKind;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    drain: Vec<ScheduledDrain>,
}

/// One periodically drained queue.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledDrain {
    pub kind: WorkKind,
    pub interval_secs: u64,
    /// Defaults to the interval, so a slow run never overlaps the next tick.
    pub timeout_secs: Option<u64>,
}

impl ScheduledDrain {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(self.interval_secs))
    }
}

/// The full set of scheduled drains.
#[derive(Debug, Clone, Default)]
pub struct DrainSchedule {
    pub drains: Vec<ScheduledDrain>,
}

impl DrainSchedule {
    /// Parse a schedule from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let file: ScheduleFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad drain schedule: {e}")))?;

        let mut seen = HashSet::new();
        for entry in &file.drain {
            if entry.interval_secs == 0 {
                return Err(Error::Config(format!(
                    "drain {} has a zero interval",
                    entry.kind
                )));
            }
            if entry.timeout_secs == Some(0) {
                return Err(Error::Config(format!(
                    "drain {} has a zero timeout",
                    entry.kind
                )));
            }
            if !seen.insert(entry.kind) {
                return Err(Error::Config(format!(
                    "drain {} is scheduled more than once",
                    entry.kind
                )));
            }
        }

        Ok(Self { drains: file.drain })
    }

    /// Check every drain's timeout against the store's claim window.
    pub fn check_claim_window(&self, visibility_timeout: i32) -> Result<()> {
        for entry in &self.drains {
            super::check_claim_window(
                visibility_timeout,
                &format!("drain {} timeout", entry.kind),
                entry.timeout(),
            )?;
        }
        Ok(())
    }

    /// Load a schedule file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read drain schedule {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }
}
