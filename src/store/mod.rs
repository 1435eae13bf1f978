//! The work-unit store contract the drain loop depends on.
//!
//! Two implementations: [`crate::db::Db`] (Postgres + pgmq) and
//! [`memory::InMemoryStore`] for tests and local runs.

pub mod memory;

use crate::error::Result;
use crate::model::work::{ApplyOutcome, WorkKind, WorkUnit};
use async_trait::async_trait;

pub use memory::InMemoryStore;

/// A shared store of pending work units.
///
/// `claim_next` is the only synchronization point between concurrent
/// drains: a unit handed to one caller must not be handed to another
/// until it is either marked applied or its claim lapses.
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Claim the next pending unit of `kind`. `Ok(None)` means the queue
    /// is empty; `Err` means the store itself failed.
    async fn claim_next(&self, kind: WorkKind) -> Result<Option<WorkUnit>>;

    /// Apply the unit's effect. Must be idempotent per unit: applying the
    /// same unit twice leaves the same end state as applying it once.
    async fn apply_effect(&self, unit: &WorkUnit) -> Result<ApplyOutcome>;

    /// Retire a unit whose effect has been applied.
    async fn mark_applied(&self, unit: &WorkUnit) -> Result<()>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<()>;
}
