//! In-memory work store.
//!
//! Mirrors the Postgres store's semantics closely enough for tests and
//! local runs: claims hand each unit to one caller, effects set derived
//! counters to a computed value, and an unapplied claim goes back to the
//! queue once its visibility timeout lapses, as with pgmq.
//! [`InMemoryStore::release_in_flight`] lapses every claim at once.

use crate::error::{Error, Result};
use crate::model::work::{ApplyOutcome, SubjectId, WorkKind, WorkUnit};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::WorkStore;

/// Source data and derived counters for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectRecord {
    /// Number of thumbnails the subject owns.
    pub thumbnails: u64,
    /// Serve-time accumulation records, in seconds.
    pub serve_records: Vec<u64>,
    /// Derived: last computed thumbnail count.
    pub thumbnail_count: Option<u64>,
    /// Derived: last computed total serve time.
    pub total_serve_seconds: Option<u64>,
}

#[derive(Debug)]
struct Claim {
    kind: WorkKind,
    subject_id: SubjectId,
    claimed_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    next_receipt: i64,
    pending: HashMap<WorkKind, VecDeque<(i64, SubjectId)>>,
    in_flight: HashMap<i64, Claim>,
    subjects: HashMap<SubjectId, SubjectRecord>,
    /// Subjects whose effect errors out, with the error text.
    poisoned: HashMap<SubjectId, String>,
    /// Remaining successful claims before every claim fails.
    claims_before_outage: Option<usize>,
}

impl Inner {
    /// Requeue claims older than `visibility`, oldest receipt first.
    fn requeue_lapsed(&mut self, visibility: Option<Duration>) -> usize {
        let mut lapsed: Vec<i64> = self
            .in_flight
            .iter()
            .filter(|(_, claim)| visibility.is_none_or(|v| claim.claimed_at.elapsed() >= v))
            .map(|(receipt, _)| *receipt)
            .collect();
        lapsed.sort_unstable();

        for receipt in &lapsed {
            if let Some(claim) = self.in_flight.remove(receipt) {
                self.pending
                    .entry(claim.kind)
                    .or_default()
                    .push_back((*receipt, claim.subject_id));
            }
        }
        lapsed.len()
    }
}

/// Work store held entirely in process memory.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    visibility_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            inner: Mutex::default(),
            visibility_timeout: Duration::from_secs(
                crate::db::DEFAULT_VISIBILITY_TIMEOUT.unsigned_abs().into(),
            ),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a claim stays hidden from other claimers.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Insert or replace a subject's source data.
    pub async fn put_subject(&self, id: SubjectId, record: SubjectRecord) {
        self.inner.lock().await.subjects.insert(id, record);
    }

    /// Current state of a subject.
    pub async fn subject(&self, id: &SubjectId) -> Option<SubjectRecord> {
        self.inner.lock().await.subjects.get(id).cloned()
    }

    /// Enqueue a unit. Returns its receipt.
    pub async fn enqueue(&self, kind: WorkKind, subject_id: SubjectId) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.next_receipt += 1;
        let receipt = inner.next_receipt;
        inner
            .pending
            .entry(kind)
            .or_default()
            .push_back((receipt, subject_id));
        receipt
    }

    /// Make applying any unit for `subject_id` fail with `error`.
    pub async fn poison(&self, subject_id: SubjectId, error: impl Into<String>) {
        self.inner
            .lock()
            .await
            .poisoned
            .insert(subject_id, error.into());
    }

    /// Let `n` more claims succeed, then fail every claim after that.
    pub async fn fail_claims_after(&self, n: usize) {
        self.inner.lock().await.claims_before_outage = Some(n);
    }

    /// Number of units still waiting to be claimed.
    pub async fn pending(&self, kind: WorkKind) -> usize {
        self.inner
            .lock()
            .await
            .pending
            .get(&kind)
            .map_or(0, VecDeque::len)
    }

    /// Number of claimed units not yet marked applied.
    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    /// Return every unapplied claim to the back of its queue now.
    pub async fn release_in_flight(&self) -> usize {
        self.inner.lock().await.requeue_lapsed(None)
    }
}

#[async_trait]
impl WorkStore for InMemoryStore {
    async fn claim_next(&self, kind: WorkKind) -> Result<Option<WorkUnit>> {
        let mut inner = self.inner.lock().await;

        if let Some(remaining) = inner.claims_before_outage.as_mut() {
            if *remaining == 0 {
                return Err(Error::Other(format!("store unavailable: claim {kind}")));
            }
            *remaining -= 1;
        }

        inner.requeue_lapsed(Some(self.visibility_timeout));
        let Some((receipt, subject_id)) = inner.pending.get_mut(&kind).and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };

        inner.in_flight.insert(
            receipt,
            Claim {
                kind,
                subject_id: subject_id.clone(),
                claimed_at: Instant::now(),
            },
        );

        Ok(Some(WorkUnit {
            subject_id,
            kind,
            receipt,
        }))
    }

    async fn apply_effect(&self, unit: &WorkUnit) -> Result<ApplyOutcome> {
        let mut inner = self.inner.lock().await;

        if let Some(error) = inner.poisoned.get(&unit.subject_id) {
            return Err(Error::Other(error.clone()));
        }

        let Some(record) = inner.subjects.get_mut(&unit.subject_id) else {
            return Ok(ApplyOutcome::rejected(format!(
                "unknown subject {}",
                unit.subject_id
            )));
        };

        let outcome = match unit.kind {
            WorkKind::ThumbnailCount => {
                let count = record.thumbnails;
                record.thumbnail_count = Some(count);
                ApplyOutcome::applied(json!(count), format!("thumbnail count set to {count}"))
            }
            WorkKind::ServeTime => {
                let total: u64 = record.serve_records.iter().sum();
                record.total_serve_seconds = Some(total);
                ApplyOutcome::applied(json!(total), format!("serve time set to {total}s"))
            }
        };
        Ok(outcome)
    }

    async fn mark_applied(&self, unit: &WorkUnit) -> Result<()> {
        self.inner
            .lock()
            .await
            .in_flight
            .remove(&unit.receipt)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("claim {} for {}", unit.receipt, unit.subject_id)))
    }

    async fn health_check(&self) -> Result<()> {
        match self.inner.lock().await.claims_before_outage {
            Some(0) => Err(Error::Other("store unavailable".to_string())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id)
    }

    #[tokio::test]
    async fn claim_hands_each_unit_out_once() {
        let store = InMemoryStore::new();
        store.enqueue(WorkKind::ThumbnailCount, subject("a")).await;

        let first = store.claim_next(WorkKind::ThumbnailCount).await.unwrap();
        let second = store.claim_next(WorkKind::ThumbnailCount).await.unwrap();

        assert_eq!(first.map(|u| u.subject_id), Some(subject("a")));
        assert!(second.is_none());
        assert_eq!(store.in_flight().await, 1);
    }

    #[tokio::test]
    async fn kinds_are_separate_queues() {
        let store = InMemoryStore::new();
        store.enqueue(WorkKind::ServeTime, subject("a")).await;

        assert!(store.claim_next(WorkKind::ThumbnailCount).await.unwrap().is_none());
        assert!(store.claim_next(WorkKind::ServeTime).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn released_claims_are_claimable_again() {
        let store = InMemoryStore::new();
        store.enqueue(WorkKind::ServeTime, subject("a")).await;
        let unit = store.claim_next(WorkKind::ServeTime).await.unwrap().unwrap();

        assert_eq!(store.release_in_flight().await, 1);
        let again = store.claim_next(WorkKind::ServeTime).await.unwrap().unwrap();
        assert_eq!(again.receipt, unit.receipt);
    }

    #[tokio::test]
    async fn lapsed_claims_return_on_the_next_claim() {
        let store = InMemoryStore::new().with_visibility_timeout(Duration::from_millis(20));
        store.enqueue(WorkKind::ThumbnailCount, subject("a")).await;
        let unit = store
            .claim_next(WorkKind::ThumbnailCount)
            .await
            .unwrap()
            .unwrap();

        assert!(store.claim_next(WorkKind::ThumbnailCount).await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(40)).await;

        let again = store
            .claim_next(WorkKind::ThumbnailCount)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.receipt, unit.receipt);
        assert_eq!(store.in_flight().await, 1);
    }

    #[tokio::test]
    async fn mark_applied_twice_is_not_found() {
        let store = InMemoryStore::new();
        store.enqueue(WorkKind::ServeTime, subject("a")).await;
        let unit = store.claim_next(WorkKind::ServeTime).await.unwrap().unwrap();

        store.mark_applied(&unit).await.unwrap();
        assert!(matches!(
            store.mark_applied(&unit).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn outage_fails_claims_and_health() {
        let store = InMemoryStore::new();
        store.fail_claims_after(0).await;

        assert!(store.claim_next(WorkKind::ServeTime).await.is_err());
        assert!(store.health_check().await.is_err());
    }
}
