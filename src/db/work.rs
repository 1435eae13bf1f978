//! Work units on Postgres: producers, claims, and the idempotent effects.
//!
//! Each kind has its own pgmq queue whose payload is
//! `{"subject_id": "<avatar id>"}`. Effects recompute a derived counter
//! from its source rows and set it, so replaying a unit is harmless.

use crate::error::Result;
use crate::model::work::{ApplyOutcome, SubjectId, WorkKind, WorkUnit};
use crate::store::WorkStore;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

/// A message read more often than this is archived instead of handed out:
/// its effect has failed on every earlier delivery.
pub const MAX_DELIVERIES: i32 = 5;

/// Derived counters stored on an avatar row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AvatarCounters {
    pub thumbnail_count: i64,
    pub total_serve_seconds: i64,
}

impl super::Db {
    /// Queue a unit for `subject_id`. Returns the pgmq message ID.
    pub async fn enqueue(&self, kind: WorkKind, subject_id: &SubjectId) -> Result<i64> {
        self.send_to_queue(kind.queue_name(), &json!({ "subject_id": subject_id }))
            .await
    }

    /// Create an avatar row if it does not exist yet.
    pub async fn ensure_avatar(&self, subject_id: &SubjectId) -> Result<()> {
        sqlx::query("INSERT INTO avatars (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(subject_id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record a new thumbnail and queue a recount, atomically.
    pub async fn record_thumbnail(&self, subject_id: &SubjectId) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO thumbnails (id, avatar_id) VALUES ($1, $2)")
            .bind(id)
            .bind(subject_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("SELECT pgmq.send($1, $2)")
            .bind(WorkKind::ThumbnailCount.queue_name())
            .bind(json!({ "subject_id": subject_id }))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Record served seconds and queue a re-total, atomically.
    pub async fn record_serve_time(&self, subject_id: &SubjectId, seconds: i64) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO serve_time_records (id, avatar_id, seconds) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(subject_id.as_str())
            .bind(seconds)
            .execute(&mut *tx)
            .await?;
        sqlx::query("SELECT pgmq.send($1, $2)")
            .bind(WorkKind::ServeTime.queue_name())
            .bind(json!({ "subject_id": subject_id }))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Current derived counters of an avatar.
    pub async fn avatar_counters(&self, subject_id: &SubjectId) -> Result<Option<AvatarCounters>> {
        let row = sqlx::query_as(
            "SELECT thumbnail_count, total_serve_seconds FROM avatars WHERE id = $1",
        )
        .bind(subject_id.as_str())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl WorkStore for super::Db {
    async fn claim_next(&self, kind: WorkKind) -> Result<Option<WorkUnit>> {
        loop {
            let Some(msg) = self
                .read_from_queue(kind.queue_name(), self.visibility_timeout)
                .await?
            else {
                return Ok(None);
            };

            if msg.read_ct > MAX_DELIVERIES {
                warn!(
                    queue = kind.queue_name(),
                    msg_id = msg.msg_id,
                    read_ct = msg.read_ct,
                    enqueued_at = %msg.enqueued_at,
                    payload = %msg.message,
                    "archiving work message after repeated failed deliveries"
                );
                self.archive_message(kind.queue_name(), msg.msg_id).await?;
                continue;
            }

            let subject = msg
                .message
                .get("subject_id")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty());

            match subject {
                Some(subject) => {
                    return Ok(Some(WorkUnit {
                        subject_id: SubjectId::new(subject),
                        kind,
                        receipt: msg.msg_id,
                    }));
                }
                None => {
                    // Unusable payload: no subject to report it under.
                    // Archive it so it cannot wedge the queue.
                    warn!(
                        queue = kind.queue_name(),
                        msg_id = msg.msg_id,
                        enqueued_at = %msg.enqueued_at,
                        payload = %msg.message,
                        "archiving work message without subject_id"
                    );
                    self.archive_message(kind.queue_name(), msg.msg_id).await?;
                }
            }
        }
    }

    async fn apply_effect(&self, unit: &WorkUnit) -> Result<ApplyOutcome> {
        let sql = match unit.kind {
            WorkKind::ThumbnailCount => {
                "UPDATE avatars
                 SET thumbnail_count = (SELECT count(*) FROM thumbnails WHERE avatar_id = $1),
                     updated_at = now()
                 WHERE id = $1
                 RETURNING thumbnail_count"
            }
            WorkKind::ServeTime => {
                "UPDATE avatars
                 SET total_serve_seconds = (
                         SELECT COALESCE(sum(seconds), 0)::BIGINT
                         FROM serve_time_records WHERE avatar_id = $1),
                     updated_at = now()
                 WHERE id = $1
                 RETURNING total_serve_seconds"
            }
        };

        let row: Option<(i64,)> = sqlx::query_as(sql)
            .bind(unit.subject_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(match (unit.kind, row) {
            (_, None) => ApplyOutcome::rejected(format!("unknown avatar {}", unit.subject_id)),
            (WorkKind::ThumbnailCount, Some((count,))) => {
                ApplyOutcome::applied(json!(count), format!("thumbnail count set to {count}"))
            }
            (WorkKind::ServeTime, Some((total,))) => {
                ApplyOutcome::applied(json!(total), format!("serve time set to {total}s"))
            }
        })
    }

    async fn mark_applied(&self, unit: &WorkUnit) -> Result<()> {
        if !self
            .archive_message(unit.kind.queue_name(), unit.receipt)
            .await?
        {
            // Claim lapsed and another drain already retired it. The effect
            // is idempotent, so nothing is lost.
            warn!(
                kind = %unit.kind,
                msg_id = unit.receipt,
                "work message already archived"
            );
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.ping().await
    }
}
