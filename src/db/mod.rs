//! Database connection pool, migrations, and health check.
//!
//! Postgres holds both the avatar counters the drain effects write and the
//! pgmq queues the work units wait on.

pub mod pgmq;
pub mod work;

use crate::error::Result;
use crate::model::work::WorkKind;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Default pgmq visibility timeout for claimed units, in seconds. Longer
/// than the default drain timeout, so a run never meets its own lapsed
/// claims.
pub const DEFAULT_VISIBILITY_TIMEOUT: i32 = 360;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
    visibility_timeout: i32,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        })
    }

    /// How long a claimed unit stays invisible to other drains before it
    /// can be claimed again.
    pub fn with_visibility_timeout(mut self, seconds: i32) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Create the pgmq queue for every work kind (idempotent).
    pub async fn ensure_queues(&self) -> Result<()> {
        for kind in WorkKind::ALL {
            self.create_queue(kind.queue_name()).await?;
        }
        Ok(())
    }

    /// Round-trip a SELECT 1.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
