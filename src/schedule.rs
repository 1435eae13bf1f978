//! Timer-driven drain trigger.
//!
//! One loop per scheduled kind: wait for the tick, drain with the
//! configured timeout, log the summary, repeat until shutdown. Loops share
//! nothing but the store, so a slow kind never delays another.

use crate::config::{DrainSchedule, ScheduledDrain};
use crate::drain::drain_with_timeout;
use crate::error::Result;
use crate::store::WorkStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runs the configured drains on their intervals.
#[derive(Clone)]
pub struct DrainScheduler {
    store: Arc<dyn WorkStore>,
    schedule: DrainSchedule,
    shutdown: Arc<watch::Sender<bool>>,
}

impl DrainScheduler {
    pub fn new(store: Arc<dyn WorkStore>, schedule: DrainSchedule) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            schedule,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Signal every drain loop to stop after its current run.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run all drain loops until shutdown.
    pub async fn run(&self) -> Result<()> {
        if self.schedule.drains.is_empty() {
            info!("no drains scheduled");
            return Ok(());
        }

        let mut loops = JoinSet::new();
        for entry in self.schedule.drains.iter().cloned() {
            info!(
                kind = %entry.kind,
                interval_secs = entry.interval_secs,
                "scheduling drain"
            );
            loops.spawn(drain_periodically(
                Arc::clone(&self.store),
                entry,
                self.shutdown.subscribe(),
            ));
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!("drain loop aborted: {e}");
            }
        }
        info!("drain scheduler stopped");
        Ok(())
    }
}

async fn drain_periodically(
    store: Arc<dyn WorkStore>,
    entry: ScheduledDrain,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(entry.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let stopped = *stop.borrow();
        if stopped {
            return;
        }
        tokio::select! {
            _ = stop.changed() => return,
            _ = ticker.tick() => {}
        }

        let report = drain_with_timeout(store.as_ref(), entry.kind, entry.timeout()).await;
        if let Some(ref e) = report.error {
            warn!(
                kind = %entry.kind,
                processed = report.processed_count,
                failed = report.failed_count,
                error = %e,
                "scheduled drain ended with error"
            );
        }
    }
}
