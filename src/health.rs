//! Store health polling, decoupled from draining.
//!
//! Runs as its own task with its own shutdown handle and publishes the
//! latest probe result on a watch channel for the HTTP surface to read.

use crate::store::WorkStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{info, warn};

/// Latest known store health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// No probe has completed yet.
    Unknown,
    Healthy,
    Unhealthy(String),
}

/// Periodically probes the store.
pub struct HealthMonitor {
    store: Arc<dyn WorkStore>,
    interval: Duration,
    status: watch::Sender<HealthStatus>,
    shutdown: Arc<Notify>,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn WorkStore>, interval: Duration) -> Self {
        let (status, _) = watch::channel(HealthStatus::Unknown);
        Self {
            store,
            interval,
            status,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Receiver that always holds the latest status.
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.subscribe()
    }

    /// Handle that stops [`HealthMonitor::run`] when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Probe once and publish the result.
    pub async fn probe(&self) -> HealthStatus {
        let status = match self.store.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };

        let changed = *self.status.borrow() != status;
        if changed {
            match status {
                HealthStatus::Unhealthy(ref reason) => warn!(%reason, "store unhealthy"),
                _ => info!(?status, "store health changed"),
            }
        }
        self.status.send_replace(status.clone());
        status
    }

    /// Probe every interval until shutdown.
    pub async fn run(&self) {
        loop {
            self.probe().await;
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("health monitor shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
