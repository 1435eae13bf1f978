//! Tests for the timer-driven drain scheduler and the health monitor.

use avatar_core::config::{DrainSchedule, ScheduledDrain};
use avatar_core::health::{HealthMonitor, HealthStatus};
use avatar_core::model::work::{SubjectId, WorkKind};
use avatar_core::schedule::DrainScheduler;
use avatar_core::store::memory::SubjectRecord;
use avatar_core::store::{InMemoryStore, WorkStore};
use std::sync::Arc;
use std::time::Duration;

async fn wait_until_drained(store: &InMemoryStore, kind: WorkKind) {
    for _ in 0..100 {
        if store.pending(kind).await == 0 && store.in_flight().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue {kind} was never drained");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_drains_on_first_tick_and_stops() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put_subject(
            SubjectId::new("a"),
            SubjectRecord {
                serve_records: vec![10, 20],
                ..Default::default()
            },
        )
        .await;
    store.enqueue(WorkKind::ServeTime, SubjectId::new("a")).await;

    let schedule = DrainSchedule {
        drains: vec![ScheduledDrain {
            kind: WorkKind::ServeTime,
            interval_secs: 60,
            timeout_secs: Some(5),
        }],
    };
    let scheduler = DrainScheduler::new(Arc::clone(&store) as Arc<dyn WorkStore>, schedule);
    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    wait_until_drained(&store, WorkKind::ServeTime).await;
    let record = store.subject(&SubjectId::new("a")).await.unwrap();
    assert_eq!(record.total_serve_seconds, Some(30));

    scheduler.shutdown();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn empty_schedule_returns_immediately() {
    let store: Arc<dyn WorkStore> = Arc::new(InMemoryStore::new());
    let scheduler = DrainScheduler::new(store, DrainSchedule::default());
    scheduler.run().await.unwrap();
}

#[tokio::test]
async fn health_monitor_tracks_store() {
    let store = Arc::new(InMemoryStore::new());
    let monitor = HealthMonitor::new(
        Arc::clone(&store) as Arc<dyn WorkStore>,
        Duration::from_secs(60),
    );
    let status = monitor.subscribe();
    assert_eq!(*status.borrow(), HealthStatus::Unknown);

    assert_eq!(monitor.probe().await, HealthStatus::Healthy);
    assert_eq!(*status.borrow(), HealthStatus::Healthy);

    store.fail_claims_after(0).await;
    assert!(matches!(monitor.probe().await, HealthStatus::Unhealthy(_)));
    assert!(matches!(*status.borrow(), HealthStatus::Unhealthy(_)));
}

#[tokio::test]
async fn health_monitor_stops_on_shutdown() {
    let store: Arc<dyn WorkStore> = Arc::new(InMemoryStore::new());
    let monitor = Arc::new(HealthMonitor::new(store, Duration::from_secs(60)));
    let shutdown = monitor.shutdown_handle();

    let handle = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run().await }
    });
    shutdown.notify_one();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
}
