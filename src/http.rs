//! HTTP trigger surface.
//!
//! `POST /drain/:kind` runs one drain synchronously and returns its
//! report. A report with `error` set is still a 200: partial progress is a
//! legitimate outcome and the body says what happened.

use crate::drain::drain_with_timeout;
use crate::health::HealthStatus;
use crate::model::report::RunReport;
use crate::model::work::WorkKind;
use crate::store::WorkStore;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Shared handler state.
pub struct AppState {
    pub store: Arc<dyn WorkStore>,
    pub drain_timeout: Duration,
    pub health: watch::Receiver<HealthStatus>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/drain/:kind", post(http_drain))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let status = state.health.borrow().clone();
    match status {
        HealthStatus::Healthy => (StatusCode::OK, "ok".to_string()),
        HealthStatus::Unknown => (
            StatusCode::SERVICE_UNAVAILABLE,
            "store not probed yet".to_string(),
        ),
        HealthStatus::Unhealthy(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}

async fn http_drain(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<RunReport>, ApiError> {
    let kind: WorkKind = kind.parse().map_err(|e: crate::error::Error| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
    })?;

    let report = drain_with_timeout(state.store.as_ref(), kind, state.drain_timeout).await;
    Ok(Json(report))
}
