//! Health/operations routes: never require a bearer token.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Readiness additionally confirms the store connection is usable by
/// running a trivial stats query against a sentinel agent id.
pub async fn readyz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthBody>) {
    match state.store.stats("__readiness_probe__", None).await {
        Ok(_) => (StatusCode::OK, Json(HealthBody { status: "ready" })),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(HealthBody { status: "not_ready" })),
    }
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<traceledger_bus::BusHealth> {
    Json(state.bus.health().await)
}
