use crate::auth::require_bearer_token;
use crate::handlers::{auth, health, logs};
use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logs", post(logs::submit_log))
        .route("/logs/bulk", post(logs::submit_bulk))
        .route("/logs/search", get(logs::search))
        .route("/logs/summary/:agent_id", get(logs::summary))
        .route("/logs/:agent_id", get(logs::get_by_agent))
        .route("/logs/:agent_id/:step_id", get(logs::get_step).put(logs::update_review))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_bearer_token));

    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics));

    Router::new()
        .nest("/api/v1", protected.merge(public))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
