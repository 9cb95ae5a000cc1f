//! Ingestion and read routes under `/api/v1/logs`.

use crate::error::{ApiError, ApiResult};
use crate::responses::{AcceptedReceipt, BulkAcceptedReceipt};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use traceledger_bus::{subjects, Envelope};
use traceledger_core::{BulkSubmission, Error, NewLog, ReviewUpdate, UpdateLogRequest};
use traceledger_store::filter::{LogFilter, Pagination};
use traceledger_worker::classifier::{classify, NoHistory};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub trace_id: Option<String>,
    pub reviewed: Option<bool>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub agent_id: String,
    pub total_logs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub anomaly_count: u64,
    pub reviewed_count: u64,
    pub unreviewed_anomaly_count: u64,
    pub by_retention_tier: std::collections::HashMap<String, u64>,
}

fn pagination_from(page: Option<u32>, limit: Option<u32>, order: Option<&str>) -> Pagination {
    let limit = limit.unwrap_or(100).clamp(1, 1000);
    let page = page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;
    let ascending = matches!(order, Some(o) if o.eq_ignore_ascii_case("asc"));
    Pagination { limit, offset, ascending }
}

pub async fn submit_log(
    State(state): State<Arc<AppState>>,
    Json(new_log): Json<NewLog>,
) -> ApiResult<(axum::http::StatusCode, Json<AcceptedReceipt>)> {
    new_log.validate().map_err(Error::Validation)?;
    let anomalous = classify(&new_log, &NoHistory);

    let envelope = Envelope::new(serde_json::to_value(&new_log)?)
        .with_metadata(json!({ "initial_status": if anomalous { "anomaly" } else { "success" } }));
    let idempotency_key = envelope.idempotency_key().0;
    let event_id = envelope.id;

    state.bus.publish(subjects::LOGS_CREATE, envelope).await?;
    Ok((axum::http::StatusCode::ACCEPTED, Json(AcceptedReceipt { event_id, idempotency_key })))
}

pub async fn submit_bulk(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkSubmissionBody>,
) -> ApiResult<(axum::http::StatusCode, Json<BulkAcceptedReceipt>)> {
    if body.logs.is_empty() {
        return Err(ApiError(Error::Validation("logs must contain at least one entry".to_string())));
    }
    for log in &body.logs {
        log.validate().map_err(Error::Validation)?;
    }

    let batch_id = Uuid::new_v4();
    let submission = BulkSubmission { batch_id, logs: body.logs };
    let envelope = Envelope::new(serde_json::to_value(&submission)?);
    let idempotency_key = envelope.idempotency_key().0;
    let event_id = envelope.id;
    let count = submission.logs.len();

    state.bus.publish(subjects::LOGS_BULK, envelope).await?;
    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(BulkAcceptedReceipt { event_id, idempotency_key, batch_id, count }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct BulkSubmissionBody {
    pub logs: Vec<NewLog>,
}

pub async fn get_by_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<traceledger_store::LogQueryResult>> {
    let pagination = pagination_from(query.page, query.limit, query.order.as_deref());
    let filter = LogFilter { agent_id: Some(agent_id), ..Default::default() };
    let result = state.store.query(&filter, &pagination).await?;
    Ok(Json(result))
}

pub async fn get_step(
    State(state): State<Arc<AppState>>,
    Path((agent_id, step_id)): Path<(String, i64)>,
) -> ApiResult<Json<traceledger_core::log::Log>> {
    let key = traceledger_core::ids::LogKey::new(agent_id, step_id);
    let log = state.store.get(&key).await?;
    Ok(Json(log))
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Path((agent_id, step_id)): Path<(String, i64)>,
    Json(update): Json<ReviewUpdate>,
) -> ApiResult<(axum::http::StatusCode, Json<AcceptedReceipt>)> {
    let key = traceledger_core::ids::LogKey::new(agent_id.clone(), step_id);
    let current = state.store.get(&key).await?;
    if !current.is_mutation_eligible() {
        return Err(ApiError(Error::Conflict(format!(
            "log {key} is not eligible for review update (already reviewed and not anomalous)"
        ))));
    }

    let request = UpdateLogRequest { agent_id, step_id, update };
    let envelope = Envelope::new(serde_json::to_value(&request)?);
    let idempotency_key = envelope.idempotency_key().0;
    let event_id = envelope.id;

    state.bus.publish(subjects::LOGS_UPDATE, envelope).await?;
    Ok((axum::http::StatusCode::ACCEPTED, Json(AcceptedReceipt { event_id, idempotency_key })))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<traceledger_store::LogQueryResult>> {
    let (from_date, to_date) = match (query.from_date, query.to_date) {
        (Some(f), Some(t)) => (f, t),
        (Some(f), None) => (f, Utc::now()),
        (None, Some(t)) => (t - Duration::days(30), t),
        (None, None) => (Utc::now() - Duration::days(30), Utc::now()),
    };

    let filter = LogFilter {
        agent_id: query.agent_id.clone(),
        status: query.status.clone(),
        retention_tier: None,
        reviewed: query.reviewed,
        timestamp_range: Some((from_date, to_date)),
    };

    // `keyword` and `trace_id` aren't indexed columns the store filters on
    // directly; fetch a wider page and narrow in-process before paginating
    // to the caller's requested window.
    let ascending = matches!(query.order.as_deref(), Some(o) if o.eq_ignore_ascii_case("asc"));
    let wide_limit = query.limit.unwrap_or(100).clamp(1, 1000).saturating_mul(5).min(5000);
    let wide = Pagination { limit: wide_limit, offset: 0, ascending };
    let mut fetched = state.store.query(&filter, &wide).await?;

    if let Some(trace_id) = &query.trace_id {
        fetched.logs.retain(|log| log.trace_id.as_deref() == Some(trace_id.as_str()));
    }
    if let Some(keyword) = &query.keyword {
        let needle = keyword.to_lowercase();
        fetched.logs.retain(|log| log.reasoning.to_lowercase().contains(&needle));
    }

    let pagination = pagination_from(query.page, query.limit, query.order.as_deref());
    let total_count = fetched.logs.len() as u64;
    let start = pagination.offset as usize;
    let end = (start + pagination.limit as usize).min(fetched.logs.len());
    let page_logs = if start < fetched.logs.len() { fetched.logs[start..end].to_vec() } else { Vec::new() };

    Ok(Json(traceledger_store::LogQueryResult {
        logs: page_logs,
        total_count,
        offset: pagination.offset,
        limit: pagination.limit,
        has_more: (pagination.offset as u64 + pagination.limit as u64) < total_count,
    }))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let range = match (query.from_date, query.to_date) {
        (Some(from), Some(to)) => Some((from, to)),
        (Some(from), None) => Some((from, Utc::now())),
        (None, Some(to)) => Some((DateTime::<Utc>::MIN_UTC, to)),
        (None, None) => None,
    };
    let stats = state.store.stats(&agent_id, range).await?;
    Ok(Json(SummaryResponse {
        agent_id,
        total_logs: stats.total_logs,
        success_count: stats.success_count,
        failure_count: stats.failure_count,
        anomaly_count: stats.anomaly_count,
        reviewed_count: stats.reviewed_count,
        unreviewed_anomaly_count: stats.unreviewed_anomaly_count,
        by_retention_tier: stats.by_retention_tier,
    }))
}
