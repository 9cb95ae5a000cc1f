//! Payloads carried over the event bus between the API, the worker, and the
//! notifier. Kept in core so every crate that needs to serialize or
//! deserialize an envelope's `data` field shares one definition.

use crate::log::{NewLog, ReviewUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSubmission {
    pub batch_id: Uuid,
    pub logs: Vec<NewLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLogRequest {
    pub agent_id: String,
    pub step_id: i64,
    pub update: ReviewUpdate,
}
