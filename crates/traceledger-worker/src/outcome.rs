use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCreated {
    pub agent_id: String,
    pub step_id: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogUpdated {
    pub agent_id: String,
    pub step_id: i64,
    pub version: u32,
    pub reviewed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLogsCreated {
    pub batch_id: Uuid,
    pub created: Vec<LogCreated>,
    pub failed_count: usize,
}
