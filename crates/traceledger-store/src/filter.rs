use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use traceledger_core::log::Log;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub retention_tier: Option<String>,
    pub reviewed: Option<bool>,
    pub timestamp_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub ascending: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 100, offset: 0, ascending: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQueryResult {
    pub logs: Vec<Log>,
    pub total_count: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub total_logs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub anomaly_count: u64,
    pub reviewed_count: u64,
    pub unreviewed_anomaly_count: u64,
    pub by_retention_tier: HashMap<String, u64>,
}
