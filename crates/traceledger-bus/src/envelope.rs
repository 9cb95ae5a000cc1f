//! The wire envelope carried by every bus message:
//! `{id, timestamp, data, metadata}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use traceledger_core::ids::IdempotencyKey;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Doubles as the idempotency key the worker dedups on.
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    #[serde(default)]
    pub metadata: Value,
}

impl Envelope {
    pub fn new(data: Value) -> Self {
        Self {
            id: IdempotencyKey::new().0,
            timestamp: Utc::now(),
            data,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey(self.id)
    }

    pub fn approx_bytes(&self) -> u64 {
        serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0)
    }
}

/// Metadata attached by the bus when a message is routed to a dead-letter
/// subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterMetadata {
    pub original_subject: String,
    pub last_error: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}
