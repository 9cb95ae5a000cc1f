//! Identifiers shared across the ingestion pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The key carried by every event-bus message. The worker's idempotency
/// cache is keyed on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub Uuid);

impl IdempotencyKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying a single log: unique per `(agent_id, step_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogKey {
    pub agent_id: String,
    pub step_id: i64,
}

impl LogKey {
    pub fn new(agent_id: impl Into<String>, step_id: i64) -> Self {
        Self { agent_id: agent_id.into(), step_id }
    }
}

impl std::fmt::Display for LogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.agent_id, self.step_id)
    }
}
