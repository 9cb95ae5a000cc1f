use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a single stream's backlog, used by the
/// health/readiness endpoints and by tests that assert drain behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamHealth {
    pub subject: String,
    pub pending_depth: u64,
    pub in_flight: u64,
    pub dead_lettered: u64,
    pub approx_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusHealth {
    pub streams: Vec<StreamHealth>,
}

impl BusHealth {
    pub fn total_pending(&self) -> u64 {
        self.streams.iter().map(|s| s.pending_depth).sum()
    }

    pub fn total_in_flight(&self) -> u64 {
        self.streams.iter().map(|s| s.in_flight).sum()
    }
}
