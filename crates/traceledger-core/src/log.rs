//! The `Log` data model: a single decision step emitted by an agent,
//! immutable after insert except for its review fields.

use crate::canonical::canonical_hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
    Anomaly,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failure => "failure",
            LogStatus::Anomaly => "anomaly",
        }
    }
}

/// Storage class governing how long a log is retained before expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionTier {
    Hot,
    Warm,
    Cold,
}

impl RetentionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionTier::Hot => "hot",
            RetentionTier::Warm => "warm",
            RetentionTier::Cold => "cold",
        }
    }

    /// Derive the tier from the age of a log at the time it is written (or
    /// re-evaluated at a Merkle window rollover). Bounds are inclusive at the
    /// lower edge: a log exactly `hot_days` old is still `Hot`.
    pub fn from_age(age: chrono::Duration, hot_days: i64, warm_days: i64) -> Self {
        if age <= chrono::Duration::days(hot_days) {
            RetentionTier::Hot
        } else if age <= chrono::Duration::days(warm_days) {
            RetentionTier::Warm
        } else {
            RetentionTier::Cold
        }
    }
}

/// One decision-step record. Immutable after insert except for `reviewed`,
/// `review_comments`, and the bookkeeping fields `version`/`content_hash`
/// that change alongside a review update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub agent_id: String,
    pub step_id: i64,
    pub trace_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub input_data: Value,
    pub output: Value,
    pub reasoning: String,
    pub status: LogStatus,
    pub reviewed: bool,
    pub review_comments: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub version: u32,
    pub retention_tier: RetentionTier,
    pub content_hash: [u8; 32],
}

impl Log {
    /// Recompute the content hash as a pure function of the fields the spec
    /// names: `(agent_id, step_id, timestamp, input_data, output, reasoning,
    /// status, version)`. Never includes review fields or retention tier —
    /// those are mutable/derived, not part of the log's semantic identity.
    pub fn compute_content_hash(&self) -> [u8; 32] {
        let canonical = serde_json::json!({
            "agent_id": self.agent_id,
            "step_id": self.step_id,
            "timestamp": self.timestamp.timestamp_nanos_opt().unwrap_or(0),
            "input_data": self.input_data,
            "output": self.output,
            "reasoning": self.reasoning,
            "status": self.status.as_str(),
            "version": self.version,
        });
        canonical_hash(&canonical)
    }

    /// `content_hash(L) == stored_hash(L)` — the invariant checked on load.
    pub fn verify_content_hash(&self) -> bool {
        self.compute_content_hash() == self.content_hash
    }

    /// A log can be mutated by a review update unless its status is not
    /// `anomaly` and it has already been reviewed.
    pub fn is_mutation_eligible(&self) -> bool {
        !(self.status != LogStatus::Anomaly && self.reviewed)
    }
}

/// Input accepted when submitting a log, before status/version/hash are
/// assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLog {
    pub agent_id: String,
    pub step_id: i64,
    pub trace_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub input_data: Value,
    pub output: Value,
    pub reasoning: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl NewLog {
    /// Required-field validation shared between the API and the worker.
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.agent_id.trim().is_empty() {
            return Err("agent_id is required".to_string());
        }
        if self.reasoning.trim().is_empty() {
            return Err("reasoning is required".to_string());
        }
        if self.input_data.is_null() {
            return Err("input_data is required".to_string());
        }
        if self.output.is_null() {
            return Err("output is required".to_string());
        }
        Ok(())
    }
}

/// Input accepted when updating a log's review fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub reviewed: bool,
    pub review_comments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> Log {
        Log {
            agent_id: "a1".into(),
            step_id: 1,
            trace_id: None,
            user_id: None,
            timestamp: Utc::now(),
            input_data: json!({}),
            output: json!({}),
            reasoning: "a valid reasoning string".into(),
            status: LogStatus::Success,
            reviewed: false,
            review_comments: None,
            metadata: HashMap::new(),
            version: 1,
            retention_tier: RetentionTier::Hot,
            content_hash: [0u8; 32],
        }
    }

    #[test]
    fn content_hash_is_pure_function_of_identity_fields() {
        let mut log = sample_log();
        log.content_hash = log.compute_content_hash();
        assert!(log.verify_content_hash());

        // Mutating a review field does not change the hash.
        log.reviewed = true;
        log.review_comments = Some("checked".into());
        assert!(log.verify_content_hash());

        // Mutating an identity field does.
        log.reasoning = "a different reasoning string".into();
        assert!(!log.verify_content_hash());
    }

    #[test]
    fn mutation_eligibility_follows_status_and_reviewed() {
        let mut log = sample_log();
        log.status = LogStatus::Anomaly;
        log.reviewed = true;
        assert!(log.is_mutation_eligible(), "anomaly logs stay eligible even once reviewed");

        log.status = LogStatus::Success;
        assert!(!log.is_mutation_eligible(), "reviewed non-anomaly logs are no longer eligible");

        log.reviewed = false;
        assert!(log.is_mutation_eligible());
    }

    #[test]
    fn retention_tier_bounds_are_inclusive_at_lower_edge() {
        assert_eq!(RetentionTier::from_age(chrono::Duration::days(30), 30, 365), RetentionTier::Hot);
        assert_eq!(RetentionTier::from_age(chrono::Duration::days(31), 30, 365), RetentionTier::Warm);
        assert_eq!(RetentionTier::from_age(chrono::Duration::days(365), 30, 365), RetentionTier::Warm);
        assert_eq!(RetentionTier::from_age(chrono::Duration::days(366), 30, 365), RetentionTier::Cold);
    }
}
