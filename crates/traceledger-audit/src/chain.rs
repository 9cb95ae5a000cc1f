//! Append-only, hash-linked audit chain. Stored as a flat array with a tail
//! pointer rather than a pointer graph: appends are O(1), verification is a
//! single linear scan, and there is nothing to traverse or garbage collect.

use crate::window::FinalizedWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use traceledger_core::canonical::combine_hashes;
use traceledger_core::ids::LogKey;
use traceledger_core::log::ReviewUpdate;

pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// The kind of event an `AuditEntry` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntryType {
    LogCreated,
    LogUpdated,
    WindowFinalized,
}

impl AuditEntryType {
    fn domain_tag(&self) -> &'static str {
        match self {
            AuditEntryType::LogCreated => "LOG_CREATED",
            AuditEntryType::LogUpdated => "LOG_UPDATED",
            AuditEntryType::WindowFinalized => "WINDOW_FINALIZED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub entry_type: AuditEntryType,
    /// Set for `LOG_CREATED`/`LOG_UPDATED`, `None` for `WINDOW_FINALIZED`.
    pub agent_id: Option<String>,
    pub step_id: Option<i64>,
    pub content_hash: [u8; 32],
    pub prev_hash: [u8; 32],
    pub entry_hash: [u8; 32],
    pub recorded_at: DateTime<Utc>,
    /// The review fields applied, set only on `LOG_UPDATED` entries.
    pub updates: Option<ReviewUpdate>,
    /// The window that was closed, set only on `WINDOW_FINALIZED` entries.
    pub window: Option<FinalizedWindow>,
    /// Initiator/source/reason, or any other bookkeeping a caller wants
    /// attached. Empty unless set.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AuditEntry {
    pub fn compute_entry_hash(
        sequence: u64,
        entry_type: AuditEntryType,
        content_hash: &[u8; 32],
        prev_hash: &[u8; 32],
    ) -> [u8; 32] {
        let seq_hash = blake3::hash(&sequence.to_be_bytes());
        let type_hash = blake3::hash(entry_type.domain_tag().as_bytes());
        let linked = combine_hashes("traceledger-audit-link", prev_hash, seq_hash.as_bytes());
        let typed = combine_hashes("traceledger-audit-type", &linked, type_hash.as_bytes());
        combine_hashes("traceledger-audit-entry", &typed, content_hash)
    }
}

/// The append-only chain itself. Not thread-safe on its own; callers
/// serialize mutation through a single lock (see `AuditService`).
#[derive(Debug, Default)]
pub struct AuditChain {
    entries: Vec<AuditEntry>,
}

impl AuditChain {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn tail_hash(&self) -> [u8; 32] {
        self.entries.last().map(|e| e.entry_hash).unwrap_or(GENESIS_HASH)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &mut self,
        entry_type: AuditEntryType,
        agent_id: Option<String>,
        step_id: Option<i64>,
        content_hash: [u8; 32],
        recorded_at: DateTime<Utc>,
        updates: Option<ReviewUpdate>,
        window: Option<FinalizedWindow>,
    ) -> AuditEntry {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.tail_hash();
        let entry_hash = AuditEntry::compute_entry_hash(sequence, entry_type, &content_hash, &prev_hash);
        let entry = AuditEntry {
            sequence,
            entry_type,
            agent_id,
            step_id,
            content_hash,
            prev_hash,
            entry_hash,
            recorded_at,
            updates,
            window,
            metadata: HashMap::new(),
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Append a `LOG_CREATED` entry linked to the current tail.
    pub fn append_log_created(&mut self, key: &LogKey, content_hash: [u8; 32], recorded_at: DateTime<Utc>) -> AuditEntry {
        self.append(AuditEntryType::LogCreated, Some(key.agent_id.clone()), Some(key.step_id), content_hash, recorded_at, None, None)
    }

    /// Append a `LOG_UPDATED` entry, carrying the review fields that changed.
    pub fn append_log_updated(
        &mut self,
        key: &LogKey,
        content_hash: [u8; 32],
        recorded_at: DateTime<Utc>,
        updates: ReviewUpdate,
    ) -> AuditEntry {
        self.append(
            AuditEntryType::LogUpdated,
            Some(key.agent_id.clone()),
            Some(key.step_id),
            content_hash,
            recorded_at,
            Some(updates),
            None,
        )
    }

    /// Append a `WINDOW_FINALIZED` entry, carrying the finalized root and
    /// hash count, linking the chain to the window it just closed.
    pub fn append_window_finalized(&mut self, window: FinalizedWindow, recorded_at: DateTime<Utc>) -> AuditEntry {
        let content_hash = window.merkle_root;
        self.append(AuditEntryType::WindowFinalized, None, None, content_hash, recorded_at, None, Some(window))
    }

    /// Walk the whole chain and confirm every `prev_hash`/`entry_hash` link
    /// is internally consistent, starting from the genesis hash.
    pub fn verify_integrity(&self) -> bool {
        let mut expected_prev = GENESIS_HASH;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.sequence != i as u64 {
                return false;
            }
            if entry.prev_hash != expected_prev {
                return false;
            }
            let recomputed =
                AuditEntry::compute_entry_hash(entry.sequence, entry.entry_type, &entry.content_hash, &entry.prev_hash);
            if recomputed != entry.entry_hash {
                return false;
            }
            expected_prev = entry.entry_hash;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appending_links_each_entry_to_its_predecessor() {
        let mut chain = AuditChain::new();
        let a = chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        let b = chain.append_log_created(&LogKey::new("agent-1", 2), [2u8; 32], Utc::now());
        assert_eq!(a.prev_hash, GENESIS_HASH);
        assert_eq!(b.prev_hash, a.entry_hash);
        assert!(chain.verify_integrity());
    }

    #[test]
    fn tampering_with_an_entry_breaks_integrity() {
        let mut chain = AuditChain::new();
        chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        chain.append_log_created(&LogKey::new("agent-1", 2), [2u8; 32], Utc::now());
        chain.entries[0].content_hash = [9u8; 32];
        assert!(!chain.verify_integrity());
    }

    #[test]
    fn update_entries_carry_the_applied_review_fields() {
        let mut chain = AuditChain::new();
        let key = LogKey::new("agent-1", 1);
        chain.append_log_created(&key, [1u8; 32], Utc::now());
        let update = ReviewUpdate { reviewed: true, review_comments: Some("checked".to_string()) };
        let entry = chain.append_log_updated(&key, [2u8; 32], Utc::now(), update.clone());

        assert_eq!(entry.entry_type, AuditEntryType::LogUpdated);
        assert_eq!(entry.updates.as_ref().unwrap().review_comments, update.review_comments);
        assert!(chain.verify_integrity());
    }

    #[test]
    fn window_finalized_entries_carry_no_agent_identity() {
        let mut chain = AuditChain::new();
        chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        let window = FinalizedWindow {
            window_start: Utc::now(),
            window_end: Utc::now(),
            merkle_root: [7u8; 32],
            hash_count: 1,
        };
        let entry = chain.append_window_finalized(window, Utc::now());

        assert_eq!(entry.entry_type, AuditEntryType::WindowFinalized);
        assert!(entry.agent_id.is_none());
        assert_eq!(entry.content_hash, [7u8; 32]);
        assert!(chain.verify_integrity());
    }

    #[test]
    fn swapping_an_entry_type_without_recomputing_the_hash_breaks_integrity() {
        let mut chain = AuditChain::new();
        chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        chain.entries[0].entry_type = AuditEntryType::WindowFinalized;
        assert!(!chain.verify_integrity());
    }
}
