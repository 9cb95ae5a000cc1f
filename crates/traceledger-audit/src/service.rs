//! Ties the chain and Merkle windows together behind a single lock, so a
//! `record` always appends to both structures atomically relative to any
//! concurrent export or proof request.

use crate::chain::{AuditChain, AuditEntry};
use crate::error::AuditError;
use crate::merkle::InclusionProof;
use crate::pack::{AuditPack, MerkleRootRecord, TimeRange};
use crate::window::WindowManager;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use traceledger_core::ids::LogKey;
use traceledger_core::log::ReviewUpdate;

struct State {
    chain: AuditChain,
    windows: WindowManager,
}

/// Folds logs into the hash-linked chain and the current Merkle window.
/// All mutation goes through a single mutex so appends, rollovers, and
/// exports never interleave; reads of finalized windows and proofs take a
/// snapshot and never block a writer for long.
pub struct AuditService {
    state: Mutex<State>,
}

impl AuditService {
    pub fn new(window_minutes: i64) -> Self {
        Self { state: Mutex::new(State { chain: AuditChain::new(), windows: WindowManager::new(window_minutes) }) }
    }

    /// Fold one log's content hash into the chain as a `LOG_CREATED` entry
    /// and into the current window. If doing so rolled the window over, a
    /// `WINDOW_FINALIZED` entry is also appended and returned so the caller
    /// can broadcast it.
    pub fn record(&self, key: &LogKey, content_hash: [u8; 32], recorded_at: DateTime<Utc>) -> ([u8; 32], Option<AuditEntry>) {
        let mut state = self.state.lock();
        let entry = state.chain.append_log_created(key, content_hash, recorded_at);
        let rolled_over = state.windows.record(recorded_at, entry.entry_hash);
        let finalized_entry = rolled_over.map(|window| state.chain.append_window_finalized(window, recorded_at));
        (entry.entry_hash, finalized_entry)
    }

    /// Fold a review update into the chain as a `LOG_UPDATED` entry carrying
    /// the applied `updates`, and into the current window. Same
    /// window-finalization behavior as `record`.
    pub fn record_update(
        &self,
        key: &LogKey,
        content_hash: [u8; 32],
        recorded_at: DateTime<Utc>,
        updates: ReviewUpdate,
    ) -> ([u8; 32], Option<AuditEntry>) {
        let mut state = self.state.lock();
        let entry = state.chain.append_log_updated(key, content_hash, recorded_at, updates);
        let rolled_over = state.windows.record(recorded_at, entry.entry_hash);
        let finalized_entry = rolled_over.map(|window| state.chain.append_window_finalized(window, recorded_at));
        (entry.entry_hash, finalized_entry)
    }

    /// Finalize any window whose interval has fully elapsed as of `now`.
    /// Meant to be driven by a periodic tick so windows finalize even absent
    /// new log traffic. Returns the appended `WINDOW_FINALIZED` entry, if a
    /// window was actually closed.
    pub fn roll_over(&self, now: DateTime<Utc>) -> Option<AuditEntry> {
        let mut state = self.state.lock();
        let rolled_over = state.windows.roll_over_if_needed(now);
        rolled_over.map(|window| state.chain.append_window_finalized(window, now))
    }

    /// Force-finalize the currently open window, used at export time so the
    /// pack includes a root for in-flight data.
    pub fn flush_current_window(&self) -> Option<AuditEntry> {
        let mut state = self.state.lock();
        let finalized = state.windows.finalize_current();
        finalized.map(|window| state.chain.append_window_finalized(window, Utc::now()))
    }

    pub fn chain_len(&self) -> usize {
        self.state.lock().chain.len()
    }

    pub fn verify_chain_integrity(&self) -> bool {
        self.state.lock().chain.verify_integrity()
    }

    pub fn proof_for_entry_hash(&self, entry_hash: &[u8; 32]) -> Option<InclusionProof> {
        self.state.lock().windows.proof_for(entry_hash)
    }

    /// Convenience: find the entry for `key` then resolve its inclusion
    /// proof. `entries_for` walking is linear; a production store would
    /// index by `(agent_id, step_id)` but this crate's chain is the
    /// in-memory reference copy, not the system of record (see `traceledger-store`).
    pub fn proof_for_log(&self, key: &LogKey) -> Result<InclusionProof, AuditError> {
        let state = self.state.lock();
        let entry = state
            .chain
            .entries()
            .iter()
            .rev()
            .find(|e| e.agent_id.as_deref() == Some(key.agent_id.as_str()) && e.step_id == Some(key.step_id))
            .ok_or_else(|| AuditError::EntryNotFound {
                agent_id: key.agent_id.clone(),
                step_id: key.step_id,
            })?;
        let entry_hash = entry.entry_hash;
        drop(state);
        self.proof_for_entry_hash(&entry_hash).ok_or_else(|| AuditError::EntryNotFound {
            agent_id: key.agent_id.clone(),
            step_id: key.step_id,
        })
    }

    /// Export everything finalized so far (plus the still-open window, if
    /// `include_open` is set) as a self-contained, independently-verifiable
    /// pack.
    pub fn export_pack(&self, include_open: bool) -> AuditPack {
        let mut state = self.state.lock();
        if include_open {
            if let Some(window) = state.windows.roll_over_if_needed(Utc::now()) {
                state.chain.append_window_finalized(window, Utc::now());
            }
            if let Some(window) = state.windows.finalize_current() {
                state.chain.append_window_finalized(window, Utc::now());
            }
        }
        let roots: Vec<MerkleRootRecord> = state.windows.finalized_windows().map(MerkleRootRecord::from).collect();
        let chain_integrity = state.chain.verify_integrity();
        let entries = state.chain.entries().to_vec();

        let start = roots.first().map(|r| r.window_start).unwrap_or_else(Utc::now);
        let end = roots.last().map(|r| r.window_end).unwrap_or_else(Utc::now);

        AuditPack::build(TimeRange { start, end }, roots, entries, chain_integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AuditEntryType;
    use crate::merkle::verify_proof;

    #[test]
    fn recorded_logs_are_provable_after_a_window_flush() {
        let service = AuditService::new(60);
        let key = LogKey::new("agent-1", 1);
        service.record(&key, [7u8; 32], Utc::now());
        service.flush_current_window();

        let proof = service.proof_for_log(&key).unwrap();
        assert!(verify_proof(&proof));
    }

    #[test]
    fn export_pack_verifies_and_reflects_recorded_entries() {
        let service = AuditService::new(60);
        service.record(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        service.record(&LogKey::new("agent-1", 2), [2u8; 32], Utc::now());

        let pack = service.export_pack(true);
        assert_eq!(pack.verification.total_entries, 3);
        assert!(pack.verification.chain_integrity);
        pack.verify().unwrap();
        assert_eq!(pack.audit_chain.last().unwrap().entry_type, AuditEntryType::WindowFinalized);
    }

    #[test]
    fn review_updates_append_a_log_updated_entry() {
        let service = AuditService::new(60);
        let key = LogKey::new("agent-1", 1);
        service.record(&key, [1u8; 32], Utc::now());
        let update = ReviewUpdate { reviewed: true, review_comments: Some("ok".to_string()) };
        service.record_update(&key, [2u8; 32], Utc::now(), update);

        assert_eq!(service.chain_len(), 2);
        assert!(service.verify_chain_integrity());
    }

    #[test]
    fn window_finalization_is_reported_to_the_caller() {
        let service = AuditService::new(60);
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let (_, finalized) = service.record(&LogKey::new("agent-1", 1), [1u8; 32], base);
        assert!(finalized.is_none(), "first record in a fresh window does not finalize anything");

        let (_, finalized) =
            service.record(&LogKey::new("agent-1", 2), [2u8; 32], base + chrono::Duration::minutes(90));
        let entry = finalized.expect("crossing the window boundary finalizes the prior window");
        assert_eq!(entry.entry_type, AuditEntryType::WindowFinalized);
        assert_eq!(entry.window.as_ref().unwrap().hash_count, 1);
    }
}
