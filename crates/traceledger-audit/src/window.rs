//! Hourly (or however `merkle_window_minutes` is configured) Merkle windows.
//! Each window collects the entry hashes appended during its interval; it is
//! finalized and its root frozen once the interval elapses or it is flushed
//! explicitly.

use crate::merkle::{InclusionProof, MerkleTree};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub merkle_root: [u8; 32],
    pub hash_count: usize,
}

/// A window still accepting entries.
#[derive(Debug, Clone)]
struct OpenWindow {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    leaves: Vec<[u8; 32]>,
}

/// Tracks the currently open window and every window finalized so far.
/// Finalized windows and their trees are kept in memory so proofs can be
/// served without replaying the chain; an export walks `finalized`.
pub struct WindowManager {
    window_len: ChronoDuration,
    current: Option<OpenWindow>,
    finalized: Vec<(FinalizedWindow, MerkleTree)>,
}

impl WindowManager {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window_len: ChronoDuration::minutes(window_minutes.max(1)),
            current: None,
            finalized: Vec::new(),
        }
    }

    fn window_start_for(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let window_secs = self.window_len.num_seconds().max(1);
        let epoch_secs = at.timestamp();
        let aligned = (epoch_secs / window_secs) * window_secs;
        DateTime::from_timestamp(aligned, 0).unwrap_or(at)
    }

    /// Append a hash to the window covering `at`, rolling over any window
    /// whose interval has fully elapsed relative to `at`. Returns the window
    /// that was just rolled over, if any.
    pub fn record(&mut self, at: DateTime<Utc>, entry_hash: [u8; 32]) -> Option<FinalizedWindow> {
        let rolled_over = self.roll_over_if_needed(at);
        let window_start = self.window_start_for(at);
        match &mut self.current {
            Some(open) if open.window_start == window_start => {
                open.leaves.push(entry_hash);
            }
            _ => {
                self.current = Some(OpenWindow {
                    window_start,
                    window_end: window_start + self.window_len,
                    leaves: vec![entry_hash],
                });
            }
        }
        rolled_over
    }

    /// Finalize the current window if `at` is past its end. Returns the
    /// finalized window, if one was closed.
    pub fn roll_over_if_needed(&mut self, at: DateTime<Utc>) -> Option<FinalizedWindow> {
        let should_finalize = match &self.current {
            Some(open) => at >= open.window_end,
            None => false,
        };
        if should_finalize {
            self.finalize_current()
        } else {
            None
        }
    }

    /// Force-finalize the current window regardless of elapsed time, used at
    /// shutdown/export time. Returns the finalized window, if one was open.
    pub fn finalize_current(&mut self) -> Option<FinalizedWindow> {
        let open = self.current.take()?;
        let tree = MerkleTree::build(&open.leaves);
        let finalized = FinalizedWindow {
            window_start: open.window_start,
            window_end: open.window_end,
            merkle_root: tree.root(),
            hash_count: open.leaves.len(),
        };
        self.finalized.push((finalized.clone(), tree));
        Some(finalized)
    }

    pub fn finalized_windows(&self) -> impl Iterator<Item = &FinalizedWindow> {
        self.finalized.iter().map(|(w, _)| w)
    }

    /// Find an inclusion proof for `entry_hash`, searching finalized windows
    /// first and then the still-open one (built on demand).
    pub fn proof_for(&self, entry_hash: &[u8; 32]) -> Option<InclusionProof> {
        for (_, tree) in &self.finalized {
            for idx in 0..tree.leaf_count() {
                if let Some(proof) = tree.proof(idx) {
                    if proof.leaf == *entry_hash {
                        return Some(proof);
                    }
                }
            }
        }
        if let Some(open) = &self.current {
            let tree = MerkleTree::build(&open.leaves);
            for idx in 0..tree.leaf_count() {
                if let Some(proof) = tree.proof(idx) {
                    if proof.leaf == *entry_hash {
                        return Some(proof);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_within_the_same_window_share_a_root() {
        let mut mgr = WindowManager::new(60);
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        mgr.record(base, [1u8; 32]);
        mgr.record(base + ChronoDuration::minutes(10), [2u8; 32]);
        mgr.finalize_current();
        assert_eq!(mgr.finalized_windows().count(), 1);
        let window = mgr.finalized_windows().next().unwrap();
        assert_eq!(window.hash_count, 2);
    }

    #[test]
    fn crossing_a_window_boundary_finalizes_the_prior_window() {
        let mut mgr = WindowManager::new(60);
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        mgr.record(base, [1u8; 32]);
        let rolled = mgr.record(base + ChronoDuration::minutes(90), [2u8; 32]);
        assert!(rolled.is_some());
        assert_eq!(mgr.finalized_windows().count(), 1);
        mgr.finalize_current();
        assert_eq!(mgr.finalized_windows().count(), 2);
    }

    #[test]
    fn proof_is_found_for_entries_in_open_or_finalized_windows() {
        let mut mgr = WindowManager::new(60);
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        mgr.record(base, [1u8; 32]);
        mgr.record(base, [2u8; 32]);
        assert!(mgr.proof_for(&[1u8; 32]).is_some());
        mgr.finalize_current();
        assert!(mgr.proof_for(&[2u8; 32]).is_some());
        assert!(mgr.proof_for(&[99u8; 32]).is_none());
    }
}
