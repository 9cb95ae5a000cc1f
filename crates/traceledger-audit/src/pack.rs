//! Exportable audit pack: a self-contained snapshot of the chain and its
//! Merkle windows, re-verifiable without access to the running service.

use crate::chain::AuditEntry;
use crate::error::AuditError;
use crate::window::FinalizedWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use traceledger_core::canonical::{canonical_hash, hash_to_hex};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleRootRecord {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub merkle_root: String,
    pub hash_count: usize,
    /// Always `true`: only windows that have actually finalized are ever
    /// collected into `finalized_windows()`.
    pub finalized: bool,
}

impl From<&FinalizedWindow> for MerkleRootRecord {
    fn from(w: &FinalizedWindow) -> Self {
        Self {
            window_start: w.window_start,
            window_end: w.window_end,
            merkle_root: hash_to_hex(&w.merkle_root),
            hash_count: w.hash_count,
            finalized: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackVerification {
    pub total_entries: usize,
    pub merkle_roots_count: usize,
    pub chain_integrity: bool,
    pub pack_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPack {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub time_range: TimeRange,
    pub merkle_roots: Vec<MerkleRootRecord>,
    pub audit_chain: Vec<AuditEntry>,
    pub verification: PackVerification,
}

impl AuditPack {
    pub fn build(
        time_range: TimeRange,
        merkle_roots: Vec<MerkleRootRecord>,
        audit_chain: Vec<AuditEntry>,
        chain_integrity: bool,
    ) -> Self {
        let id = Uuid::new_v4();
        let generated_at = Utc::now();
        let total_entries = audit_chain.len();
        let merkle_roots_count = merkle_roots.len();

        let hashing_basis = serde_json::json!({
            "id": id,
            "generatedAt": generated_at,
            "auditChain": audit_chain.iter().map(|e| hash_to_hex(&e.entry_hash)).collect::<Vec<_>>(),
            "merkleRoots": merkle_roots.iter().map(|r| r.merkle_root.clone()).collect::<Vec<_>>(),
        });
        let pack_hash = hash_to_hex(&canonical_hash(&hashing_basis));

        Self {
            id,
            generated_at,
            time_range,
            merkle_roots,
            audit_chain,
            verification: PackVerification {
                total_entries,
                merkle_roots_count,
                chain_integrity,
                pack_hash,
            },
        }
    }

    /// Recompute `pack_hash` and the chain's internal links, confirming the
    /// pack has not been altered since export.
    pub fn verify(&self) -> Result<(), AuditError> {
        let hashing_basis = serde_json::json!({
            "id": self.id,
            "generatedAt": self.generated_at,
            "auditChain": self.audit_chain.iter().map(|e| hash_to_hex(&e.entry_hash)).collect::<Vec<_>>(),
            "merkleRoots": self.merkle_roots.iter().map(|r| r.merkle_root.clone()).collect::<Vec<_>>(),
        });
        let recomputed = hash_to_hex(&canonical_hash(&hashing_basis));
        if recomputed != self.verification.pack_hash {
            return Err(AuditError::PackIntegrity("pack_hash does not match contents".to_string()));
        }

        let mut expected_prev = crate::chain::GENESIS_HASH;
        for entry in &self.audit_chain {
            if entry.prev_hash != expected_prev {
                return Err(AuditError::PackIntegrity(format!(
                    "chain link broken at sequence {}",
                    entry.sequence
                )));
            }
            let recomputed = AuditEntry::compute_entry_hash(
                entry.sequence,
                entry.entry_type,
                &entry.content_hash,
                &entry.prev_hash,
            );
            if recomputed != entry.entry_hash {
                return Err(AuditError::PackIntegrity(format!(
                    "entry hash mismatch at sequence {}",
                    entry.sequence
                )));
            }
            expected_prev = entry.entry_hash;
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AuditChain;
    use traceledger_core::ids::LogKey;

    #[test]
    fn exported_pack_round_trips_and_verifies() {
        let mut chain = AuditChain::new();
        chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());
        chain.append_log_created(&LogKey::new("agent-1", 2), [2u8; 32], Utc::now());

        let pack = AuditPack::build(
            TimeRange { start: Utc::now(), end: Utc::now() },
            vec![],
            chain.entries().to_vec(),
            chain.verify_integrity(),
        );

        let json = pack.to_json().unwrap();
        let restored = AuditPack::from_json(&json).unwrap();
        restored.verify().unwrap();
    }

    #[test]
    fn tampered_pack_fails_verification() {
        let mut chain = AuditChain::new();
        chain.append_log_created(&LogKey::new("agent-1", 1), [1u8; 32], Utc::now());

        let mut pack = AuditPack::build(
            TimeRange { start: Utc::now(), end: Utc::now() },
            vec![],
            chain.entries().to_vec(),
            true,
        );
        pack.audit_chain[0].content_hash = [9u8; 32];
        assert!(pack.verify().is_err());
    }
}
