//! Binary Merkle tree over a window's audit-entry hashes. Odd levels
//! duplicate their last node rather than leaving it unpaired, so every level
//! has an even width and the tree shape is a pure function of leaf count.

use serde::{Deserialize, Serialize};
use traceledger_core::canonical::combine_hashes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: [u8; 32],
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InclusionProof {
    pub leaf_index: usize,
    pub leaf: [u8; 32],
    pub root: [u8; 32],
    pub steps: Vec<ProofStep>,
}

/// A materialized tree over a fixed leaf set. Windows are immutable once
/// finalized, so there is no incremental-update path to maintain.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn build(leaves: &[[u8; 32]]) -> Self {
        if leaves.is_empty() {
            return Self { levels: vec![vec![]] };
        }
        let mut levels = vec![leaves.to_vec()];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            let mut i = 0;
            while i < current.len() {
                let left = current[i];
                let right = if i + 1 < current.len() { current[i + 1] } else { current[i] };
                next.push(combine_hashes("traceledger-merkle-node", &left, &right));
                i += 2;
            }
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> [u8; 32] {
        self.levels.last().and_then(|l| l.first()).copied().unwrap_or([0u8; 32])
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    pub fn proof(&self, leaf_index: usize) -> Option<InclusionProof> {
        let leaves = self.levels.first()?;
        let leaf = *leaves.get(leaf_index)?;
        let mut steps = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right_child = index % 2 == 1;
            let sibling_index = if is_right_child { index - 1 } else {
                if index + 1 < level.len() { index + 1 } else { index }
            };
            let sibling = level[sibling_index];
            let direction = if is_right_child { Direction::Left } else { Direction::Right };
            steps.push(ProofStep { sibling, direction });
            index /= 2;
        }
        Some(InclusionProof { leaf_index, leaf, root: self.root(), steps })
    }
}

/// Recompute a root from a leaf and its proof path, independent of any
/// materialized tree. Used to verify an exported proof without rebuilding
/// the whole window.
pub fn verify_proof(proof: &InclusionProof) -> bool {
    let mut current = proof.leaf;
    for step in &proof.steps {
        current = match step.direction {
            Direction::Left => combine_hashes("traceledger-merkle-node", &step.sibling, &current),
            Direction::Right => combine_hashes("traceledger-merkle-node", &current, &step.sibling),
        };
    }
    current == proof.root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> [u8; 32] {
        let mut h = [0u8; 32];
        h[0] = n;
        h
    }

    #[test]
    fn single_leaf_tree_proof_is_trivially_valid() {
        let tree = MerkleTree::build(&[leaf(1)]);
        let proof = tree.proof(0).unwrap();
        assert!(proof.steps.is_empty());
        assert!(verify_proof(&proof));
    }

    #[test]
    fn odd_leaf_count_duplicates_the_last_leaf() {
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let tree = MerkleTree::build(&leaves);
        for i in 0..leaves.len() {
            let proof = tree.proof(i).unwrap();
            assert!(verify_proof(&proof), "leaf {i} proof should verify");
        }
    }

    #[test]
    fn every_leaf_in_a_larger_tree_has_a_valid_proof() {
        let leaves: Vec<[u8; 32]> = (0..7).map(leaf).collect();
        let tree = MerkleTree::build(&leaves);
        for i in 0..leaves.len() {
            let proof = tree.proof(i).unwrap();
            assert_eq!(proof.root, tree.root());
            assert!(verify_proof(&proof));
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let leaves: Vec<[u8; 32]> = (0..4).map(leaf).collect();
        let tree = MerkleTree::build(&leaves);
        let mut proof = tree.proof(2).unwrap();
        proof.leaf = leaf(99);
        assert!(!verify_proof(&proof));
    }
}
