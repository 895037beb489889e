//! Append-only incremental Merkle tree over BN254 field elements.
//!
//! Inserts are O(depth) via a frontier of rightmost filled nodes; empty
//! subtrees use a precomputed zero ladder (Z0 = 0, Z[l+1] = H(Z[l], Z[l])).
//! The tree keeps a rolling history of recent roots so withdrawals proved
//! against a slightly stale root still validate.

use ark_bn254::Fr;
use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use std::collections::VecDeque;

use crate::poseidon::poseidon_hash;

pub const DEFAULT_DEPTH: usize = 20;
pub const DEFAULT_ROOT_HISTORY: usize = 100;
pub const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hash at each level, leaf level first.
    pub path_elements: Vec<Fr>,
    /// Bit L of the leaf index: 0 = leaf is a left child at level L.
    pub path_indices: Vec<u8>,
    /// Root at proof-generation time.
    pub root: Fr,
    pub leaf: Fr,
}

pub struct MerkleTree {
    depth: usize,
    leaves: Vec<Fr>,
    /// Rightmost filled node at each level, maintained by `insert`.
    frontier: Vec<Fr>,
    /// zeros[l] is the hash of an empty subtree of height l.
    zeros: Vec<Fr>,
    root: Fr,
    /// Most-recent-first, bounded by `history_capacity`.
    root_history: VecDeque<Fr>,
    history_capacity: usize,
}

impl MerkleTree {
    pub fn new(depth: usize) -> PrivacyKitResult<Self> {
        Self::with_history(depth, DEFAULT_ROOT_HISTORY)
    }

    pub fn with_history(depth: usize, history_capacity: usize) -> PrivacyKitResult<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(PrivacyKitError::InvalidInput(format!(
                "tree depth must be in 1..={}, got {}",
                MAX_DEPTH, depth
            )));
        }
        if history_capacity == 0 {
            return Err(PrivacyKitError::InvalidInput(
                "root history capacity must be nonzero".to_string(),
            ));
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(Fr::from(0u64));
        for level in 0..depth {
            let z = zeros[level];
            zeros.push(poseidon_hash(z, z));
        }

        let root = zeros[depth];
        let mut root_history = VecDeque::with_capacity(history_capacity);
        root_history.push_front(root);

        Ok(Self {
            depth,
            leaves: Vec::new(),
            frontier: vec![Fr::from(0u64); depth],
            zeros,
            root,
            root_history,
            history_capacity,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn next_index(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn root(&self) -> Fr {
        self.root
    }

    /// Hash of an empty subtree of height `level`.
    pub fn zero_value(&self, level: usize) -> Fr {
        self.zeros[level]
    }

    /// Append a leaf and return its index. The zero element is a legal leaf,
    /// distinct from an empty position.
    pub fn insert(&mut self, leaf: Fr) -> PrivacyKitResult<u64> {
        let index = self.leaves.len();
        if index as u64 >= self.capacity() {
            return Err(PrivacyKitError::TreeFull);
        }
        self.leaves.push(leaf);

        let mut node = leaf;
        let mut idx = index;
        for level in 0..self.depth {
            if idx % 2 == 0 {
                self.frontier[level] = node;
                node = poseidon_hash(node, self.zeros[level]);
            } else {
                node = poseidon_hash(self.frontier[level], node);
            }
            idx /= 2;
        }

        self.root = node;
        self.root_history.push_front(node);
        self.root_history.truncate(self.history_capacity);

        Ok(index as u64)
    }

    /// Path proof for the leaf at `index` against the current root.
    pub fn generate_proof(&self, index: u64) -> PrivacyKitResult<MerkleProof> {
        if index >= self.next_index() {
            return Err(PrivacyKitError::NotFound(format!(
                "no leaf at index {} (next index {})",
                index,
                self.next_index()
            )));
        }

        let mut path_elements = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);

        let mut level: Vec<Fr> = self.leaves.clone();
        let mut idx = index as usize;

        for l in 0..self.depth {
            let sibling = if idx % 2 == 0 {
                if idx + 1 < level.len() {
                    level[idx + 1]
                } else {
                    self.zeros[l]
                }
            } else {
                level[idx - 1]
            };
            path_indices.push((idx % 2) as u8);
            path_elements.push(sibling);

            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let left = pair[0];
                let right = if pair.len() == 2 { pair[1] } else { self.zeros[l] };
                next.push(poseidon_hash(left, right));
            }
            level = next;
            idx /= 2;
        }

        Ok(MerkleProof {
            path_elements,
            path_indices,
            root: self.root,
            leaf: self.leaves[index as usize],
        })
    }

    /// Fold the path and compare against the root carried in the proof.
    pub fn verify_proof(leaf: Fr, proof: &MerkleProof) -> bool {
        if proof.path_elements.len() != proof.path_indices.len() {
            return false;
        }

        let mut node = leaf;
        for (sibling, bit) in proof.path_elements.iter().zip(&proof.path_indices) {
            node = if *bit == 0 {
                poseidon_hash(node, *sibling)
            } else {
                poseidon_hash(*sibling, node)
            };
        }
        node == proof.root
    }

    /// True iff `root` was the tree root within the last K insertions.
    pub fn is_known_root(&self, root: &Fr) -> bool {
        self.root_history.iter().any(|r| r == root)
    }

    pub fn known_roots(&self) -> Vec<Fr> {
        self.root_history.iter().copied().collect()
    }
}
