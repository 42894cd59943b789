//! Incremental binary Merkle tree over Poseidon.
//!
//! Nodes live in a flat arena of levels: `levels[0]` holds the leaves and
//! `levels[depth]` holds the single root. A parent is
//! `Poseidon(left, right)`; a right child that does not exist yet reads as
//! zero. The depth is `ceil(log2(size))`, so a tree with one leaf has depth 0
//! and its root is that leaf.

use crate::utils::{field_to_decimal, poseidon_hash};
use pasta_curves::pallas;
use std::fmt;

/// A Merkle proof for leaf inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub root: pallas::Base,
    pub leaf: pallas::Base,
    pub index: usize,
    /// One sibling per level, from the leaf upwards.
    pub siblings: Vec<pallas::Base>,
}

impl MerkleProof {
    /// Folds the siblings bottom-up and compares the result with `root`.
    #[must_use]
    pub fn verify(&self) -> bool {
        if self.siblings.len() < usize::BITS as usize && self.index >> self.siblings.len() != 0 {
            return false;
        }
        fold_path(self.leaf, self.index, &self.siblings) == self.root
    }
}

/// Recomputes a root from a leaf, its index and its sibling path.
#[must_use]
pub fn fold_path(leaf: pallas::Base, index: usize, siblings: &[pallas::Base]) -> pallas::Base {
    siblings
        .iter()
        .enumerate()
        .fold(leaf, |node, (level, sibling)| {
            if (index >> level) & 1 == 0 {
                poseidon_hash(node, *sibling)
            } else {
                poseidon_hash(*sibling, node)
            }
        })
}

/// A binary Merkle tree that supports appends and in-place leaf updates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MerkleTree {
    levels: Vec<Vec<pallas::Base>>,
}

impl MerkleTree {
    /// Build a tree bottom-up from a list of leaves.
    pub fn new(leaves: Vec<pallas::Base>) -> Self {
        let mut levels = vec![leaves];

        while levels[levels.len() - 1].len() > 1 {
            let level = &levels[levels.len() - 1];
            let next: Vec<pallas::Base> = level
                .chunks(2)
                .map(|pair| {
                    poseidon_hash(pair[0], pair.get(1).copied().unwrap_or(pallas::Base::zero()))
                })
                .collect();
            levels.push(next);
        }

        MerkleTree { levels }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        depth_for_size(self.size())
    }

    /// The root, or zero for an empty tree.
    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.levels
            .get(self.depth())
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(pallas::Base::zero())
    }

    #[must_use]
    pub fn leaves(&self) -> &[pallas::Base] {
        self.levels.first().map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn leaf(&self, index: usize) -> Option<pallas::Base> {
        self.leaves().get(index).copied()
    }

    /// Appends a leaf and refreshes its path. Returns the leaf's index.
    pub fn insert(&mut self, leaf: pallas::Base) -> usize {
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        let index = self.levels[0].len();
        self.levels[0].push(leaf);
        self.refresh_path(index);
        index
    }

    /// Replaces the leaf at `index`. Returns `false` if there is no such leaf.
    pub fn update(&mut self, index: usize, leaf: pallas::Base) -> bool {
        if index >= self.size() {
            return false;
        }
        self.levels[0][index] = leaf;
        self.refresh_path(index);
        true
    }

    /// Generate a Merkle proof for the leaf at `leaf_index`.
    ///
    /// The proof has exactly [`MerkleTree::depth`] siblings. Returns `None`
    /// if the index is out of range.
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf = self.leaf(leaf_index)?;
        let siblings = (0..self.depth())
            .map(|level| self.node(level, (leaf_index >> level) ^ 1))
            .collect();

        Some(MerkleProof {
            root: self.root(),
            leaf,
            index: leaf_index,
            siblings,
        })
    }

    fn node(&self, level: usize, index: usize) -> pallas::Base {
        self.levels
            .get(level)
            .and_then(|nodes| nodes.get(index))
            .copied()
            .unwrap_or(pallas::Base::zero())
    }

    fn refresh_path(&mut self, leaf_index: usize) {
        let depth = self.depth();
        while self.levels.len() <= depth {
            self.levels.push(Vec::new());
        }

        let mut index = leaf_index;
        for level in 0..depth {
            let parent = index / 2;
            let hash = poseidon_hash(
                self.node(level, parent * 2),
                self.node(level, parent * 2 + 1),
            );
            let row = &mut self.levels[level + 1];
            if parent < row.len() {
                row[parent] = hash;
            } else {
                row.push(hash);
            }
            index = parent;
        }
    }
}

/// `ceil(log2(size))`, with 0 for trees of zero or one leaf.
#[must_use]
pub fn depth_for_size(size: usize) -> usize {
    if size <= 1 {
        0
    } else {
        (usize::BITS - (size - 1).leading_zeros()) as usize
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Siblings: {}",
            field_to_decimal(self.leaf),
            field_to_decimal(self.root),
            self.index,
            self.siblings.len()
        )
    }
}
