//! Membership groups.
//!
//! A [`Group`] is an ordered list of identity commitments stored as the
//! leaves of a [`MerkleTree`]. Indices never move: removing a member
//! overwrites its leaf with zero.
//!
//! Groups hold no lock. Share one between threads behind a caller-owned
//! `Mutex`/`RwLock` so that a reader never observes a half-updated path.
//!
//! Groups with one or two members do not hide which member produced a proof.

use crate::error::{Result, SemaphoreError};
use crate::merkle::{MerkleProof, MerkleTree};
use crate::utils::field_to_decimal;
use log::debug;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;

/// Leaf value of a removed member.
pub const TOMBSTONE: pallas::Base = <pallas::Base as Field>::ZERO;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    tree: MerkleTree,
}

impl Group {
    /// Create a group whose members occupy indices `0..n` in iteration order.
    ///
    /// # Errors
    /// Returns a validation error if any member is zero.
    pub fn new(members: impl IntoIterator<Item = pallas::Base>) -> Result<Self> {
        let members: Vec<pallas::Base> = members.into_iter().collect();
        if let Some(position) = members.iter().position(|m| *m == TOMBSTONE) {
            return Err(SemaphoreError::validation(format!(
                "member at position {position} is zero, which is reserved for removed members"
            )));
        }
        Ok(Group {
            tree: MerkleTree::new(members),
        })
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.tree.root()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Number of leaves, removed members included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// Leaves in index order; removed members read as zero.
    #[must_use]
    pub fn members(&self) -> &[pallas::Base] {
        self.tree.leaves()
    }

    /// Index of the first leaf equal to `commitment`.
    #[must_use]
    pub fn index_of(&self, commitment: pallas::Base) -> Option<usize> {
        self.members().iter().position(|leaf| *leaf == commitment)
    }

    /// Appends a member and returns its index.
    pub fn add_member(&mut self, commitment: pallas::Base) -> Result<usize> {
        if commitment == TOMBSTONE {
            return Err(SemaphoreError::validation(
                "cannot add zero: it is reserved for removed members",
            ));
        }
        let index = self.tree.insert(commitment);
        debug!(
            "added member {} at index {index}, root {}",
            field_to_decimal(commitment),
            field_to_decimal(self.root())
        );
        Ok(index)
    }

    pub fn add_members(&mut self, commitments: impl IntoIterator<Item = pallas::Base>) -> Result<()> {
        for commitment in commitments {
            self.add_member(commitment)?;
        }
        Ok(())
    }

    /// Replaces the member at `index` with a new commitment.
    pub fn update_member(&mut self, index: usize, commitment: pallas::Base) -> Result<()> {
        self.check_index(index)?;
        if commitment == TOMBSTONE {
            return Err(SemaphoreError::validation(
                "use remove_member to clear a member",
            ));
        }
        if self.tree.leaf(index) == Some(TOMBSTONE) {
            return Err(SemaphoreError::validation(format!(
                "member at index {index} has been removed and cannot be updated"
            )));
        }
        self.tree.update(index, commitment);
        Ok(())
    }

    /// Overwrites the member at `index` with zero.
    pub fn remove_member(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.tree.leaf(index) == Some(TOMBSTONE) {
            return Err(SemaphoreError::validation(format!(
                "member at index {index} has already been removed"
            )));
        }
        self.tree.update(index, TOMBSTONE);
        debug!(
            "removed member at index {index}, root {}",
            field_to_decimal(self.root())
        );
        Ok(())
    }

    /// Inclusion proof for the leaf at `index`, with one sibling per level.
    pub fn generate_merkle_proof(&self, index: usize) -> Result<MerkleProof> {
        self.check_index(index)?;
        self.tree.generate_proof(index).ok_or(SemaphoreError::Range {
            index,
            size: self.size(),
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size() {
            return Err(SemaphoreError::Range {
                index,
                size: self.size(),
            });
        }
        Ok(())
    }
}

/// Anything that can produce the Merkle proof for a commitment.
///
/// Proof generation accepts either a whole [`Group`], in which case the
/// commitment is looked up, or a [`MerkleProof`] computed earlier, which is
/// used as is.
pub trait MerkleProofSource {
    fn merkle_proof_for(&self, commitment: pallas::Base) -> Result<MerkleProof>;
}

impl MerkleProofSource for Group {
    fn merkle_proof_for(&self, commitment: pallas::Base) -> Result<MerkleProof> {
        let index = self.index_of(commitment).ok_or_else(|| {
            SemaphoreError::NotFound(format!(
                "commitment {} is not a member of the group",
                field_to_decimal(commitment)
            ))
        })?;
        self.generate_merkle_proof(index)
    }
}

impl MerkleProofSource for MerkleProof {
    fn merkle_proof_for(&self, _commitment: pallas::Base) -> Result<MerkleProof> {
        Ok(self.clone())
    }
}
