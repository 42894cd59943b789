//! Anonymous group signalling.
//!
//! A member of a group proves in zero knowledge that they belong to the group
//! and signal a message under a scope, without revealing which member they
//! are. Every (identity, scope) pair yields one nullifier, so a verifier can
//! accept at most one signal per member and scope.
//!
//! # Components
//!
//! - [`Identity`]: key pair, commitment and signatures
//! - [`Group`]: members as leaves of an incremental Poseidon [`MerkleTree`]
//! - [`generate_proof`] / [`verify_proof`]: proof assembly and verification
//! - [`SemaphoreCircuit`]: the halo2 circuit for one tree depth
//! - [`ArtifactResolver`]: per-depth parameters and keys, fetched once
//! - [`codec`]: the compact `points` form of a proof transcript
//!
//! # Example
//!
//! ```no_run
//! use zkp_semaphore::{generate_proof, verify_proof, ArtifactResolver, Group, Identity, ProofOptions};
//!
//! # async fn run() -> zkp_semaphore::Result<()> {
//! let identity = Identity::new("secret")?;
//! let group = Group::new([identity.commitment()])?;
//! let resolver = ArtifactResolver::default();
//!
//! let proof = generate_proof(&identity, &group, "yes", "election-1", ProofOptions::default(), &resolver).await?;
//! assert!(verify_proof(&proof, &resolver).await?);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod circuit;
pub mod codec;
pub mod config;
pub mod error;
pub mod group;
pub mod identity;
pub mod merkle;
pub mod nullifier;
pub mod proof;
pub mod signal;
pub mod utils;

#[cfg(test)]
mod merkle_tests;

pub use artifacts::{ArtifactKey, ArtifactResolver, ArtifactSource, KeygenSource, SnarkArtifacts};
pub use circuit::SemaphoreCircuit;
pub use config::Config;
pub use error::{ArtifactError, Result, SemaphoreError};
pub use group::{Group, MerkleProofSource};
pub use identity::{Identity, PublicKey, Signature};
pub use merkle::{MerkleProof, MerkleTree};
pub use nullifier::NullifierRegistry;
pub use proof::{generate_proof, verify_proof, ProofOptions, SemaphoreProof};
pub use signal::{hash_signal, Signal};

/// Smallest supported tree depth.
pub const MIN_DEPTH: usize = 1;

/// Largest supported tree depth.
///
/// Each depth has its own circuit and keys. Changing either bound changes
/// which artifacts a verifier must be able to resolve.
pub const MAX_DEPTH: usize = 32;
