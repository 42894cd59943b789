//! Proof generation and verification.
//!
//! [`generate_proof`] turns an identity, its group membership and a
//! (message, scope) pair into a [`SemaphoreProof`]; [`verify_proof`] checks
//! one. Both validate every argument before resolving artifacts or touching
//! the proving engine, and both run the engine on the blocking pool.

use crate::artifacts::{ArtifactResolver, SnarkArtifacts};
use crate::circuit::{self, CircuitInputs, PUBLIC_INPUTS};
use crate::codec;
use crate::error::{Result, SemaphoreError};
use crate::group::MerkleProofSource;
use crate::identity::Identity;
use crate::signal::{hash_signal, Signal, WORD_SIZE};
use crate::utils::{biguint_to_field, field_to_decimal};
use crate::{MAX_DEPTH, MIN_DEPTH};
use log::{debug, info};
use num_bigint::BigUint;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A proof as exchanged between provers and verifiers.
///
/// `message` and `scope` are the canonical integers, not their hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemaphoreProof {
    pub merkle_tree_depth: usize,
    pub merkle_tree_root: String,
    pub nullifier: String,
    pub message: String,
    pub scope: String,
    pub points: Vec<String>,
}

impl SemaphoreProof {
    /// Parses the JSON wire form.
    ///
    /// # Errors
    /// Any missing field or mistyped value is a validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SemaphoreError::validation(format!("malformed proof: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SemaphoreError::validation(format!("failed to serialize proof: {e}")))
    }

    /// Checks the depth range and that every numeric field is a decimal
    /// integer in range.
    pub fn validate(&self) -> Result<()> {
        self.public_inputs().map(|_| ())
    }

    /// `[root, nullifier, hashed_message, hashed_scope]` as the verifier
    /// feeds them to the circuit.
    pub fn public_inputs(&self) -> Result<[pallas::Base; PUBLIC_INPUTS]> {
        check_depth(self.merkle_tree_depth)?;
        if self.points.is_empty() {
            return Err(SemaphoreError::validation("proof points are empty"));
        }
        let root = decimal_field(&self.merkle_tree_root, "merkleTreeRoot")?;
        let nullifier = decimal_field(&self.nullifier, "nullifier")?;
        let message = decimal_word(&self.message, "message")?;
        let scope = decimal_word(&self.scope, "scope")?;
        Ok([root, nullifier, hash_signal(&message)?, hash_signal(&scope)?])
    }
}

fn parse_decimal(input: &str, name: &str) -> Result<BigUint> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SemaphoreError::validation(format!(
            "{name} must be a decimal integer, got '{input}'"
        )));
    }
    BigUint::parse_bytes(input.as_bytes(), 10).ok_or_else(|| {
        SemaphoreError::validation(format!("{name} must be a decimal integer, got '{input}'"))
    })
}

fn decimal_field(input: &str, name: &str) -> Result<pallas::Base> {
    biguint_to_field(&parse_decimal(input, name)?).ok_or_else(|| {
        SemaphoreError::validation(format!("{name} is not below the field modulus"))
    })
}

fn decimal_word(input: &str, name: &str) -> Result<BigUint> {
    let value = parse_decimal(input, name)?;
    if value.bits() > (WORD_SIZE * 8) as u64 {
        return Err(SemaphoreError::validation(format!(
            "{name} does not fit in {WORD_SIZE} bytes"
        )));
    }
    Ok(value)
}

fn check_depth(depth: usize) -> Result<()> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(SemaphoreError::validation(format!(
            "merkle tree depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {depth}"
        )));
    }
    Ok(())
}

/// The circuit depth for a path of `path_length` siblings.
///
/// An explicit depth must be in range and at least the path length.
/// Otherwise the path length is used, with a floor of [`MIN_DEPTH`].
pub fn resolve_depth(requested: Option<usize>, path_length: usize) -> Result<usize> {
    match requested {
        Some(depth) => {
            check_depth(depth)?;
            if depth < path_length {
                return Err(SemaphoreError::validation(format!(
                    "merkle tree depth {depth} is shorter than the membership path ({path_length})"
                )));
            }
            Ok(depth)
        }
        None => {
            let depth = path_length.max(MIN_DEPTH);
            check_depth(depth)?;
            Ok(depth)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProofOptions {
    /// Circuit depth; defaults to the membership path length.
    pub merkle_tree_depth: Option<usize>,
    /// Use these artifacts instead of asking the resolver.
    pub artifacts: Option<Arc<SnarkArtifacts>>,
}

/// Proves that `identity` belongs to `group` and signals `message` under
/// `scope`.
///
/// `group` is either a whole [`Group`](crate::group::Group), in which case
/// the identity's commitment is looked up, or a
/// [`MerkleProof`](crate::merkle::MerkleProof) for it.
///
/// # Errors
/// - `Validation` for an out-of-range depth, a signal that does not fit in
///   32 bytes, or a Merkle proof for another leaf.
/// - `NotFound` if the group does not contain the identity.
/// - `Artifact` if the artifacts cannot be resolved.
/// - `Prover` if proving fails.
pub async fn generate_proof<G: MerkleProofSource + ?Sized>(
    identity: &Identity,
    group: &G,
    message: impl Into<Signal>,
    scope: impl Into<Signal>,
    options: ProofOptions,
    resolver: &ArtifactResolver,
) -> Result<SemaphoreProof> {
    if let Some(depth) = options.merkle_tree_depth {
        check_depth(depth)?;
    }
    let message = message.into().to_biguint()?;
    let scope = scope.into().to_biguint()?;

    let commitment = identity.commitment();
    let merkle_proof = group.merkle_proof_for(commitment)?;
    if merkle_proof.leaf != commitment {
        return Err(SemaphoreError::validation(
            "the membership proof is for a different commitment",
        ));
    }
    if !merkle_proof.verify() {
        return Err(SemaphoreError::validation(
            "the membership proof does not fold to its root",
        ));
    }

    let depth = resolve_depth(options.merkle_tree_depth, merkle_proof.siblings.len())?;
    let inputs = CircuitInputs {
        depth,
        secret: identity.secret_scalar(),
        index: merkle_proof.index,
        path: merkle_proof.siblings,
        hashed_message: hash_signal(&message)?,
        hashed_scope: hash_signal(&scope)?,
    };

    let artifacts = match options.artifacts {
        Some(artifacts) if artifacts.depth == depth => artifacts,
        Some(artifacts) => {
            return Err(SemaphoreError::validation(format!(
                "supplied artifacts are for depth {}, the proof needs depth {depth}",
                artifacts.depth
            )))
        }
        None => resolver.resolve(depth).await?,
    };

    debug!("Generating proof at depth {depth} for leaf {}", merkle_proof.index);
    let (transcript, public_inputs) =
        tokio::task::spawn_blocking(move || circuit::prove(&artifacts, &inputs))
            .await
            .map_err(|e| SemaphoreError::Prover(format!("proving task failed: {e}")))??;
    info!("Generated proof of {} bytes at depth {depth}", transcript.len());

    Ok(SemaphoreProof {
        merkle_tree_depth: depth,
        merkle_tree_root: field_to_decimal(public_inputs[0]),
        nullifier: field_to_decimal(public_inputs[1]),
        message: message.to_string(),
        scope: scope.to_string(),
        points: codec::pack(&transcript),
    })
}

/// Verifies a proof with the verification key for its depth.
///
/// # Errors
/// Malformed proofs (bad depth, bad numbers, bad points) are validation
/// errors; artifact resolution failures are passed through. A well-formed
/// proof that does not verify is `Ok(false)`.
pub async fn verify_proof(proof: &SemaphoreProof, resolver: &ArtifactResolver) -> Result<bool> {
    let public_inputs = proof.public_inputs()?;
    let transcript = codec::unpack(&proof.points)?;
    let artifacts = resolver.resolve(proof.merkle_tree_depth).await?;

    let depth = proof.merkle_tree_depth;
    let valid = tokio::task::spawn_blocking(move || {
        circuit::verify(&artifacts, &transcript, &public_inputs)
    })
    .await
    .map_err(|e| SemaphoreError::Prover(format!("verification task failed: {e}")))?;

    info!(
        "Proof at depth {depth} {}",
        if valid { "verified" } else { "rejected" }
    );
    Ok(valid)
}
