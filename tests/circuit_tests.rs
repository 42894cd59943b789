use pasta_curves::pallas;
use zkp_semaphore::{
    artifacts::ARTIFACT_VERSION,
    circuit::{self, CircuitInputs},
    ArtifactKey, ArtifactSource, Group, Identity, KeygenSource, SemaphoreError, SnarkArtifacts,
};

fn artifacts(depth: usize) -> SnarkArtifacts {
    KeygenSource::new()
        .fetch(&ArtifactKey::new(depth, ARTIFACT_VERSION))
        .unwrap()
}

fn inputs(group: &Group, identity: &Identity, depth: usize) -> CircuitInputs {
    let index = group.index_of(identity.commitment()).unwrap();
    let proof = group.generate_merkle_proof(index).unwrap();
    CircuitInputs {
        depth,
        secret: identity.secret_scalar(),
        index,
        path: proof.siblings,
        hashed_message: pallas::Base::from(11),
        hashed_scope: pallas::Base::from(22),
    }
}

#[test]
fn test_circuit_proof_generation() {
    let identity = Identity::new("prover").unwrap();
    let group = Group::new([
        Identity::new("first").unwrap().commitment(),
        Identity::new("second").unwrap().commitment(),
        identity.commitment(),
    ])
    .unwrap();
    let artifacts = artifacts(2);

    let (proof, public_inputs) = circuit::prove(&artifacts, &inputs(&group, &identity, 2)).unwrap();
    assert!(!proof.is_empty());
    assert_eq!(public_inputs[0], group.root());
    assert!(circuit::verify(&artifacts, &proof, &public_inputs));

    let mut wrong_scope = public_inputs;
    wrong_scope[3] = pallas::Base::from(23);
    assert!(!circuit::verify(&artifacts, &proof, &wrong_scope));

    let mut truncated = proof.clone();
    truncated.truncate(proof.len() / 2);
    assert!(!circuit::verify(&artifacts, &truncated, &public_inputs));

    let mut extended = proof.clone();
    extended.push(0);
    assert!(!circuit::verify(&artifacts, &extended, &public_inputs));
}

#[test]
fn test_single_leaf_tree() {
    let identity = Identity::new("only").unwrap();
    let group = Group::new([identity.commitment()]).unwrap();
    let artifacts = artifacts(1);

    let (proof, public_inputs) = circuit::prove(&artifacts, &inputs(&group, &identity, 1)).unwrap();
    assert_eq!(public_inputs[0], identity.commitment());
    assert!(circuit::verify(&artifacts, &proof, &public_inputs));
}

#[test]
fn test_depth_mismatch_is_rejected() {
    let identity = Identity::new("only").unwrap();
    let group = Group::new([identity.commitment()]).unwrap();
    let artifacts = artifacts(1);

    let err = circuit::prove(&artifacts, &inputs(&group, &identity, 2)).unwrap_err();
    assert!(matches!(err, SemaphoreError::Validation(_)));
}

#[test]
fn test_unsupported_depth_has_no_artifacts() {
    let source = KeygenSource::new();
    for depth in [0, 33] {
        assert!(source
            .fetch(&ArtifactKey::new(depth, ARTIFACT_VERSION))
            .is_err());
    }
}
