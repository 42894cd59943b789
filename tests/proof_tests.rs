use std::sync::{Arc, OnceLock};
use zkp_semaphore::{
    codec, generate_proof, utils::field_to_decimal, verify_proof, ArtifactResolver, Group, Identity,
    KeygenSource, ProofOptions, SemaphoreError, SemaphoreProof, Signal, MAX_DEPTH,
};

fn resolver() -> &'static ArtifactResolver {
    static RESOLVER: OnceLock<ArtifactResolver> = OnceLock::new();
    RESOLVER.get_or_init(|| ArtifactResolver::new(KeygenSource::new()))
}

fn election() -> (Identity, Group) {
    let identity = Identity::new("semaphore").unwrap();
    let group = Group::new([
        identity.commitment(),
        Identity::new("member-b").unwrap().commitment(),
        Identity::new("member-c").unwrap().commitment(),
    ])
    .unwrap();
    (identity, group)
}

#[tokio::test]
async fn test_generate_and_verify() {
    let (identity, group) = election();

    let proof = generate_proof(
        &identity,
        &group,
        "yes",
        "election-1",
        ProofOptions::default(),
        resolver(),
    )
    .await
    .unwrap();

    assert_eq!(proof.merkle_tree_depth, 2);
    assert_eq!(proof.merkle_tree_root, field_to_decimal(group.root()));
    assert_eq!(
        proof.message,
        Signal::from("yes").to_biguint().unwrap().to_string()
    );
    assert!(verify_proof(&proof, resolver()).await.unwrap());

    let json = proof.to_json().unwrap();
    let parsed = SemaphoreProof::from_json(&json).unwrap();
    assert!(verify_proof(&parsed, resolver()).await.unwrap());
}

#[tokio::test]
async fn test_nullifier_is_scoped() {
    let (identity, group) = election();
    let prove = |message: &'static str, scope: &'static str| {
        let identity = identity.clone();
        let group = group.clone();
        async move {
            generate_proof(
                &identity,
                &group,
                message,
                scope,
                ProofOptions::default(),
                resolver(),
            )
            .await
            .unwrap()
        }
    };

    let first = prove("yes", "election-1").await;
    let second = prove("no", "election-1").await;
    let other_scope = prove("yes", "election-2").await;

    assert_eq!(first.nullifier, second.nullifier);
    assert_ne!(first.nullifier, other_scope.nullifier);
}

#[tokio::test]
async fn test_padded_depth_from_merkle_proof() {
    let (identity, group) = election();
    let merkle_proof = group.generate_merkle_proof(0).unwrap();

    let options = ProofOptions {
        merkle_tree_depth: Some(4),
        ..ProofOptions::default()
    };
    let proof = generate_proof(&identity, &merkle_proof, 1u64, 2u64, options, resolver())
        .await
        .unwrap();

    assert_eq!(proof.merkle_tree_depth, 4);
    assert_eq!(proof.merkle_tree_root, field_to_decimal(group.root()));
    assert!(verify_proof(&proof, resolver()).await.unwrap());
}

#[tokio::test]
async fn test_single_member_group() {
    let identity = Identity::new("alone").unwrap();
    let group = Group::new([identity.commitment()]).unwrap();

    let proof = generate_proof(
        &identity,
        &group,
        "hi",
        "topic",
        ProofOptions::default(),
        resolver(),
    )
    .await
    .unwrap();

    assert_eq!(proof.merkle_tree_depth, 1);
    assert_eq!(
        proof.merkle_tree_root,
        field_to_decimal(identity.commitment())
    );
    assert!(verify_proof(&proof, resolver()).await.unwrap());
}

#[tokio::test]
async fn test_depth_out_of_range_is_rejected() {
    let (identity, group) = election();

    for depth in [0, MAX_DEPTH + 1] {
        let options = ProofOptions {
            merkle_tree_depth: Some(depth),
            ..ProofOptions::default()
        };
        let err = generate_proof(&identity, &group, "yes", "election-1", options, resolver())
            .await
            .unwrap_err();
        assert!(matches!(err, SemaphoreError::Validation(_)), "{err}");
    }

    let proof = SemaphoreProof {
        merkle_tree_depth: MAX_DEPTH + 1,
        merkle_tree_root: "1".into(),
        nullifier: "2".into(),
        message: "3".into(),
        scope: "4".into(),
        points: vec!["0x00".into()],
    };
    assert!(matches!(
        verify_proof(&proof, resolver()).await,
        Err(SemaphoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_depth_shorter_than_path_is_rejected() {
    let (identity, group) = election();
    let options = ProofOptions {
        merkle_tree_depth: Some(1),
        ..ProofOptions::default()
    };
    let err = generate_proof(&identity, &group, "yes", "election-1", options, resolver())
        .await
        .unwrap_err();
    assert!(matches!(err, SemaphoreError::Validation(_)));
}

#[tokio::test]
async fn test_non_member_is_not_found() {
    let (_, group) = election();
    let outsider = Identity::new("outsider").unwrap();

    let err = generate_proof(
        &outsider,
        &group,
        "yes",
        "election-1",
        ProofOptions::default(),
        resolver(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SemaphoreError::NotFound(_)));
}

#[tokio::test]
async fn test_mismatched_artifacts_are_rejected() {
    let (identity, group) = election();
    let artifacts = resolver().resolve(1).await.unwrap();

    let options = ProofOptions {
        merkle_tree_depth: None,
        artifacts: Some(Arc::clone(&artifacts)),
    };
    let err = generate_proof(&identity, &group, "yes", "election-1", options, resolver())
        .await
        .unwrap_err();
    assert!(matches!(err, SemaphoreError::Validation(_)));
}

#[tokio::test]
async fn test_tampered_proof_fails() {
    let (identity, group) = election();
    let proof = generate_proof(
        &identity,
        &group,
        "yes",
        "election-1",
        ProofOptions::default(),
        resolver(),
    )
    .await
    .unwrap();

    let mut other_message = proof.clone();
    other_message.message = Signal::from("no").to_biguint().unwrap().to_string();
    assert!(!verify_proof(&other_message, resolver()).await.unwrap());

    let mut other_nullifier = proof.clone();
    other_nullifier.nullifier = "1".into();
    assert!(!verify_proof(&other_nullifier, resolver()).await.unwrap());

    let mut other_root = proof.clone();
    other_root.merkle_tree_root = "12345".into();
    assert!(!verify_proof(&other_root, resolver()).await.unwrap());

    // The first word after the length header holds transcript bytes.
    let mut corrupted = proof.clone();
    corrupted.points[1] = format!("0x{}", "11".repeat(32));
    assert!(!verify_proof(&corrupted, resolver()).await.unwrap());

    let mut transcript = codec::unpack(&proof.points).unwrap();
    transcript.extend_from_slice(&[7u8; 64]);
    let mut trailing = proof.clone();
    trailing.points = codec::pack(&transcript);
    assert!(!verify_proof(&trailing, resolver()).await.unwrap());
}

#[tokio::test]
async fn test_malformed_proof_json() {
    let err = SemaphoreProof::from_json(r#"{"merkleTreeDepth": 2}"#).unwrap_err();
    assert!(matches!(err, SemaphoreError::Validation(_)));

    let err = SemaphoreProof::from_json("not json").unwrap_err();
    assert!(matches!(err, SemaphoreError::Validation(_)));
}
