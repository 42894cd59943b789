use num_bigint::BigUint;
use std::process::{Command, Output};
use tempfile::TempDir;
use zkp_semaphore::{
    utils::{field_to_biguint, field_to_decimal},
    Group, Identity,
};

fn run(bin: &str, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary")
}

fn identity(args: &[&str]) -> Output {
    run(env!("CARGO_BIN_EXE_semaphore-identity"), args)
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap().trim().to_string()
}

fn decimal_to_hex_word(decimal: &str) -> String {
    let value = BigUint::parse_bytes(decimal.as_bytes(), 10).unwrap();
    format!("{:0>64}", value.to_str_radix(16))
}

fn hex_concat(decimals: &[&str]) -> String {
    let words: Vec<String> = decimals.iter().map(|d| decimal_to_hex_word(d)).collect();
    format!("0x{}", words.concat())
}

#[test]
fn test_get_public_key_is_deterministic() {
    let first = stdout(&identity(&["get-public-key", "alice"]));
    let second = stdout(&identity(&["get-public-key", "alice"]));
    assert_eq!(first, second);

    let expected = Identity::new("alice").unwrap().public_key();
    assert_eq!(
        first,
        format!(
            "{} {}",
            field_to_decimal(expected.x),
            field_to_decimal(expected.y)
        )
    );
}

#[test]
fn test_get_commitment_is_hex() {
    let output = stdout(&identity(&["get-commitment", "alice"]));
    let commitment = Identity::new("alice").unwrap().commitment();
    assert_eq!(output, field_to_biguint(commitment).to_str_radix(16));
}

#[test]
fn test_sign_then_verify() {
    let public_key = stdout(&identity(&["get-public-key", "alice"]));
    let public_key: Vec<&str> = public_key.split(' ').collect();
    let signature = stdout(&identity(&["sign", "alice", "42"]));
    let signature: Vec<&str> = signature.split(' ').collect();
    assert_eq!(signature.len(), 3);

    let public_key_hex = hex_concat(&public_key);
    let signature_hex = hex_concat(&signature);
    assert_eq!(public_key_hex.len(), 130);
    assert_eq!(signature_hex.len(), 194);

    let valid = stdout(&identity(&["verify", &public_key_hex, "42", &signature_hex]));
    assert_eq!(valid, "true");

    let invalid = stdout(&identity(&["verify", &public_key_hex, "43", &signature_hex]));
    assert_eq!(invalid, "false");
}

#[test]
fn test_verify_rejects_short_public_key() {
    let signature = stdout(&identity(&["sign", "alice", "42"]));
    let signature: Vec<&str> = signature.split(' ').collect();
    let short_key = format!("0x{}", "ab".repeat(63));
    assert_eq!(short_key.len(), 128);

    let output = identity(&["verify", &short_key, "42", &hex_concat(&signature)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("130 characters"));
}

#[test]
fn test_empty_secret_key_fails() {
    let output = identity(&["get-public-key", ""]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("can't be empty"));

    let output = identity(&["get-commitment"]);
    assert!(!output.status.success());
}

#[test]
fn test_remove_member_output() {
    let members: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|seed| Identity::new(seed).unwrap().commitment())
        .collect();
    let list: Vec<String> = members.iter().copied().map(field_to_decimal).collect();

    let output = stdout(&run(
        env!("CARGO_BIN_EXE_semaphore-group"),
        &["remove-member", &list.join(","), &list[1]],
    ));

    let mut group = Group::new(members).unwrap();
    group.remove_member(1).unwrap();
    let proof = group.generate_merkle_proof(1).unwrap();
    let siblings: Vec<String> = proof.siblings.iter().copied().map(field_to_decimal).collect();
    assert_eq!(
        output,
        format!("{} {}", siblings.join(","), field_to_decimal(group.root()))
    );
}

#[test]
fn test_remove_unknown_member_fails() {
    let output = run(
        env!("CARGO_BIN_EXE_semaphore-group"),
        &["remove-member", "1,2,3", "4"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Removal not found"));
}

#[test]
fn test_gen_and_verify_proof_records_nullifier() {
    let dir = TempDir::new().unwrap();
    let proof_file = dir.path().join("proof.json");
    let registry = dir.path().join("nullifiers.txt");
    let proof_bin = env!("CARGO_BIN_EXE_semaphore-proof");

    let members: Vec<String> = ["alice", "bob"]
        .iter()
        .map(|seed| field_to_decimal(Identity::new(seed).unwrap().commitment()))
        .collect();

    let proof_cmd = |args: &[&str]| {
        Command::new(proof_bin)
            .args(args)
            .env("RUST_LOG", "warn")
            .env("SEMAPHORE_ARTIFACT_DIR", dir.path().join("artifacts"))
            .output()
            .unwrap()
    };

    let json = stdout(&proof_cmd(&[
        "gen-proof",
        "alice",
        &members.join(","),
        "poll",
        "yes",
        "-o",
        proof_file.to_str().unwrap(),
    ]));
    assert!(json.contains("\"merkleTreeDepth\":1"));
    assert!(proof_file.exists());

    let verify_args = [
        "verify-proof",
        proof_file.to_str().unwrap(),
        "--registry",
        registry.to_str().unwrap(),
    ];
    assert_eq!(stdout(&proof_cmd(&verify_args)), "true");
    assert_eq!(std::fs::read_to_string(&registry).unwrap().lines().count(), 1);

    let replay = proof_cmd(&verify_args);
    assert!(!replay.status.success());
    assert!(String::from_utf8_lossy(&replay.stderr).contains("already used"));
    assert_eq!(std::fs::read_to_string(&registry).unwrap().lines().count(), 1);

    let unrecorded = proof_cmd(&[
        "verify-proof",
        proof_file.to_str().unwrap(),
        "--no-record",
        "--registry",
        registry.to_str().unwrap(),
    ]);
    assert_eq!(stdout(&unrecorded), "true");
}
