use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use pasta_curves::pallas;
use std::fs;
use std::path::PathBuf;
use zkp_semaphore::{
    generate_proof, utils::parse_field, verify_proof, ArtifactResolver, Config, Group, Identity,
    NullifierRegistry, ProofOptions, SemaphoreProof,
};

#[derive(Parser, Debug)]
#[command(name = "semaphore-proof", author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a proof and print it as JSON.
    GenProof {
        secret_key: String,
        /// Comma-separated commitments.
        members: String,
        scope: String,
        message: String,
        /// Circuit depth; defaults to the group depth.
        #[arg(long)]
        depth: Option<usize>,
        /// Also write the proof to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify a proof file and record its nullifier.
    VerifyProof {
        proof_file: PathBuf,
        /// Do not check or record the nullifier.
        #[arg(long)]
        no_record: bool,
        /// Nullifier registry; defaults to the configured one.
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

fn parse_members(members: &str) -> Result<Vec<pallas::Base>> {
    members
        .split(',')
        .enumerate()
        .map(|(i, member)| {
            parse_field(member, "member").with_context(|| format!("Invalid member at position {i}"))
        })
        .collect()
}

fn read_proof(path: &PathBuf, max_file_size: u64) -> Result<SemaphoreProof> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read proof file metadata: {}", path.display()))?;
    debug!("Proof file size: {} bytes", metadata.len());
    if metadata.len() > max_file_size {
        bail!(
            "Proof file too large: {} bytes (max {max_file_size} bytes). Set SEMAPHORE_MAX_PROOF_FILE_SIZE to raise the limit",
            metadata.len()
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read proof file: {}", path.display()))?;
    Ok(SemaphoreProof::from_json(&content)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let resolver = ArtifactResolver::from_config(&config.artifacts);

    match args.command {
        Command::GenProof {
            secret_key,
            members,
            scope,
            message,
            depth,
            output,
        } => {
            if secret_key.is_empty() {
                bail!("Secret key can't be empty");
            }
            let identity = Identity::new(&secret_key)?;
            let group = Group::new(parse_members(&members)?)?;

            let options = ProofOptions {
                merkle_tree_depth: depth,
                ..ProofOptions::default()
            };
            let proof = generate_proof(
                &identity,
                &group,
                message.as_str(),
                scope.as_str(),
                options,
                &resolver,
            )
            .await?;

            let json = serde_json::to_string(&proof).context("Failed to serialize proof")?;
            if let Some(output) = output {
                fs::write(&output, proof.to_json()?)
                    .with_context(|| format!("Failed to write proof file: {}", output.display()))?;
                info!("Proof written to {}", output.display());
            }
            println!("{json}");
        }
        Command::VerifyProof {
            proof_file,
            no_record,
            registry,
        } => {
            info!("Loading proof from: {}", proof_file.display());
            let proof = read_proof(&proof_file, config.proof.max_file_size)?;

            let registry = (!no_record).then(|| {
                NullifierRegistry::new(
                    registry.unwrap_or_else(|| config.nullifiers.registry_file.clone()),
                )
            });
            // A replayed signal is rejected before paying for verification.
            if let Some(registry) = &registry {
                if registry.contains(&proof.scope, &proof.nullifier)? {
                    bail!(
                        "Nullifier {} was already used for scope {}",
                        proof.nullifier,
                        proof.scope
                    );
                }
            }

            let valid = verify_proof(&proof, &resolver).await?;
            match (&registry, valid) {
                (Some(registry), true) => {
                    registry
                        .check_and_add(&proof.scope, &proof.nullifier)
                        .with_context(|| {
                            format!("Failed to record nullifier in {}", registry.path().display())
                        })?;
                    info!("Nullifier recorded to: {}", registry.path().display());
                }
                (_, false) => warn!("Proof verification failed"),
                (None, true) => debug!("Skipping nullifier registry"),
            }
            println!("{valid}");
        }
    }

    Ok(())
}
