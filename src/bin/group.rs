use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use pasta_curves::pallas;
use zkp_semaphore::{
    utils::{field_to_decimal, parse_field},
    Group,
};

#[derive(Parser, Debug)]
#[command(name = "semaphore-group", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove a member and print "<siblings> <root>" for its emptied leaf.
    RemoveMember {
        /// Comma-separated commitments.
        members: String,
        /// The commitment to remove.
        removal: String,
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

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::RemoveMember { members, removal } => {
            let members = parse_members(&members)?;
            let removal = parse_field(&removal, "removal")?;

            let mut group = Group::new(members)?;
            let index = group
                .index_of(removal)
                .context("Removal not found in members")?;
            group.remove_member(index)?;
            info!("Removed member at index {index}");

            let proof = group.generate_merkle_proof(index)?;
            let siblings: Vec<String> = proof.siblings.iter().copied().map(field_to_decimal).collect();
            println!("{} {}", siblings.join(","), field_to_decimal(proof.root));
        }
    }

    Ok(())
}
