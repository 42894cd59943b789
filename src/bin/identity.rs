use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use zkp_semaphore::{
    identity::{Point, Signature},
    utils::{field_to_biguint, field_to_decimal, parse_field, scalar_to_biguint, validate_and_strip_hex},
    Identity,
};

/// `0x` plus 64 bytes of hex.
const PUBLIC_KEY_LEN: usize = 130;
/// `0x` plus 96 bytes of hex.
const SIGNATURE_LEN: usize = 194;

#[derive(Parser, Debug)]
#[command(name = "semaphore-identity", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the public key as "<x> <y>".
    GetPublicKey { secret_key: Option<String> },
    /// Print the identity commitment in hex.
    GetCommitment { secret_key: Option<String> },
    /// Sign an integer message and print "<R8x> <R8y> <S>".
    Sign {
        secret_key: Option<String>,
        message: Option<String>,
    },
    /// Verify a signature. The public key is 0x‖x‖y and the signature
    /// 0x‖R8x‖R8y‖S, each coordinate 32 bytes of big-endian hex.
    Verify {
        public_key: Option<String>,
        message: Option<String>,
        signature: Option<String>,
    },
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{name} can't be empty"),
    }
}

fn decode_fixed_hex(input: &str, expected_len: usize, name: &str) -> Result<Vec<u8>> {
    if input.len() != expected_len {
        bail!(
            "{name} must be {expected_len} characters (0x followed by {} hex digits), got {}",
            expected_len - 2,
            input.len()
        );
    }
    if !input.starts_with("0x") {
        bail!("{name} must start with 0x");
    }
    let digits = validate_and_strip_hex(input, expected_len - 2)
        .with_context(|| format!("Invalid {name}"))?;
    hex::decode(digits).with_context(|| format!("Failed to decode {name}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::GetPublicKey { secret_key } => {
            let identity = Identity::new(required(secret_key, "Secret key")?)?;
            let public_key = identity.public_key();
            println!(
                "{} {}",
                field_to_decimal(public_key.x),
                field_to_decimal(public_key.y)
            );
        }
        Command::GetCommitment { secret_key } => {
            let identity = Identity::new(required(secret_key, "Secret key")?)?;
            println!("{}", field_to_biguint(identity.commitment()).to_str_radix(16));
        }
        Command::Sign {
            secret_key,
            message,
        } => {
            let identity = Identity::new(required(secret_key, "Secret key")?)?;
            let message = parse_field(&required(message, "Message")?, "message")?;
            let signature = identity.sign_message(message)?;
            println!(
                "{} {} {}",
                field_to_decimal(signature.r8.x),
                field_to_decimal(signature.r8.y),
                scalar_to_biguint(signature.s)
            );
        }
        Command::Verify {
            public_key,
            message,
            signature,
        } => {
            let public_key = required(public_key, "Public key")?;
            let message = required(message, "Message")?;
            let signature = required(signature, "Signature")?;

            let public_key = Point::from_be_bytes(&decode_fixed_hex(
                &public_key,
                PUBLIC_KEY_LEN,
                "public key",
            )?)?;
            let signature =
                Signature::from_be_bytes(&decode_fixed_hex(&signature, SIGNATURE_LEN, "signature")?)?;
            let message = parse_field(&message, "message")?;
            debug!("Verifying signature against public key {public_key:?}");

            println!(
                "{}",
                Identity::verify_signature(message, &signature, &public_key)
            );
        }
    }

    Ok(())
}
