//! Message and scope values.
//!
//! Callers may hand a message or scope over as an integer, a byte string or
//! text. Each variant has its own canonicalization into a 256-bit integer,
//! and every integer is then digested into a field element by
//! [`hash_signal`].
//!
//! Text that does not parse as an integer uses the bytes32-string encoding:
//! the UTF-8 bytes (at most 31 of them) are left-aligned in a 32-byte word,
//! the rest is zero-filled, and the word is read big-endian. The last byte is
//! always zero, so the encoding is lossless for strings without trailing NUL
//! characters.

use crate::error::{Result, SemaphoreError};
use crate::utils::{biguint_to_be_word, bytes_to_field, parse_biguint};
use num_bigint::BigUint;
use pasta_curves::pallas;
use sha3::{Digest, Keccak256};

/// Width of a canonical signal word in bytes.
pub const WORD_SIZE: usize = 32;

/// Longest text accepted by the bytes32-string encoding.
pub const MAX_TEXT_BYTES: usize = WORD_SIZE - 1;

/// A message or scope before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Integer(BigUint),
    /// Big-endian bytes, at most 32 of them.
    Bytes(Vec<u8>),
    /// Decimal or `0x` hex integers are read as integers, other text is
    /// packed into a word.
    Text(String),
}

impl Signal {
    /// The canonical 256-bit integer for this signal.
    ///
    /// # Errors
    /// Returns a validation error if the value does not fit in 256 bits, if
    /// there are more than 32 bytes, or if non-numeric text is longer than
    /// 31 bytes.
    pub fn to_biguint(&self) -> Result<BigUint> {
        match self {
            Signal::Integer(value) => canonical_integer(value.clone()),
            Signal::Bytes(bytes) => canonical_bytes(bytes),
            Signal::Text(text) => canonical_text(text),
        }
    }
}

fn canonical_integer(value: BigUint) -> Result<BigUint> {
    if value.bits() > (WORD_SIZE * 8) as u64 {
        return Err(SemaphoreError::validation(format!(
            "signal value {value} does not fit in {WORD_SIZE} bytes"
        )));
    }
    Ok(value)
}

fn canonical_bytes(bytes: &[u8]) -> Result<BigUint> {
    if bytes.len() > WORD_SIZE {
        return Err(SemaphoreError::validation(format!(
            "signal byte string must be at most {WORD_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(BigUint::from_bytes_be(bytes))
}

fn canonical_text(text: &str) -> Result<BigUint> {
    if let Some(value) = parse_biguint(text) {
        return canonical_integer(value);
    }

    let bytes = text.as_bytes();
    if bytes.len() > MAX_TEXT_BYTES {
        return Err(SemaphoreError::validation(format!(
            "signal text must be at most {MAX_TEXT_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    let mut word = [0u8; WORD_SIZE];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(BigUint::from_bytes_be(&word))
}

/// Digests a canonical signal into a field element.
///
/// Keccak-256 is applied to the 32-byte big-endian encoding and the digest
/// is shifted right by one byte, so the result has at most 248 bits and is
/// always below the field modulus.
///
/// # Errors
/// Returns a validation error if `value` is wider than 256 bits.
pub fn hash_signal(value: &BigUint) -> Result<pallas::Base> {
    let word = biguint_to_be_word(value).ok_or_else(|| {
        SemaphoreError::validation(format!("signal value {value} does not fit in 32 bytes"))
    })?;
    let digest = Keccak256::digest(word);
    Ok(bytes_to_field(&digest[..WORD_SIZE - 1]))
}

impl From<BigUint> for Signal {
    fn from(value: BigUint) -> Self {
        Signal::Integer(value)
    }
}

impl From<u64> for Signal {
    fn from(value: u64) -> Self {
        Signal::Integer(BigUint::from(value))
    }
}

impl From<pallas::Base> for Signal {
    fn from(value: pallas::Base) -> Self {
        Signal::Integer(crate::utils::field_to_biguint(value))
    }
}

impl From<Vec<u8>> for Signal {
    fn from(value: Vec<u8>) -> Self {
        Signal::Bytes(value)
    }
}

impl From<&[u8]> for Signal {
    fn from(value: &[u8]) -> Self {
        Signal::Bytes(value.to_vec())
    }
}

impl From<String> for Signal {
    fn from(value: String) -> Self {
        Signal::Text(value)
    }
}

impl From<&str> for Signal {
    fn from(value: &str) -> Self {
        Signal::Text(value.to_string())
    }
}
