//! Field, hex and decimal conversions plus the Poseidon helpers.

use crate::error::{Result, SemaphoreError};
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use num_bigint::BigUint;
use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Removes surrounding whitespace and an optional `0x`/`0X` prefix.
pub fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns a validation error if the stripped string does not have
/// `expected_len` characters or contains non-hex characters.
///
/// # Examples
///
/// ```
/// use zkp_semaphore::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(SemaphoreError::validation(format!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(SemaphoreError::validation(
            "Invalid hex string: contains non-hex characters",
        ));
    }

    Ok(stripped.to_string())
}

const BASE_U64: u64 = 256;

/// Interprets `bytes` as a big-endian base-256 number, reduced into `F`.
///
/// Works for both the Pallas base field and its scalar field. Inputs shorter
/// than the modulus width are never reduced.
#[inline]
#[must_use]
pub fn bytes_to_field<F: PrimeField>(bytes: &[u8]) -> F {
    let mut value = F::ZERO;
    let base = F::from(BASE_U64);

    for &byte in bytes {
        value = value * base + F::from(u64::from(byte));
    }

    value
}

/// Little-endian canonical representation of a base field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let repr = field.to_repr();
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

/// Big-endian 32-byte encoding of a base field element.
#[must_use]
pub fn field_to_be_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = field_to_bytes(field);
    bytes.reverse();
    bytes
}

/// Reinterprets a base field element as a scalar.
///
/// The Pallas base modulus is smaller than the scalar modulus, so the value
/// is carried over unchanged.
#[must_use]
pub fn scalar_from_base(field: pallas::Base) -> pallas::Scalar {
    bytes_to_field(&field_to_be_bytes(field))
}

#[must_use]
pub fn field_to_biguint(field: pallas::Base) -> BigUint {
    BigUint::from_bytes_le(&field_to_bytes(field))
}

#[must_use]
pub fn scalar_to_biguint(scalar: pallas::Scalar) -> BigUint {
    BigUint::from_bytes_le(scalar.to_repr().as_ref())
}

/// Decimal rendering used on the wire.
#[must_use]
pub fn field_to_decimal(field: pallas::Base) -> String {
    field_to_biguint(field).to_string()
}

/// Parses a decimal or `0x`-prefixed hex integer.
#[must_use]
pub fn parse_biguint(input: &str) -> Option<BigUint> {
    let trimmed = input.trim();
    if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex_digits.is_empty() || !is_valid_hex_string(hex_digits) {
            return None;
        }
        return BigUint::parse_bytes(hex_digits.as_bytes(), 16);
    }
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
}

/// Converts an integer into a base field element if it is below the modulus.
#[must_use]
pub fn biguint_to_field(value: &BigUint) -> Option<pallas::Base> {
    let repr = biguint_to_le_word(value)?;
    Option::from(pallas::Base::from_repr(repr))
}

/// Converts an integer into a scalar if it is below the scalar modulus.
#[must_use]
pub fn biguint_to_scalar(value: &BigUint) -> Option<pallas::Scalar> {
    let repr = biguint_to_le_word(value)?;
    Option::from(pallas::Scalar::from_repr(repr))
}

fn biguint_to_le_word(value: &BigUint) -> Option<[u8; 32]> {
    let bytes = value.to_bytes_le();
    if bytes.len() > 32 {
        return None;
    }
    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(&bytes);
    Some(word)
}

/// Big-endian, zero-padded 32-byte encoding of an integer of at most 256 bits.
#[must_use]
pub fn biguint_to_be_word(value: &BigUint) -> Option<[u8; 32]> {
    let mut word = biguint_to_le_word(value)?;
    word.reverse();
    Some(word)
}

/// Parses a field element given in decimal or hex, naming the value in errors.
pub fn parse_field(input: &str, name: &str) -> Result<pallas::Base> {
    let value = parse_biguint(input).ok_or_else(|| {
        SemaphoreError::validation(format!("{name} must be an integer, got '{input}'"))
    })?;
    biguint_to_field(&value).ok_or_else(|| {
        SemaphoreError::validation(format!("{name} is not below the field modulus"))
    })
}

/// Poseidon hash of two field elements using `P128Pow5T3` specification.
///
/// This is the node hash of the group tree, the commitment hash of a public
/// key and the nullifier hash of (scope, secret).
///
/// # Example
///
/// ```
/// use zkp_semaphore::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// let hash = poseidon_hash(left, right);
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    poseidon_hash_many([left, right])
}

/// Poseidon over a fixed number of field elements.
#[inline]
#[must_use]
pub fn poseidon_hash_many<const L: usize>(inputs: [pallas::Base; L]) -> pallas::Base {
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<L>, 3, 2>::init().hash(inputs)
}
