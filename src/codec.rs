//! Compact wire form of a proof transcript.
//!
//! A halo2 transcript is a byte string of 32-byte point and scalar
//! encodings. On the wire it becomes an array of `0x`-prefixed 64-digit hex
//! words: a header word holding the transcript length in bytes, then the
//! transcript cut into 32-byte words with the last one zero-padded.

use crate::error::{Result, SemaphoreError};
use crate::utils::validate_and_strip_hex;

/// Bytes per packed word.
pub const WORD_BYTES: usize = 32;

const WORD_HEX_LEN: usize = WORD_BYTES * 2;

fn encode_word(word: &[u8; WORD_BYTES]) -> String {
    format!("0x{}", hex::encode(word))
}

fn decode_word(word: &str, position: usize) -> Result<[u8; WORD_BYTES]> {
    if !word.trim_start().starts_with("0x") && !word.trim_start().starts_with("0X") {
        return Err(SemaphoreError::validation(format!(
            "proof word {position} must start with 0x"
        )));
    }
    let digits = validate_and_strip_hex(word, WORD_HEX_LEN)
        .map_err(|e| SemaphoreError::validation(format!("proof word {position}: {e}")))?;
    let mut bytes = [0u8; WORD_BYTES];
    hex::decode_to_slice(digits, &mut bytes)
        .map_err(|e| SemaphoreError::validation(format!("proof word {position}: {e}")))?;
    Ok(bytes)
}

/// Packs a transcript into its header and data words.
#[must_use]
pub fn pack(proof: &[u8]) -> Vec<String> {
    let mut header = [0u8; WORD_BYTES];
    header[WORD_BYTES - 8..].copy_from_slice(&(proof.len() as u64).to_be_bytes());

    let mut points = Vec::with_capacity(1 + proof.len().div_ceil(WORD_BYTES));
    points.push(encode_word(&header));
    for chunk in proof.chunks(WORD_BYTES) {
        let mut word = [0u8; WORD_BYTES];
        word[..chunk.len()].copy_from_slice(chunk);
        points.push(encode_word(&word));
    }
    points
}

/// Inverse of [`pack`].
///
/// # Errors
/// Returns a validation error for an empty array, a word that is not
/// `0x` plus 64 hex digits, a word count that disagrees with the header, or
/// non-zero padding.
pub fn unpack<S: AsRef<str>>(points: &[S]) -> Result<Vec<u8>> {
    let (header, words) = points
        .split_first()
        .ok_or_else(|| SemaphoreError::validation("proof points are empty"))?;

    let header = decode_word(header.as_ref(), 0)?;
    if header[..WORD_BYTES - 8].iter().any(|b| *b != 0) {
        return Err(SemaphoreError::validation(
            "proof length header is out of range",
        ));
    }
    let mut length_bytes = [0u8; 8];
    length_bytes.copy_from_slice(&header[WORD_BYTES - 8..]);
    let length = usize::try_from(u64::from_be_bytes(length_bytes))
        .map_err(|_| SemaphoreError::validation("proof length header is out of range"))?;

    let expected_words = length.div_ceil(WORD_BYTES);
    if words.len() != expected_words {
        return Err(SemaphoreError::validation(format!(
            "proof header announces {length} bytes ({expected_words} words), got {} words",
            words.len()
        )));
    }

    let mut proof = Vec::with_capacity(expected_words * WORD_BYTES);
    for (position, word) in words.iter().enumerate() {
        proof.extend_from_slice(&decode_word(word.as_ref(), position + 1)?);
    }
    if proof[length..].iter().any(|b| *b != 0) {
        return Err(SemaphoreError::validation("proof padding is not zero"));
    }
    proof.truncate(length);
    Ok(proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_layout() {
        let points = pack(&[0xab; 33]);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], format!("0x{}21", "0".repeat(62)));
        assert_eq!(points[1], format!("0x{}", "ab".repeat(32)));
        assert_eq!(points[2], format!("0xab{}", "0".repeat(62)));
    }

    #[test]
    fn test_empty_transcript() {
        let points = pack(&[]);
        assert_eq!(points.len(), 1);
        assert!(unpack(&points).unwrap().is_empty());
    }

    #[test]
    fn test_unpack_rejects_empty_array() {
        let points: Vec<String> = Vec::new();
        assert!(matches!(unpack(&points), Err(SemaphoreError::Validation(_))));
    }

    #[test]
    fn test_unpack_rejects_word_count_mismatch() {
        let mut points = pack(&[1u8; 64]);
        points.pop();
        assert!(unpack(&points).is_err());
    }

    #[test]
    fn test_unpack_rejects_malformed_words() {
        let mut points = pack(&[1u8; 32]);
        points[1] = "0x1234".to_string();
        assert!(unpack(&points).is_err());

        let mut points = pack(&[1u8; 32]);
        points[1] = format!("0x{}", "zz".repeat(32));
        assert!(unpack(&points).is_err());

        let mut points = pack(&[1u8; 32]);
        points[1] = "01".repeat(32);
        assert!(unpack(&points).is_err());
    }

    #[test]
    fn test_unpack_rejects_dirty_padding() {
        let mut points = pack(&[1u8; 1]);
        points[1] = format!("0x01{}", "ff".repeat(31));
        assert!(unpack(&points).is_err());
    }

    proptest! {
        #[test]
        fn prop_unpack_inverts_pack(proof in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let points = pack(&proof);
            prop_assert_eq!(points.len(), 1 + proof.len().div_ceil(WORD_BYTES));
            prop_assert_eq!(unpack(&points).unwrap(), proof);
        }
    }
}
