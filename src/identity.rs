//! Identities: key derivation, commitments and signatures.
//!
//! An identity is a key pair on the Pallas curve. Point coordinates live in
//! `pallas::Base`, the same field the circuit and Poseidon work over, so the
//! public key hashes directly into the identity commitment
//! `Poseidon(pk.x, pk.y)`.
//!
//! The secret scalar is derived from the private key as
//! `SHA3-512(private_key) mod p`. Because the base modulus p is smaller
//! than the scalar modulus q, the same value is used as the curve scalar and
//! as the in-circuit secret that feeds the nullifier.
//!
//! Signatures are deterministic Schnorr signatures in the EdDSA style:
//! `R8 = r·G`, `c = Poseidon(R8.x, R8.y, A.x, A.y, m)`, `S = r + c·s`.

use crate::error::{Result, SemaphoreError};
use crate::utils::{
    biguint_to_field, biguint_to_scalar, bytes_to_field, field_to_be_bytes, field_to_bytes,
    poseidon_hash, poseidon_hash_many, scalar_from_base,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use num_bigint::BigUint;
use pasta_curves::arithmetic::{Coordinates, CurveAffine};
use pasta_curves::group::ff::PrimeField;
use pasta_curves::group::{Curve, Group as _};
use pasta_curves::pallas;
use rand::RngCore;
use sha3::{Digest, Sha3_512};
use std::fmt;
use zeroize::Zeroizing;

/// Size of a randomly generated private key.
pub const PRIVATE_KEY_SIZE: usize = 32;

const NONCE_DOMAIN: &[u8] = b"zkp-semaphore/signature-nonce";

/// An affine Pallas point given by its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: pallas::Base,
    pub y: pallas::Base,
}

pub type PublicKey = Point;

impl Point {
    fn from_projective(point: pallas::Point) -> Option<Self> {
        let coordinates: Option<Coordinates<pallas::Affine>> =
            point.to_affine().coordinates().into();
        coordinates.map(|coordinates| Point {
            x: *coordinates.x(),
            y: *coordinates.y(),
        })
    }

    /// The curve point, or `None` if the coordinates are not on the curve.
    #[must_use]
    pub fn to_curve(&self) -> Option<pallas::Point> {
        Option::<pallas::Affine>::from(pallas::Affine::from_xy(self.x, self.y))
            .map(pallas::Point::from)
    }

    /// Big-endian `x ‖ y`.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&field_to_be_bytes(self.x));
        bytes[32..].copy_from_slice(&field_to_be_bytes(self.y));
        bytes
    }

    /// Parses big-endian `x ‖ y`.
    ///
    /// # Errors
    /// Returns a validation error if the input is not 64 bytes or a
    /// coordinate is not below the field modulus.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(SemaphoreError::validation(format!(
                "a point is 64 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Point {
            x: be_word_to_field(&bytes[..32], "x coordinate")?,
            y: be_word_to_field(&bytes[32..], "y coordinate")?,
        })
    }
}

fn be_word_to_field(word: &[u8], name: &str) -> Result<pallas::Base> {
    biguint_to_field(&BigUint::from_bytes_be(word)).ok_or_else(|| {
        SemaphoreError::validation(format!("{name} is not below the field modulus"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r8: Point,
    pub s: pallas::Scalar,
}

impl Signature {
    /// Big-endian `R8.x ‖ R8.y ‖ S`.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 96] {
        let mut bytes = [0u8; 96];
        bytes[..64].copy_from_slice(&self.r8.to_be_bytes());
        let mut s = [0u8; 32];
        s.copy_from_slice(self.s.to_repr().as_ref());
        s.reverse();
        bytes[64..].copy_from_slice(&s);
        bytes
    }

    /// Parses big-endian `R8.x ‖ R8.y ‖ S`.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 96 {
            return Err(SemaphoreError::validation(format!(
                "a signature is 96 bytes, got {}",
                bytes.len()
            )));
        }
        let r8 = Point::from_be_bytes(&bytes[..64])?;
        let s = biguint_to_scalar(&BigUint::from_bytes_be(&bytes[64..])).ok_or_else(|| {
            SemaphoreError::validation("S is not below the scalar modulus")
        })?;
        Ok(Signature { r8, s })
    }
}

/// A group member's key material.
///
/// Construction is the only mutation; every getter is a read of values fixed
/// at derivation time.
#[derive(Clone)]
pub struct Identity {
    private_key: Zeroizing<Vec<u8>>,
    secret_scalar: pallas::Base,
    public_key: PublicKey,
    commitment: pallas::Base,
}

impl Identity {
    /// Derives an identity from a private key (any bytes or text).
    ///
    /// # Errors
    /// Returns a validation error if `private_key` is empty.
    pub fn new(private_key: impl AsRef<[u8]>) -> Result<Self> {
        let private_key = private_key.as_ref();
        if private_key.is_empty() {
            return Err(SemaphoreError::validation("private key can't be empty"));
        }

        let secret_scalar: pallas::Base = bytes_to_field(&Sha3_512::digest(private_key));
        let public_key = public_key_from_secret(secret_scalar).ok_or_else(|| {
            SemaphoreError::validation("private key derives the point at infinity")
        })?;

        Ok(Identity {
            private_key: Zeroizing::new(private_key.to_vec()),
            secret_scalar,
            public_key,
            commitment: Self::generate_commitment(&public_key),
        })
    }

    /// Derives an identity from fresh OS randomness.
    pub fn random() -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        rand::rngs::OsRng.fill_bytes(seed.as_mut());
        Self::new(seed.as_ref())
    }

    /// The private key as standard base64.
    #[must_use]
    pub fn export(&self) -> String {
        BASE64.encode(self.private_key.as_slice())
    }

    /// Inverse of [`Identity::export`].
    pub fn import(exported: &str) -> Result<Self> {
        let private_key = Zeroizing::new(BASE64.decode(exported.trim()).map_err(|e| {
            SemaphoreError::validation(format!("private key is not valid base64: {e}"))
        })?);
        Self::new(private_key.as_slice())
    }

    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    #[must_use]
    pub fn secret_scalar(&self) -> pallas::Base {
        self.secret_scalar
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    #[must_use]
    pub fn commitment(&self) -> pallas::Base {
        self.commitment
    }

    /// Signs a field element.
    ///
    /// # Errors
    /// Fails only if the derived nonce is zero.
    pub fn sign_message(&self, message: pallas::Base) -> Result<Signature> {
        let mut hasher = Sha3_512::new();
        hasher.update(NONCE_DOMAIN);
        hasher.update(Sha3_512::digest(self.private_key.as_slice()));
        hasher.update(field_to_bytes(message));
        let nonce: pallas::Scalar = bytes_to_field(&hasher.finalize());

        let r8 = Point::from_projective(pallas::Point::generator() * nonce)
            .ok_or_else(|| SemaphoreError::validation("signature nonce is zero"))?;
        let challenge = challenge(&r8, &self.public_key, message);
        let s = nonce + challenge * scalar_from_base(self.secret_scalar);

        Ok(Signature { r8, s })
    }

    /// Checks `S·G == R8 + c·A`. Points that are not on the curve fail.
    #[must_use]
    pub fn verify_signature(
        message: pallas::Base,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> bool {
        let (Some(a), Some(r)) = (public_key.to_curve(), signature.r8.to_curve()) else {
            return false;
        };
        if bool::from(a.is_identity()) {
            return false;
        }
        let challenge = challenge(&signature.r8, public_key, message);
        pallas::Point::generator() * signature.s == r + a * challenge
    }

    /// `Poseidon(pk.x, pk.y)`, the value stored in groups.
    #[must_use]
    pub fn generate_commitment(public_key: &PublicKey) -> pallas::Base {
        poseidon_hash(public_key.x, public_key.y)
    }
}

/// `secret·G` for the Pallas generator `G`, or `None` for a zero secret.
#[must_use]
pub fn public_key_from_secret(secret: pallas::Base) -> Option<PublicKey> {
    Point::from_projective(pallas::Point::generator() * scalar_from_base(secret))
}

fn challenge(r8: &Point, public_key: &PublicKey, message: pallas::Base) -> pallas::Scalar {
    scalar_from_base(poseidon_hash_many([
        r8.x,
        r8.y,
        public_key.x,
        public_key.y,
        message,
    ]))
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.private_key == other.private_key
    }
}

impl Eq for Identity {}
