//! BN254 scalar field helpers.
//!
//! Every commitment, nullifier, and Merkle node in the toolkit is an element
//! of the BN254 scalar field. This module owns the conversions between field
//! elements and the byte/hex/decimal encodings used on the wire.

use ark_ff::{BigInteger, PrimeField};
use ark_std::UniformRand;
use num_bigint::BigUint;
use privacykit_types::{PrivacyKitError, PrivacyKitResult};

pub use ark_bn254::Fr;

/// The field modulus as an arbitrary-precision integer.
pub fn field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

/// Sample uniformly in [0, P). The upstream implementation drew 31 bytes of
/// randomness instead; uniform sampling keeps the full 254 bits of entropy.
pub fn random_field() -> Fr {
    Fr::rand(&mut ark_std::rand::thread_rng())
}

/// True iff the 32 big-endian bytes encode a canonical representative (< P).
pub fn is_valid_field_bytes(bytes: &[u8; 32]) -> bool {
    BigUint::from_bytes_be(bytes) < field_modulus()
}

/// Interpret bytes big-endian and reduce modulo P.
pub fn bytes_to_field(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// 32 big-endian bytes of the canonical representative.
pub fn field_to_bytes(value: &Fr) -> [u8; 32] {
    let repr = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - repr.len()..].copy_from_slice(&repr);
    out
}

pub fn field_to_hex(value: &Fr) -> String {
    hex::encode(field_to_bytes(value))
}

pub fn hex_to_field(s: &str) -> PrivacyKitResult<Fr> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)
        .map_err(|e| PrivacyKitError::InvalidFormat(format!("invalid hex: {}", e)))?;
    if bytes.len() > 32 {
        return Err(PrivacyKitError::InvalidFormat(format!(
            "hex value is {} bytes, expected at most 32",
            bytes.len()
        )));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(&bytes);
    if !is_valid_field_bytes(&buf) {
        return Err(PrivacyKitError::InvalidFormat(
            "hex value exceeds the field modulus".to_string(),
        ));
    }
    Ok(Fr::from_be_bytes_mod_order(&buf))
}

/// Decimal string of the canonical representative. The encoding notes and
/// proofs carry on the wire.
pub fn field_to_decimal(value: &Fr) -> String {
    BigUint::from_bytes_be(&field_to_bytes(value)).to_str_radix(10)
}

pub fn decimal_to_field(s: &str) -> PrivacyKitResult<Fr> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PrivacyKitError::InvalidFormat(format!(
            "not a decimal integer: {:?}",
            s
        )));
    }
    let value = BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| {
        PrivacyKitError::InvalidFormat(format!("not a decimal integer: {:?}", s))
    })?;
    if value >= field_modulus() {
        return Err(PrivacyKitError::InvalidFormat(
            "decimal value exceeds the field modulus".to_string(),
        ));
    }
    Ok(Fr::from_le_bytes_mod_order(&value.to_bytes_le()))
}
