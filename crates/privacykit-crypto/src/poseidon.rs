//! Canonical Poseidon hash over the BN254 scalar field.
//!
//! One parameter set is shared by every component that hashes: commitments,
//! nullifiers, and the Merkle tree. Mixing parameter sets would produce roots
//! and commitments that cannot be combined, so all callers go through the
//! functions in this module.
//!
//! ## Parameters
//! - Width: 3 (rate = 2, capacity = 1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks standard)

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use std::sync::OnceLock;

use crate::field::{bytes_to_field, field_to_bytes};

static POSEIDON_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Process-wide Poseidon configuration, initialized once.
pub fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    POSEIDON_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            field_bits,
            rate,
            full_rounds,
            partial_rounds,
            0, // skip_matrices
        );

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

/// Idempotent parameter warm-up. Safe to call from every entry point that
/// hashes; the first caller pays the Grain LFSR expansion.
pub fn init_poseidon() {
    let _ = poseidon_config();
}

fn sponge_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Arity-2 hash. The Merkle tree and commitment workhorse.
pub fn poseidon_hash(left: Fr, right: Fr) -> Fr {
    sponge_hash(&[left, right])
}

/// Arity-1 hash. Used for nullifier hashes.
pub fn poseidon_hash_single(input: Fr) -> Fr {
    sponge_hash(&[input])
}

/// Hash any number of field elements. `poseidon_hash_many(&[x, y])` equals
/// `poseidon_hash(x, y)`, so two-input callers may use either entry point.
pub fn poseidon_hash_many(inputs: &[Fr]) -> PrivacyKitResult<Fr> {
    if inputs.is_empty() {
        return Err(PrivacyKitError::InvalidInput(
            "poseidon_hash_many requires at least one input".to_string(),
        ));
    }
    Ok(sponge_hash(inputs))
}

/// Arity-2 hash over 32-byte big-endian encodings.
pub fn poseidon_hash_bytes(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    field_to_bytes(&poseidon_hash(bytes_to_field(left), bytes_to_field(right)))
}
