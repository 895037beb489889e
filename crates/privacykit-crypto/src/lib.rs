#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod ecdh;
pub mod field;
pub mod merkle;
pub mod note;
pub mod poseidon;
pub mod proof;

pub use ecdh::*;
pub use field::*;
pub use merkle::*;
pub use note::*;
pub use poseidon::*;
pub use proof::*;

/// Fill a fixed-size array with OS randomness.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Length-checked constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
