//! Deposit notes: the spending material for note-based privacy pools.
//!
//! A note binds a random `secret` and `nullifier` to an amount of a token.
//! The pool stores `commitment = H(secret, nullifier)`; spending publishes
//! `nullifier_hash = H(nullifier)` so a second spend of the same note is
//! detectable without revealing which commitment was spent.

use ark_bn254::Fr;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use serde::{Deserialize, Serialize};

use crate::constant_time_eq;
use crate::field::{decimal_to_field, field_to_bytes, field_to_decimal, random_field};
use crate::poseidon::{poseidon_hash, poseidon_hash_single};

pub const NOTE_PREFIX: &str = "privacy-cash-note-v1-";

#[derive(Clone, Debug, PartialEq)]
pub struct DepositNote {
    pub secret: Fr,
    pub nullifier: Fr,
    pub amount: f64,
    pub token: String,
    pub commitment: Fr,
    pub nullifier_hash: Fr,
    /// Creation time in milliseconds since the epoch.
    pub timestamp: i64,
    /// Position in the pool tree, known once the deposit lands.
    pub leaf_index: Option<u64>,
}

/// Wire form of a note string. Field order is part of the format.
#[derive(Serialize, Deserialize)]
struct NoteWire {
    c: String,
    n: String,
    s: String,
    nu: String,
    a: f64,
    t: String,
    ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    li: Option<u64>,
}

/// Draw fresh spending material for `amount` of `token`.
pub fn generate_deposit_note(amount: f64, token: &str) -> PrivacyKitResult<DepositNote> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PrivacyKitError::InvalidInput(format!(
            "note amount must be positive, got {}",
            amount
        )));
    }

    let secret = random_field();
    let nullifier = random_field();

    Ok(DepositNote {
        secret,
        nullifier,
        amount,
        token: token.to_string(),
        commitment: poseidon_hash(secret, nullifier),
        nullifier_hash: poseidon_hash_single(nullifier),
        timestamp: chrono::Utc::now().timestamp_millis(),
        leaf_index: None,
    })
}

/// Deterministic commitment recomputation, used to prove a note is untampered.
pub fn regenerate_commitment(secret: Fr, nullifier: Fr) -> Fr {
    poseidon_hash(secret, nullifier)
}

/// True iff the stored commitment and nullifier hash match the secrets.
pub fn verify_note(note: &DepositNote) -> bool {
    let commitment = field_to_bytes(&regenerate_commitment(note.secret, note.nullifier));
    let nullifier_hash = field_to_bytes(&poseidon_hash_single(note.nullifier));

    constant_time_eq(&commitment, &field_to_bytes(&note.commitment))
        && constant_time_eq(&nullifier_hash, &field_to_bytes(&note.nullifier_hash))
}

pub fn encode_note(note: &DepositNote) -> String {
    let wire = NoteWire {
        c: field_to_decimal(&note.commitment),
        n: field_to_decimal(&note.nullifier_hash),
        s: field_to_decimal(&note.secret),
        nu: field_to_decimal(&note.nullifier),
        a: note.amount,
        t: note.token.clone(),
        ts: note.timestamp,
        li: note.leaf_index,
    };
    let json = serde_json::to_vec(&wire).expect("note wire serialization");
    format!("{}{}", NOTE_PREFIX, URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_note(encoded: &str) -> PrivacyKitResult<DepositNote> {
    let body = encoded.strip_prefix(NOTE_PREFIX).ok_or_else(|| {
        PrivacyKitError::InvalidFormat(format!("note is missing the {:?} prefix", NOTE_PREFIX))
    })?;

    let json = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|e| PrivacyKitError::InvalidFormat(format!("invalid note base64: {}", e)))?;

    let wire: NoteWire = serde_json::from_slice(&json)
        .map_err(|e| PrivacyKitError::InvalidFormat(format!("invalid note JSON: {}", e)))?;

    Ok(DepositNote {
        secret: decimal_to_field(&wire.s)?,
        nullifier: decimal_to_field(&wire.nu)?,
        amount: wire.a,
        token: wire.t,
        commitment: decimal_to_field(&wire.c)?,
        nullifier_hash: decimal_to_field(&wire.n)?,
        timestamp: wire.ts,
        leaf_index: wire.li,
    })
}
