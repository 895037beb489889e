//! Groth16 proof envelope.
//!
//! The toolkit constructs, ships, and parses proofs; verification is the
//! chain's job. Elements travel as decimal field strings in the snarkjs
//! projective layout, with fixed protocol and curve tags.

use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use serde::{Deserialize, Serialize};

use crate::field::{field_to_decimal, random_field};

pub const PROOF_PROTOCOL: &str = "groth16";
pub const PROOF_CURVE: &str = "bn128";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub protocol: String,
    pub curve: String,
    pub pi_a: [String; 3],
    pub pi_b: [[String; 2]; 3],
    pub pi_c: [String; 3],
    /// Named public signals; key order is part of the circuit contract.
    pub public_signals: serde_json::Map<String, serde_json::Value>,
}

impl Groth16Proof {
    pub fn new(
        pi_a: [String; 3],
        pi_b: [[String; 2]; 3],
        pi_c: [String; 3],
        public_signals: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            protocol: PROOF_PROTOCOL.to_string(),
            curve: PROOF_CURVE.to_string(),
            pi_a,
            pi_b,
            pi_c,
            public_signals,
        }
    }

    /// Structurally valid proof with random group elements. Stands in until a
    /// real proving backend is wired through `CircuitBackend`; a verifier
    /// will reject it.
    pub fn random_placeholder(
        public_signals: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let element = || field_to_decimal(&random_field());
        Self::new(
            [element(), element(), "1".to_string()],
            [
                [element(), element()],
                [element(), element()],
                ["1".to_string(), "0".to_string()],
            ],
            [element(), element(), "1".to_string()],
            public_signals,
        )
    }

    pub fn validate(&self) -> PrivacyKitResult<()> {
        if self.protocol != PROOF_PROTOCOL {
            return Err(PrivacyKitError::InvalidFormat(format!(
                "unexpected proof protocol {:?}",
                self.protocol
            )));
        }
        if self.curve != PROOF_CURVE {
            return Err(PrivacyKitError::InvalidFormat(format!(
                "unexpected proof curve {:?}",
                self.curve
            )));
        }
        Ok(())
    }
}

/// UTF-8 JSON wire form.
pub fn serialize_proof(proof: &Groth16Proof) -> Vec<u8> {
    serde_json::to_vec(proof).expect("proof wire serialization")
}

/// Parse and validate the protocol/curve tags and point arities.
pub fn deserialize_proof(bytes: &[u8]) -> PrivacyKitResult<Groth16Proof> {
    let proof: Groth16Proof = serde_json::from_slice(bytes)
        .map_err(|e| PrivacyKitError::InvalidFormat(format!("invalid proof JSON: {}", e)))?;
    proof.validate()?;
    Ok(proof)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signals() -> serde_json::Map<String, serde_json::Value> {
        let mut signals = serde_json::Map::new();
        signals.insert("root".to_string(), serde_json::Value::String("7".into()));
        signals.insert(
            "nullifierHash".to_string(),
            serde_json::Value::String("11".into()),
        );
        signals
    }

    #[test]
    fn test_roundtrip() {
        let proof = Groth16Proof::random_placeholder(sample_signals());
        let bytes = serialize_proof(&proof);
        let restored = deserialize_proof(&bytes).unwrap();
        assert_eq!(restored, proof);
    }

    #[test]
    fn test_tags_are_fixed() {
        let proof = Groth16Proof::random_placeholder(sample_signals());
        assert_eq!(proof.protocol, "groth16");
        assert_eq!(proof.curve, "bn128");
    }

    #[test]
    fn test_signal_order_preserved() {
        let proof = Groth16Proof::random_placeholder(sample_signals());
        let bytes = serialize_proof(&proof);
        let restored = deserialize_proof(&bytes).unwrap();

        let keys: Vec<&String> = restored.public_signals.keys().collect();
        assert_eq!(keys, vec!["root", "nullifierHash"]);
    }

    #[test]
    fn test_bad_tags_rejected() {
        let mut proof = Groth16Proof::random_placeholder(sample_signals());
        proof.protocol = "plonk".to_string();
        let bytes = serde_json::to_vec(&proof).unwrap();
        assert!(matches!(
            deserialize_proof(&bytes),
            Err(PrivacyKitError::InvalidFormat(_))
        ));

        let mut proof = Groth16Proof::random_placeholder(sample_signals());
        proof.curve = "bls12-381".to_string();
        let bytes = serde_json::to_vec(&proof).unwrap();
        assert!(deserialize_proof(&bytes).is_err());
    }

    #[test]
    fn test_wrong_arity_rejected() {
        // pi_a with two entries instead of three fails deserialization
        let json = br#"{
            "protocol": "groth16",
            "curve": "bn128",
            "pi_a": ["1", "2"],
            "pi_b": [["1", "2"], ["3", "4"], ["1", "0"]],
            "pi_c": ["1", "2", "1"],
            "public_signals": {}
        }"#;
        assert!(deserialize_proof(json).is_err());
    }

    #[test]
    fn test_placeholders_are_distinct() {
        let a = Groth16Proof::random_placeholder(sample_signals());
        let b = Groth16Proof::random_placeholder(sample_signals());
        assert_ne!(a.pi_a, b.pi_a);
    }
}
