use privacykit_crypto::Groth16Proof;
use privacykit_types::PrivacyKitResult;

/// Seam for a compiled-circuit proving backend. Adapters hand over the
/// public signals (already ordered per the circuit contract) and the full
/// witness inputs; the backend returns a proof envelope.
pub trait CircuitBackend: Send + Sync {
    fn generate_proof(
        &self,
        circuit: &str,
        public_signals: serde_json::Map<String, serde_json::Value>,
        witness_inputs: &serde_json::Map<String, serde_json::Value>,
        proving_key: Option<&[u8]>,
    ) -> PrivacyKitResult<Groth16Proof>;
}

/// Default backend: emits structurally valid placeholder proofs so the full
/// deposit/withdraw/transfer pipelines run end to end without a compiled
/// circuit. An on-chain verifier will reject these proofs.
pub struct LocalProver;

impl CircuitBackend for LocalProver {
    fn generate_proof(
        &self,
        _circuit: &str,
        public_signals: serde_json::Map<String, serde_json::Value>,
        _witness_inputs: &serde_json::Map<String, serde_json::Value>,
        _proving_key: Option<&[u8]>,
    ) -> PrivacyKitResult<Groth16Proof> {
        Ok(Groth16Proof::random_placeholder(public_signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_prover_carries_signals() {
        let mut signals = serde_json::Map::new();
        signals.insert("root".into(), serde_json::Value::String("5".into()));
        signals.insert("nullifierHash".into(), serde_json::Value::String("9".into()));

        let witness = serde_json::Map::new();
        let proof = LocalProver
            .generate_proof("withdrawal", signals.clone(), &witness, None)
            .unwrap();

        assert_eq!(proof.public_signals, signals);
        assert!(proof.validate().is_ok());
    }
}
