//! Noir: generic ZK proof generation against registered circuits.
//!
//! The adapter keeps a registry of circuit definitions and optional key
//! material. Witness computation and proving are delegated to a
//! `CircuitBackend`; transfers route through the `private-transfer` circuit
//! and land on chain through the verifier program.

use async_trait::async_trait;
use privacykit_crypto::{
    bytes_to_field, field_to_decimal, field_to_hex, poseidon_hash, poseidon_hash_many,
    poseidon_hash_single, random_field, serialize_proof, Fr, Groth16Proof,
};
use privacykit_types::{
    Balance, CostEstimate, DepositRequest, DepositResult, EstimateRequest, PrivacyKitError,
    PrivacyKitResult, PrivacyLevel, ProveRequest, TokenRegistry, TokenSupport, TransferRequest,
    TransferResult, WithdrawRequest, WithdrawResult, PROVIDER_NOIR,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chain::{address_bytes, Chain, InstructionPayload};
use crate::provider::{check_support, local_estimate, PrivacyProvider, ProveResult};
use crate::prover::{CircuitBackend, LocalProver};
use crate::retry::{with_timeout, API_TIMEOUT, CONFIRM_TIMEOUT, PROVE_TIMEOUT};
use crate::wallet::Wallet;

const SUPPORTED_LEVELS: &[PrivacyLevel] = &[PrivacyLevel::FullyShielded];
const LATENCY_MS: u64 = 15_000;

/// Fallback cost parameters for tokens outside the registry; the adapter
/// accepts any token symbol.
const DEFAULT_FEE_FRACTION: f64 = 0.005;
const DEFAULT_ANONYMITY_SET: u64 = 5_000;

const OP_VERIFY: u8 = 0x01;

#[derive(Clone, Debug)]
pub struct NoirConfig {
    /// Verifier program receiving proof instructions.
    pub program_id: String,
}

impl Default for NoirConfig {
    fn default() -> Self {
        Self {
            program_id: "NoirVerify11111111111111111111111111111111111".to_string(),
        }
    }
}

/// Named inputs a circuit expects, split by visibility.
#[derive(Clone, Debug)]
pub struct CircuitDefinition {
    pub public_inputs: Vec<String>,
    pub private_inputs: Vec<String>,
}

struct CircuitKeys {
    proving_key: Vec<u8>,
    verification_key: Vec<u8>,
}

pub struct NoirAdapter {
    config: NoirConfig,
    circuits: RwLock<HashMap<String, CircuitDefinition>>,
    keys: RwLock<HashMap<String, CircuitKeys>>,
    backend: Box<dyn CircuitBackend>,
    chain: RwLock<Option<Arc<dyn Chain>>>,
    wallet: RwLock<Option<Arc<dyn Wallet>>>,
}

impl NoirAdapter {
    pub fn new(config: NoirConfig) -> Self {
        Self::with_backend(config, Box::new(LocalProver))
    }

    pub fn with_backend(config: NoirConfig, backend: Box<dyn CircuitBackend>) -> Self {
        let adapter = Self {
            config,
            circuits: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            backend,
            chain: RwLock::new(None),
            wallet: RwLock::new(None),
        };
        adapter.register_builtin_circuits();
        adapter
    }

    fn register_builtin_circuits(&self) {
        let mut circuits = self
            .circuits
            .try_write()
            .expect("circuit registry uncontended at construction");
        circuits.insert(
            "private-transfer".to_string(),
            CircuitDefinition {
                public_inputs: vec![
                    "inputCommitment".into(),
                    "outputCommitment".into(),
                    "nullifier".into(),
                ],
                private_inputs: vec![
                    "senderSalt".into(),
                    "recipientSalt".into(),
                    "amount".into(),
                ],
            },
        );
        circuits.insert(
            "deposit".to_string(),
            CircuitDefinition {
                public_inputs: vec!["commitment".into()],
                private_inputs: vec!["secret".into(), "nullifier".into(), "amount".into()],
            },
        );
        circuits.insert(
            "withdrawal".to_string(),
            CircuitDefinition {
                public_inputs: vec![
                    "nullifierHash".into(),
                    "recipient".into(),
                    "amount".into(),
                ],
                private_inputs: vec!["secret".into(), "nullifier".into()],
            },
        );
    }

    pub async fn register_circuit(&self, name: &str, definition: CircuitDefinition) {
        debug!(
            "registering circuit {} ({} public, {} private inputs)",
            name,
            definition.public_inputs.len(),
            definition.private_inputs.len()
        );
        self.circuits
            .write()
            .await
            .insert(name.to_string(), definition);
    }

    pub async fn load_circuit_keys(
        &self,
        name: &str,
        proving_key: Vec<u8>,
        verification_key: Vec<u8>,
    ) -> PrivacyKitResult<()> {
        if !self.circuits.read().await.contains_key(name) {
            return Err(PrivacyKitError::NotFound(format!(
                "circuit {} is not registered",
                name
            )));
        }
        self.keys.write().await.insert(
            name.to_string(),
            CircuitKeys {
                proving_key,
                verification_key,
            },
        );
        Ok(())
    }

    async fn chain(&self) -> PrivacyKitResult<Arc<dyn Chain>> {
        self.chain
            .read()
            .await
            .clone()
            .ok_or_else(|| PrivacyKitError::ProviderNotAvailable(PROVIDER_NOIR.to_string()))
    }

    /// Structural verification against the loaded key: tags, arity, and
    /// public-signal agreement. A pairing check needs the real verifier.
    pub fn verify_local(
        &self,
        proof: &Groth16Proof,
        public_inputs: &Map<String, Value>,
        verification_key: &[u8],
    ) -> PrivacyKitResult<bool> {
        proof.validate()?;
        if verification_key.is_empty() {
            return Err(PrivacyKitError::ProofVerification(
                "empty verification key".to_string(),
            ));
        }
        for (name, expected) in public_inputs {
            match proof.public_signals.get(name) {
                Some(actual) if actual == expected => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Ship the proof and its public inputs to the verifier program.
    pub async fn verify_on_chain(
        &self,
        proof: &Groth16Proof,
        public_inputs: &Map<String, Value>,
    ) -> PrivacyKitResult<String> {
        proof.validate()?;
        let chain = self.chain().await?;

        let proof_bytes = serialize_proof(proof);
        let inputs_bytes =
            serde_json::to_vec(public_inputs).expect("public input serialization");

        let mut data = Vec::with_capacity(9 + proof_bytes.len() + inputs_bytes.len());
        data.push(OP_VERIFY);
        data.extend_from_slice(&(proof_bytes.len() as u32).to_le_bytes());
        data.extend_from_slice(&proof_bytes);
        data.extend_from_slice(&(inputs_bytes.len() as u32).to_le_bytes());
        data.extend_from_slice(&inputs_bytes);

        let instruction = InstructionPayload {
            program_id: self.config.program_id.clone(),
            accounts: Vec::new(),
            data,
        };

        let signature =
            with_timeout(API_TIMEOUT, "send_instruction", chain.send_instruction(&instruction))
                .await?;
        with_timeout(
            CONFIRM_TIMEOUT,
            "confirm_transaction",
            chain.confirm_transaction(&signature),
        )
        .await?;
        Ok(signature)
    }

    fn decimal_value(value: &Fr) -> Value {
        Value::String(field_to_decimal(value))
    }
}

#[async_trait]
impl PrivacyProvider for NoirAdapter {
    fn provider_id(&self) -> &'static str {
        PROVIDER_NOIR
    }

    fn display_name(&self) -> &'static str {
        "Noir ZK"
    }

    fn supported_privacy_levels(&self) -> &[PrivacyLevel] {
        SUPPORTED_LEVELS
    }

    fn supported_tokens(&self) -> TokenSupport {
        TokenSupport::All
    }

    async fn initialize(
        &self,
        chain: Arc<dyn Chain>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> PrivacyKitResult<()> {
        *self.chain.write().await = Some(chain);
        *self.wallet.write().await = wallet;
        info!(
            "Noir adapter ready with {} registered circuits",
            self.circuits.read().await.len()
        );
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.chain.read().await.is_some()
    }

    async fn balance(&self, token: &str, address: Option<&str>) -> PrivacyKitResult<Balance> {
        let chain = self.chain().await?;
        let address = match address {
            Some(address) => address.to_string(),
            None => {
                let wallet = self.wallet.read().await;
                wallet
                    .as_ref()
                    .ok_or(PrivacyKitError::WalletNotConnected)?
                    .address()
            }
        };

        let units =
            with_timeout(API_TIMEOUT, "token_balance", chain.token_balance(&address, token))
                .await?;
        let amount = TokenRegistry::global()
            .from_base_units(units, token)
            .unwrap_or(units as f64);
        Ok(Balance {
            token: token.to_string(),
            amount,
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> PrivacyKitResult<TransferResult> {
        check_support(
            PROVIDER_NOIR,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let wallet = self.wallet.read().await.clone().ok_or(PrivacyKitError::WalletNotConnected)?;

        let sender_salt = random_field();
        let recipient_salt = random_field();
        let nullifier = random_field();

        let sender = bytes_to_field(&address_bytes(&wallet.address()));
        let recipient = bytes_to_field(&address_bytes(&request.recipient));
        let amount = Fr::from(
            TokenRegistry::global()
                .to_base_units(request.amount, &request.token)
                .unwrap_or((request.amount * 1e9) as u128),
        );

        let input_commitment = poseidon_hash_many(&[sender, amount, sender_salt])?;
        let output_commitment = poseidon_hash_many(&[recipient, amount, recipient_salt])?;

        let mut inputs = Map::new();
        inputs.insert(
            "inputCommitment".into(),
            Self::decimal_value(&input_commitment),
        );
        inputs.insert(
            "outputCommitment".into(),
            Self::decimal_value(&output_commitment),
        );
        inputs.insert("nullifier".into(), Self::decimal_value(&nullifier));
        inputs.insert("senderSalt".into(), Self::decimal_value(&sender_salt));
        inputs.insert("recipientSalt".into(), Self::decimal_value(&recipient_salt));
        inputs.insert("amount".into(), Self::decimal_value(&amount));

        let proved = self
            .prove(&ProveRequest {
                circuit: "private-transfer".to_string(),
                inputs,
            })
            .await?;

        let signals = proved.proof.public_signals.clone();
        let signature = self.verify_on_chain(&proved.proof, &signals).await?;

        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_NOIR)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(request.amount * DEFAULT_FEE_FRACTION);

        Ok(TransferResult {
            signature,
            fee,
            provider: PROVIDER_NOIR.to_string(),
        })
    }

    async fn deposit(&self, request: &DepositRequest) -> PrivacyKitResult<DepositResult> {
        check_support(
            PROVIDER_NOIR,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let secret = random_field();
        let nullifier = random_field();
        let commitment = poseidon_hash(secret, nullifier);
        let amount = Fr::from(
            TokenRegistry::global()
                .to_base_units(request.amount, &request.token)
                .unwrap_or((request.amount * 1e9) as u128),
        );

        let mut inputs = Map::new();
        inputs.insert("commitment".into(), Self::decimal_value(&commitment));
        inputs.insert("secret".into(), Self::decimal_value(&secret));
        inputs.insert("nullifier".into(), Self::decimal_value(&nullifier));
        inputs.insert("amount".into(), Self::decimal_value(&amount));

        let proved = self
            .prove(&ProveRequest {
                circuit: "deposit".to_string(),
                inputs,
            })
            .await?;

        let signals = proved.proof.public_signals.clone();
        let signature = self.verify_on_chain(&proved.proof, &signals).await?;

        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_NOIR)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(request.amount * DEFAULT_FEE_FRACTION);

        Ok(DepositResult {
            signature,
            commitment: Some(field_to_hex(&commitment)),
            note: None,
            fee,
            provider: PROVIDER_NOIR.to_string(),
        })
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> PrivacyKitResult<WithdrawResult> {
        check_support(
            PROVIDER_NOIR,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let secret = random_field();
        let nullifier = random_field();
        let nullifier_hash = poseidon_hash_single(nullifier);
        let recipient = bytes_to_field(&address_bytes(&request.recipient));
        let amount = Fr::from(
            TokenRegistry::global()
                .to_base_units(request.amount, &request.token)
                .unwrap_or((request.amount * 1e9) as u128),
        );

        let mut inputs = Map::new();
        inputs.insert("nullifierHash".into(), Self::decimal_value(&nullifier_hash));
        inputs.insert("recipient".into(), Self::decimal_value(&recipient));
        inputs.insert("amount".into(), Self::decimal_value(&amount));
        inputs.insert("secret".into(), Self::decimal_value(&secret));
        inputs.insert("nullifier".into(), Self::decimal_value(&nullifier));

        let proved = self
            .prove(&ProveRequest {
                circuit: "withdrawal".to_string(),
                inputs,
            })
            .await?;

        let signals = proved.proof.public_signals.clone();
        let signature = self.verify_on_chain(&proved.proof, &signals).await?;

        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_NOIR)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(request.amount * DEFAULT_FEE_FRACTION);

        Ok(WithdrawResult {
            signature,
            nullifier_hash: Some(field_to_hex(&nullifier_hash)),
            fee,
            provider: PROVIDER_NOIR.to_string(),
        })
    }

    async fn estimate(&self, request: &EstimateRequest) -> PrivacyKitResult<CostEstimate> {
        match local_estimate(PROVIDER_NOIR, LATENCY_MS, request, 1.0) {
            Ok(estimate) => Ok(estimate),
            // Any token proves; outside the registry we fall back to defaults
            Err(PrivacyKitError::UnsupportedToken { .. }) => Ok(CostEstimate {
                fee: request.amount * DEFAULT_FEE_FRACTION,
                latency_ms: LATENCY_MS,
                anonymity_set: Some(DEFAULT_ANONYMITY_SET),
                warnings: Vec::new(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn prove(&self, request: &ProveRequest) -> PrivacyKitResult<ProveResult> {
        let circuits = self.circuits.read().await;
        let definition = circuits.get(&request.circuit).ok_or_else(|| {
            PrivacyKitError::ProofGeneration {
                circuit: request.circuit.clone(),
                cause: "circuit is not registered".to_string(),
            }
        })?;

        for name in definition
            .public_inputs
            .iter()
            .chain(&definition.private_inputs)
        {
            if !request.inputs.contains_key(name) {
                return Err(PrivacyKitError::ProofGeneration {
                    circuit: request.circuit.clone(),
                    cause: format!("missing input {}", name),
                });
            }
        }

        // Public signals keep the circuit's declared order
        let mut public_signals = Map::new();
        for name in &definition.public_inputs {
            public_signals.insert(name.clone(), request.inputs[name].clone());
        }

        let keys = self.keys.read().await;
        let circuit_keys = keys.get(&request.circuit);
        let proving_key = circuit_keys.map(|k| k.proving_key.as_slice());

        let proof = with_timeout(PROVE_TIMEOUT, "prove", async {
            self.backend.generate_proof(
                &request.circuit,
                public_signals,
                &request.inputs,
                proving_key,
            )
        })
        .await?;

        Ok(ProveResult {
            proof,
            verification_key: circuit_keys.map(|k| k.verification_key.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChain, MockWallet};
    use privacykit_types::OperationKind;

    fn inputs_for_withdrawal() -> Map<String, Value> {
        let mut inputs = Map::new();
        for (name, value) in [
            ("nullifierHash", "11"),
            ("recipient", "22"),
            ("amount", "33"),
            ("secret", "44"),
            ("nullifier", "55"),
        ] {
            inputs.insert(name.into(), Value::String(value.into()));
        }
        inputs
    }

    #[tokio::test]
    async fn test_prove_with_builtin_circuit() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let result = adapter
            .prove(&ProveRequest {
                circuit: "withdrawal".to_string(),
                inputs: inputs_for_withdrawal(),
            })
            .await
            .unwrap();

        let keys: Vec<&String> = result.proof.public_signals.keys().collect();
        assert_eq!(keys, vec!["nullifierHash", "recipient", "amount"]);
        assert!(result.verification_key.is_none());
    }

    #[tokio::test]
    async fn test_prove_missing_input() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let mut inputs = inputs_for_withdrawal();
        inputs.remove("secret");

        let result = adapter
            .prove(&ProveRequest {
                circuit: "withdrawal".to_string(),
                inputs,
            })
            .await;
        match result {
            Err(PrivacyKitError::ProofGeneration { cause, .. }) => {
                assert!(cause.contains("secret"));
            }
            other => panic!("expected ProofGeneration error, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_prove_unknown_circuit() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let result = adapter
            .prove(&ProveRequest {
                circuit: "does-not-exist".to_string(),
                inputs: Map::new(),
            })
            .await;
        assert!(matches!(
            result,
            Err(PrivacyKitError::ProofGeneration { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_and_load_keys() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        adapter
            .register_circuit(
                "range-check",
                CircuitDefinition {
                    public_inputs: vec!["bound".into()],
                    private_inputs: vec!["value".into()],
                },
            )
            .await;

        adapter
            .load_circuit_keys("range-check", vec![1, 2, 3], vec![4, 5, 6])
            .await
            .unwrap();

        let mut inputs = Map::new();
        inputs.insert("bound".into(), Value::String("100".into()));
        inputs.insert("value".into(), Value::String("42".into()));

        let result = adapter
            .prove(&ProveRequest {
                circuit: "range-check".to_string(),
                inputs,
            })
            .await
            .unwrap();
        assert_eq!(result.verification_key, Some(vec![4, 5, 6]));

        // Keys for unregistered circuits are rejected
        assert!(adapter
            .load_circuit_keys("ghost", vec![], vec![])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_verify_local() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let result = adapter
            .prove(&ProveRequest {
                circuit: "withdrawal".to_string(),
                inputs: inputs_for_withdrawal(),
            })
            .await
            .unwrap();

        let signals = result.proof.public_signals.clone();
        assert!(adapter
            .verify_local(&result.proof, &signals, &[1, 2, 3])
            .unwrap());

        let mut wrong = signals.clone();
        wrong.insert("nullifierHash".into(), Value::String("999".into()));
        assert!(!adapter
            .verify_local(&result.proof, &wrong, &[1, 2, 3])
            .unwrap());

        assert!(adapter.verify_local(&result.proof, &signals, &[]).is_err());
    }

    #[tokio::test]
    async fn test_transfer_ships_verify_instruction() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let chain = Arc::new(MockChain::new());
        adapter
            .initialize(chain.clone(), Some(Arc::new(MockWallet::new("alice"))))
            .await
            .unwrap();

        let result = adapter
            .transfer(&TransferRequest {
                token: "SOL".into(),
                amount: 2.0,
                recipient: "bob".into(),
                privacy_level: PrivacyLevel::FullyShielded,
                memo: None,
            })
            .await
            .unwrap();
        assert!((result.fee - 0.01).abs() < 1e-9);

        let sent = chain.sent_instructions();
        assert_eq!(sent.len(), 1);
        let data = &sent[0].data;
        assert_eq!(data[0], OP_VERIFY);

        let proof_len = u32::from_le_bytes(data[1..5].try_into().unwrap()) as usize;
        let proof_bytes = &data[5..5 + proof_len];
        let proof = privacykit_crypto::deserialize_proof(proof_bytes).unwrap();
        let keys: Vec<&String> = proof.public_signals.keys().collect();
        assert_eq!(keys, vec!["inputCommitment", "outputCommitment", "nullifier"]);

        let inputs_off = 5 + proof_len;
        let inputs_len =
            u32::from_le_bytes(data[inputs_off..inputs_off + 4].try_into().unwrap()) as usize;
        assert_eq!(data.len(), inputs_off + 4 + inputs_len);
    }

    #[tokio::test]
    async fn test_deposit_returns_commitment_withdraw_returns_nullifier() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let chain = Arc::new(MockChain::new());
        adapter
            .initialize(chain.clone(), Some(Arc::new(MockWallet::new("alice"))))
            .await
            .unwrap();

        let deposit = adapter
            .deposit(&DepositRequest {
                token: "SOL".into(),
                amount: 1.0,
                privacy_level: PrivacyLevel::FullyShielded,
            })
            .await
            .unwrap();
        assert!(deposit.commitment.is_some());

        let withdraw = adapter
            .withdraw(&WithdrawRequest {
                token: "SOL".into(),
                amount: 1.0,
                recipient: "bob".into(),
                privacy_level: PrivacyLevel::FullyShielded,
                note: None,
            })
            .await
            .unwrap();
        assert!(withdraw.nullifier_hash.is_some());
    }

    #[tokio::test]
    async fn test_estimate_accepts_unregistered_tokens() {
        let adapter = NoirAdapter::new(NoirConfig::default());
        let estimate = adapter
            .estimate(&EstimateRequest {
                operation: OperationKind::Transfer,
                token: "BONK".into(),
                amount: 1_000.0,
                privacy_level: PrivacyLevel::FullyShielded,
            })
            .await
            .unwrap();
        assert!((estimate.fee - 5.0).abs() < 1e-9);
        assert_eq!(estimate.anonymity_set, Some(DEFAULT_ANONYMITY_SET));
    }
}
