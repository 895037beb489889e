//! Arcium: confidential transfers through an MPC execution environment.
//!
//! The adapter owns one MPC session per instance. Transfer amounts are
//! encrypted for the MXE with the session's X25519 shared secret; shield and
//! unshield move visible amounts across the confidential boundary.

use async_trait::async_trait;
use num_bigint::BigUint;
use privacykit_crypto::{ArciumEncryption, EncryptedValue};
use privacykit_types::{
    Balance, CostEstimate, DepositRequest, DepositResult, EstimateRequest, PrivacyKitError,
    PrivacyKitResult, PrivacyLevel, TokenRegistry, TokenSupport, TransferRequest, TransferResult,
    WithdrawRequest, WithdrawResult, PROVIDER_ARCIUM,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chain::{address_bytes, Chain, InstructionPayload};
use crate::provider::{check_support, local_estimate, PrivacyProvider};
use crate::retry::{with_timeout, API_TIMEOUT, CONFIRM_TIMEOUT};
use crate::wallet::Wallet;

const SUPPORTED_LEVELS: &[PrivacyLevel] =
    &[PrivacyLevel::AmountHidden, PrivacyLevel::FullyShielded];
const LATENCY_MS: u64 = 8_000;

const OP_TRANSFER: u8 = 0x01;
const OP_SHIELD: u8 = 0x02;
const OP_UNSHIELD: u8 = 0x03;

#[derive(Clone, Debug)]
pub struct ArciumConfig {
    /// C-SPL program the instructions target.
    pub program_id: String,
    /// The MXE cluster's X25519 public key.
    pub mxe_public_key: [u8; 32],
}

impl Default for ArciumConfig {
    fn default() -> Self {
        Self {
            program_id: "ArcCSPL1111111111111111111111111111111111111".to_string(),
            mxe_public_key: [0u8; 32],
        }
    }
}

/// Opaque MPC session: a fresh id and an encryption context bound to the
/// MXE's public key.
pub struct MpcSession {
    id: [u8; 16],
    encryption: ArciumEncryption,
}

impl MpcSession {
    fn new(mxe_public_key: [u8; 32]) -> Self {
        Self {
            id: *uuid::Uuid::new_v4().as_bytes(),
            encryption: ArciumEncryption::new(mxe_public_key),
        }
    }

    pub fn id(&self) -> &[u8; 16] {
        &self.id
    }
}

/// A named input after session encryption, as handed to a confidential
/// computation.
pub struct EncryptedInput {
    pub name: String,
    pub value: EncryptedValue,
}

pub struct ArciumAdapter {
    config: ArciumConfig,
    session: RwLock<Option<MpcSession>>,
    chain: RwLock<Option<Arc<dyn Chain>>>,
    wallet: RwLock<Option<Arc<dyn Wallet>>>,
}

impl ArciumAdapter {
    pub fn new(config: ArciumConfig) -> Self {
        Self {
            config,
            session: RwLock::new(None),
            chain: RwLock::new(None),
            wallet: RwLock::new(None),
        }
    }

    async fn chain(&self) -> PrivacyKitResult<Arc<dyn Chain>> {
        self.chain
            .read()
            .await
            .clone()
            .ok_or_else(|| PrivacyKitError::ProviderNotAvailable(PROVIDER_ARCIUM.to_string()))
    }

    async fn wallet(&self) -> PrivacyKitResult<Arc<dyn Wallet>> {
        self.wallet
            .read()
            .await
            .clone()
            .ok_or(PrivacyKitError::WalletNotConnected)
    }

    /// Amount in the token program's u64 base units.
    fn base_units(&self, amount: f64, token: &str) -> PrivacyKitResult<u64> {
        let units = TokenRegistry::global().to_base_units(amount, token)?;
        u64::try_from(units).map_err(|_| {
            PrivacyKitError::InvalidInput(format!(
                "amount {} {} exceeds the u64 base-unit range",
                amount, token
            ))
        })
    }

    async fn encrypt_amount(&self, units: u64) -> PrivacyKitResult<EncryptedValue> {
        let session = self.session.read().await;
        let session = session
            .as_ref()
            .ok_or_else(|| PrivacyKitError::ProviderNotAvailable(PROVIDER_ARCIUM.to_string()))?;
        session.encryption.encrypt_for_cspl(&BigUint::from(units))
    }

    async fn submit(&self, instruction: InstructionPayload) -> PrivacyKitResult<String> {
        let chain = self.chain().await?;
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

    /// Template operation: encrypt a set of named inputs under the session
    /// key and hand them to an opaque computation.
    pub async fn confidential_compute<F>(
        &self,
        inputs: &[(String, BigUint)],
        compute: F,
    ) -> PrivacyKitResult<Vec<u8>>
    where
        F: FnOnce(&[EncryptedInput]) -> PrivacyKitResult<Vec<u8>> + Send,
    {
        let session = self.session.read().await;
        let session = session
            .as_ref()
            .ok_or_else(|| PrivacyKitError::ProviderNotAvailable(PROVIDER_ARCIUM.to_string()))?;

        let mut encrypted = Vec::with_capacity(inputs.len());
        for (name, value) in inputs {
            encrypted.push(EncryptedInput {
                name: name.clone(),
                value: session.encryption.encrypt(value)?,
            });
        }
        compute(&encrypted)
    }
}

fn encode_transfer(sender: &[u8; 32], recipient: &[u8; 32], ciphertext: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + 64 + ciphertext.len());
    data.push(OP_TRANSFER);
    data.extend_from_slice(sender);
    data.extend_from_slice(recipient);
    data.extend_from_slice(ciphertext);
    data
}

fn encode_shield(amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(OP_SHIELD);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

fn encode_unshield(recipient: &[u8; 32], amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(41);
    data.push(OP_UNSHIELD);
    data.extend_from_slice(recipient);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

#[async_trait]
impl PrivacyProvider for ArciumAdapter {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ARCIUM
    }

    fn display_name(&self) -> &'static str {
        "Arcium"
    }

    fn supported_privacy_levels(&self) -> &[PrivacyLevel] {
        SUPPORTED_LEVELS
    }

    fn supported_tokens(&self) -> TokenSupport {
        TokenSupport::List(vec!["SOL".into(), "USDC".into(), "USDT".into()])
    }

    async fn initialize(
        &self,
        chain: Arc<dyn Chain>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> PrivacyKitResult<()> {
        *self.chain.write().await = Some(chain);
        *self.wallet.write().await = wallet;

        let mut session = self.session.write().await;
        if session.is_none() {
            let fresh = MpcSession::new(self.config.mxe_public_key);
            info!("Arcium MPC session {}", hex::encode(fresh.id()));
            *session = Some(fresh);
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.session.read().await.is_some() && self.chain.read().await.is_some()
    }

    async fn balance(&self, token: &str, address: Option<&str>) -> PrivacyKitResult<Balance> {
        if !self.supported_tokens().supports(token) {
            return Err(PrivacyKitError::UnsupportedToken {
                token: token.to_string(),
                provider: Some(PROVIDER_ARCIUM.to_string()),
            });
        }

        let chain = self.chain().await?;
        let address = match address {
            Some(address) => address.to_string(),
            None => self.wallet().await?.address(),
        };

        let units =
            with_timeout(API_TIMEOUT, "token_balance", chain.token_balance(&address, token))
                .await?;
        Ok(Balance {
            token: token.to_string(),
            amount: TokenRegistry::global().from_base_units(units, token)?,
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> PrivacyKitResult<TransferResult> {
        check_support(
            PROVIDER_ARCIUM,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let wallet = self.wallet().await?;
        let units = self.base_units(request.amount, &request.token)?;
        let encrypted = self.encrypt_amount(units).await?;
        debug!(
            "encrypted {} {} into {} ciphertext bytes",
            request.amount,
            request.token,
            encrypted.ciphertext.len()
        );

        let sender = wallet.address();
        let data = encode_transfer(
            &address_bytes(&sender),
            &address_bytes(&request.recipient),
            &encrypted.to_bytes(),
        );
        let instruction = InstructionPayload {
            program_id: self.config.program_id.clone(),
            accounts: vec![sender, request.recipient.clone()],
            data,
        };

        let signature = self.submit(instruction).await?;
        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_ARCIUM)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(0.0);

        Ok(TransferResult {
            signature,
            fee,
            provider: PROVIDER_ARCIUM.to_string(),
        })
    }

    async fn deposit(&self, request: &DepositRequest) -> PrivacyKitResult<DepositResult> {
        check_support(
            PROVIDER_ARCIUM,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let wallet = self.wallet().await?;
        let units = self.base_units(request.amount, &request.token)?;

        let instruction = InstructionPayload {
            program_id: self.config.program_id.clone(),
            accounts: vec![wallet.address()],
            data: encode_shield(units),
        };

        let signature = self.submit(instruction).await?;
        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_ARCIUM)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(0.0);

        Ok(DepositResult {
            signature,
            commitment: None,
            note: None,
            fee,
            provider: PROVIDER_ARCIUM.to_string(),
        })
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> PrivacyKitResult<WithdrawResult> {
        check_support(
            PROVIDER_ARCIUM,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let units = self.base_units(request.amount, &request.token)?;
        let instruction = InstructionPayload {
            program_id: self.config.program_id.clone(),
            accounts: vec![request.recipient.clone()],
            data: encode_unshield(&address_bytes(&request.recipient), units),
        };

        let signature = self.submit(instruction).await?;
        let fee = TokenRegistry::global()
            .fee_schedule(&request.token, PROVIDER_ARCIUM)
            .map(|s| request.amount * s.fee_fraction)
            .unwrap_or(0.0);

        Ok(WithdrawResult {
            signature,
            nullifier_hash: None,
            fee,
            provider: PROVIDER_ARCIUM.to_string(),
        })
    }

    async fn estimate(&self, request: &EstimateRequest) -> PrivacyKitResult<CostEstimate> {
        local_estimate(PROVIDER_ARCIUM, LATENCY_MS, request, 1.0)
    }
}
