//! ShadowWire: stateless relayer reached over REST.
//!
//! Every operation is a canonical JSON payload signed by the caller's wallet
//! and posted to the provider. The relayer holds no client state; replay
//! protection and settlement are its problem.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use privacykit_types::{
    Balance, CostEstimate, DepositRequest, DepositResult, EstimateRequest, PrivacyKitError,
    PrivacyKitResult, PrivacyLevel, TokenRegistry, TokenSupport, TransferRequest, TransferResult,
    WithdrawRequest, WithdrawResult, PROVIDER_SHADOWWIRE,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chain::Chain;
use crate::http::ApiClient;
use crate::provider::{check_support, local_estimate, PrivacyProvider};
use crate::retry::{retry_with_backoff, with_timeout, RetryPolicy, API_TIMEOUT};
use crate::wallet::Wallet;

const SUPPORTED_LEVELS: &[PrivacyLevel] = &[PrivacyLevel::AmountHidden];
const LATENCY_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct ShadowWireConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for ShadowWireConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.shadowwire.io".to_string(),
            api_key: None,
            access_token: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(rename = "transactionId")]
    transaction_id: Option<String>,
    commitment: Option<String>,
    fee: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceEnvelope {
    success: bool,
    balance: Option<f64>,
    error: Option<String>,
}

pub struct ShadowWireAdapter {
    config: ShadowWireConfig,
    api: ApiClient,
    wallet: RwLock<Option<Arc<dyn Wallet>>>,
    ready: AtomicBool,
}

impl ShadowWireAdapter {
    pub fn new(config: ShadowWireConfig) -> PrivacyKitResult<Self> {
        let api = ApiClient::new(&config.base_url)?
            .with_credentials(config.api_key.clone(), config.access_token.clone());
        Ok(Self {
            config,
            api,
            wallet: RwLock::new(None),
            ready: AtomicBool::new(false),
        })
    }

    async fn wallet(&self) -> PrivacyKitResult<Arc<dyn Wallet>> {
        self.wallet
            .read()
            .await
            .clone()
            .ok_or(PrivacyKitError::WalletNotConnected)
    }

    fn ensure_ready(&self) -> PrivacyKitResult<()> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(PrivacyKitError::ProviderNotAvailable(
                PROVIDER_SHADOWWIRE.to_string(),
            ));
        }
        Ok(())
    }

    fn fee_or_fallback(&self, reported: Option<f64>, amount: f64, token: &str) -> f64 {
        reported.unwrap_or_else(|| {
            TokenRegistry::global()
                .fee_schedule(token, PROVIDER_SHADOWWIRE)
                .map(|s| amount * s.fee_fraction)
                .unwrap_or(0.0)
        })
    }

    /// Sign a canonical payload and POST it, retrying transport failures.
    async fn submit(
        &self,
        action: &str,
        path: &str,
        recipient: Option<&str>,
        amount: f64,
        token: &str,
    ) -> PrivacyKitResult<ApiEnvelope> {
        let wallet = self.wallet().await?;
        let sender = wallet.address();
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut payload = build_payload(action, &sender, recipient, amount, token, timestamp);
        let message = serde_json::to_vec(&payload).expect("payload serialization");
        let signature = wallet.sign_message(&message).await?;
        payload.insert(
            "signature".to_string(),
            Value::String(STANDARD.encode(signature)),
        );

        let response: ApiEnvelope = retry_with_backoff(&self.config.retry, action, || {
            let payload = payload.clone();
            async move {
                with_timeout(API_TIMEOUT, action, self.api.post_json(path, &payload)).await
            }
        })
        .await?;

        if !response.success {
            let message = response
                .error
                .as_deref()
                .unwrap_or("unknown server error")
                .to_string();
            return Err(map_server_error(&message, recipient, amount, token));
        }
        Ok(response)
    }
}

fn build_payload(
    action: &str,
    sender: &str,
    recipient: Option<&str>,
    amount: f64,
    token: &str,
    timestamp: i64,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("action".to_string(), Value::String(action.to_string()));
    payload.insert("sender".to_string(), Value::String(sender.to_string()));
    if let Some(recipient) = recipient {
        payload.insert(
            "recipient".to_string(),
            Value::String(recipient.to_string()),
        );
    }
    payload.insert("amount".to_string(), Value::from(amount));
    payload.insert("token".to_string(), Value::String(token.to_string()));
    payload.insert("timestamp".to_string(), Value::from(timestamp));
    payload
}

/// Server-reported business errors map onto the taxonomy by keyword; they
/// are never retried.
fn map_server_error(
    message: &str,
    recipient: Option<&str>,
    amount: f64,
    token: &str,
) -> PrivacyKitError {
    let lowered = message.to_lowercase();
    if lowered.contains("not found") {
        PrivacyKitError::RecipientNotFound(recipient.unwrap_or("unknown").to_string())
    } else if lowered.contains("insufficient") {
        PrivacyKitError::InsufficientBalance {
            required: amount,
            available: 0.0,
            token: token.to_string(),
        }
    } else {
        PrivacyKitError::Transaction {
            cause: message.to_string(),
            signature: None,
        }
    }
}

#[async_trait]
impl PrivacyProvider for ShadowWireAdapter {
    fn provider_id(&self) -> &'static str {
        PROVIDER_SHADOWWIRE
    }

    fn display_name(&self) -> &'static str {
        "ShadowWire"
    }

    fn supported_privacy_levels(&self) -> &[PrivacyLevel] {
        SUPPORTED_LEVELS
    }

    fn supported_tokens(&self) -> TokenSupport {
        TokenSupport::List(vec!["SOL".into(), "USDC".into(), "USDT".into()])
    }

    fn supports_compliance(&self) -> bool {
        true
    }

    async fn initialize(
        &self,
        _chain: Arc<dyn Chain>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> PrivacyKitResult<()> {
        *self.wallet.write().await = wallet;

        match self.api.get_json::<Value>("/health").await {
            Ok(_) => info!("ShadowWire API reachable at {}", self.config.base_url),
            Err(e) => warn!("ShadowWire health probe failed: {}", e),
        }

        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn balance(&self, token: &str, address: Option<&str>) -> PrivacyKitResult<Balance> {
        self.ensure_ready()?;
        if !self.supported_tokens().supports(token) {
            return Err(PrivacyKitError::UnsupportedToken {
                token: token.to_string(),
                provider: Some(PROVIDER_SHADOWWIRE.to_string()),
            });
        }

        let address = match address {
            Some(address) => address.to_string(),
            None => self.wallet().await?.address(),
        };
        let path = format!("/v1/balance/{}?token={}", address, token);

        let response: BalanceEnvelope = retry_with_backoff(&self.config.retry, "balance", || {
            let path = path.clone();
            async move { with_timeout(API_TIMEOUT, "balance", self.api.get_json(&path)).await }
        })
        .await?;

        if !response.success {
            let message = response
                .error
                .as_deref()
                .unwrap_or("unknown server error")
                .to_string();
            return Err(map_server_error(&message, Some(&address), 0.0, token));
        }

        Ok(Balance {
            token: token.to_string(),
            amount: response.balance.unwrap_or(0.0),
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> PrivacyKitResult<TransferResult> {
        self.ensure_ready()?;
        check_support(
            PROVIDER_SHADOWWIRE,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let response = self
            .submit(
                "transfer",
                "/v1/transfer",
                Some(&request.recipient),
                request.amount,
                &request.token,
            )
            .await?;

        let signature = response.transaction_id.ok_or_else(|| {
            PrivacyKitError::Transaction {
                cause: "server response missing transactionId".to_string(),
                signature: None,
            }
        })?;

        Ok(TransferResult {
            signature,
            fee: self.fee_or_fallback(response.fee, request.amount, &request.token),
            provider: PROVIDER_SHADOWWIRE.to_string(),
        })
    }

    async fn deposit(&self, request: &DepositRequest) -> PrivacyKitResult<DepositResult> {
        self.ensure_ready()?;
        check_support(
            PROVIDER_SHADOWWIRE,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let response = self
            .submit("deposit", "/v1/deposit", None, request.amount, &request.token)
            .await?;

        let signature = response.transaction_id.ok_or_else(|| {
            PrivacyKitError::Transaction {
                cause: "server response missing transactionId".to_string(),
                signature: None,
            }
        })?;

        Ok(DepositResult {
            signature,
            commitment: response.commitment,
            note: None,
            fee: self.fee_or_fallback(response.fee, request.amount, &request.token),
            provider: PROVIDER_SHADOWWIRE.to_string(),
        })
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> PrivacyKitResult<WithdrawResult> {
        self.ensure_ready()?;
        check_support(
            PROVIDER_SHADOWWIRE,
            SUPPORTED_LEVELS,
            &self.supported_tokens(),
            &request.token,
            request.amount,
            request.privacy_level,
        )?;

        let response = self
            .submit(
                "withdraw",
                "/v1/withdraw",
                Some(&request.recipient),
                request.amount,
                &request.token,
            )
            .await?;

        let signature = response.transaction_id.ok_or_else(|| {
            PrivacyKitError::Transaction {
                cause: "server response missing transactionId".to_string(),
                signature: None,
            }
        })?;

        Ok(WithdrawResult {
            signature,
            nullifier_hash: None,
            fee: self.fee_or_fallback(response.fee, request.amount, &request.token),
            provider: PROVIDER_SHADOWWIRE.to_string(),
        })
    }

    async fn estimate(&self, request: &EstimateRequest) -> PrivacyKitResult<CostEstimate> {
        local_estimate(PROVIDER_SHADOWWIRE, LATENCY_MS, request, 1.0)
    }
}
