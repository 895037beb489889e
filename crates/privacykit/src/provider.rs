use async_trait::async_trait;
use privacykit_crypto::Groth16Proof;
use privacykit_types::{
    Balance, CostEstimate, DepositRequest, DepositResult, EstimateRequest, PrivacyKitError,
    PrivacyKitResult, PrivacyLevel, ProveRequest, TokenRegistry, TokenSupport, TransferRequest,
    TransferResult, WithdrawRequest, WithdrawResult,
};
use std::sync::Arc;

use crate::chain::Chain;
use crate::wallet::Wallet;

#[derive(Clone, Debug)]
pub struct ProveResult {
    pub proof: Groth16Proof,
    pub verification_key: Option<Vec<u8>>,
}

/// The normalized operation surface every backend binds to.
///
/// Adapters keep their own state behind interior mutability so a shared
/// `Arc<dyn PrivacyProvider>` can serve the router and direct callers alike.
#[async_trait]
pub trait PrivacyProvider: Send + Sync {
    fn provider_id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn supported_privacy_levels(&self) -> &[PrivacyLevel];

    fn supported_tokens(&self) -> TokenSupport;

    /// Whether the backend can selectively disclose transfers to an auditor.
    fn supports_compliance(&self) -> bool {
        false
    }

    /// Idempotent setup. Network probes may fail without failing
    /// initialization; a missing wallet only blocks operations that sign.
    async fn initialize(
        &self,
        chain: Arc<dyn Chain>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> PrivacyKitResult<()>;

    async fn is_ready(&self) -> bool;

    async fn balance(&self, token: &str, address: Option<&str>) -> PrivacyKitResult<Balance>;

    async fn transfer(&self, request: &TransferRequest) -> PrivacyKitResult<TransferResult>;

    async fn deposit(&self, request: &DepositRequest) -> PrivacyKitResult<DepositResult>;

    async fn withdraw(&self, request: &WithdrawRequest) -> PrivacyKitResult<WithdrawResult>;

    /// Local cost estimate; never touches remote state.
    async fn estimate(&self, request: &EstimateRequest) -> PrivacyKitResult<CostEstimate>;

    async fn prove(&self, request: &ProveRequest) -> PrivacyKitResult<ProveResult> {
        Err(PrivacyKitError::ProofGeneration {
            circuit: request.circuit.clone(),
            cause: format!("{} does not generate proofs", self.provider_id()),
        })
    }
}

/// Pre-operation validation shared by every adapter: privacy level, token
/// support, and the per-token amount bounds from the registry.
pub fn check_support(
    provider_id: &str,
    levels: &[PrivacyLevel],
    tokens: &TokenSupport,
    token: &str,
    amount: f64,
    level: PrivacyLevel,
) -> PrivacyKitResult<()> {
    if !levels.contains(&level) {
        return Err(PrivacyKitError::UnsupportedPrivacyLevel {
            level: level.to_string(),
            provider: Some(provider_id.to_string()),
        });
    }
    if !tokens.supports(token) {
        return Err(PrivacyKitError::UnsupportedToken {
            token: token.to_string(),
            provider: Some(provider_id.to_string()),
        });
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PrivacyKitError::InvalidInput(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    if let Some(schedule) = TokenRegistry::global().fee_schedule(token, provider_id) {
        if amount < schedule.min_amount {
            return Err(PrivacyKitError::AmountBelowMinimum {
                amount,
                minimum: schedule.min_amount,
                token: token.to_string(),
                provider: provider_id.to_string(),
            });
        }
        if let Some(max) = schedule.max_amount {
            if amount > max {
                return Err(PrivacyKitError::InvalidInput(format!(
                    "amount {} {} exceeds the {} maximum of {}",
                    amount, token, provider_id, max
                )));
            }
        }
    }

    Ok(())
}

/// Registry-driven estimate used by adapters whose costs are static.
/// `fee_multiplier` covers composed operations (the pool transfer pays for a
/// deposit plus a withdrawal).
pub fn local_estimate(
    provider_id: &str,
    latency_ms: u64,
    request: &EstimateRequest,
    fee_multiplier: f64,
) -> PrivacyKitResult<CostEstimate> {
    let schedule = TokenRegistry::global()
        .fee_schedule(&request.token, provider_id)
        .ok_or_else(|| PrivacyKitError::UnsupportedToken {
            token: request.token.clone(),
            provider: Some(provider_id.to_string()),
        })?;

    let mut warnings = Vec::new();
    if request.amount < schedule.min_amount {
        warnings.push(format!(
            "amount {} below the {} minimum of {}",
            request.amount, request.token, schedule.min_amount
        ));
    }
    if let Some(max) = schedule.max_amount {
        if request.amount > max {
            warnings.push(format!(
                "amount {} above the {} maximum of {}",
                request.amount, request.token, max
            ));
        }
    }

    Ok(CostEstimate {
        fee: request.amount * schedule.fee_fraction * fee_multiplier,
        latency_ms,
        anonymity_set: schedule.anonymity_set,
        warnings,
    })
}
