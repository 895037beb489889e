use serde::{Deserialize, Serialize};
use std::fmt;

/// How much of a transfer is concealed from chain observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivacyLevel {
    /// Nothing hidden; routed for convenience only.
    Transparent,
    /// Amounts encrypted, participants visible.
    AmountHidden,
    /// Amounts and participants hidden behind commitments.
    FullyShielded,
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrivacyLevel::Transparent => "transparent",
            PrivacyLevel::AmountHidden => "amount-hidden",
            PrivacyLevel::FullyShielded => "fully-shielded",
        };
        write!(f, "{}", s)
    }
}

/// Token coverage advertised by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenSupport {
    /// Provider accepts any token symbol (the ZK adapter).
    All,
    List(Vec<String>),
}

impl TokenSupport {
    pub fn supports(&self, token: &str) -> bool {
        match self {
            TokenSupport::All => true,
            TokenSupport::List(tokens) => tokens.iter().any(|t| t == token),
        }
    }
}

/// Per-token cost parameters a provider advertises.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee_fraction: f64,
    pub min_amount: f64,
    pub max_amount: Option<f64>,
    pub anonymity_set: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Transfer,
    Deposit,
    Withdraw,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Transfer => "transfer",
            OperationKind::Deposit => "deposit",
            OperationKind::Withdraw => "withdraw",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub token: String,
    pub amount: f64,
    pub recipient: String,
    pub privacy_level: PrivacyLevel,
    pub memo: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub token: String,
    pub amount: f64,
    pub privacy_level: PrivacyLevel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub token: String,
    pub amount: f64,
    pub recipient: String,
    pub privacy_level: PrivacyLevel,
    /// Encoded deposit note, required by note-based pools.
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub operation: OperationKind,
    pub token: String,
    pub amount: f64,
    pub privacy_level: PrivacyLevel,
}

/// Named circuit inputs, decimal field strings keyed by input name.
/// Key order is preserved and is part of the proof contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProveRequest {
    pub circuit: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Balance {
    pub token: String,
    pub amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferResult {
    pub signature: String,
    pub fee: f64,
    pub provider: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositResult {
    pub signature: String,
    pub commitment: Option<String>,
    /// Encoded deposit note for pools that hand spending material back.
    pub note: Option<String>,
    pub fee: f64,
    pub provider: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawResult {
    pub signature: String,
    pub nullifier_hash: Option<String>,
    pub fee: f64,
    pub provider: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostEstimate {
    pub fee: f64,
    pub latency_ms: u64,
    pub anonymity_set: Option<u64>,
    pub warnings: Vec<String>,
}

/// Declarative request the router scores providers against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub privacy_level: PrivacyLevel,
    pub token: String,
    pub amount: f64,
    pub max_fee: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub require_compliance: bool,
    pub preferred_provider: Option<String>,
}

impl SelectionCriteria {
    pub fn new(privacy_level: PrivacyLevel, token: &str, amount: f64) -> Self {
        Self {
            privacy_level,
            token: token.to_string(),
            amount,
            max_fee: None,
            max_latency_ms: None,
            require_compliance: false,
            preferred_provider: None,
        }
    }
}
