use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrivacyKitError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Unsupported token: {token}")]
    UnsupportedToken {
        token: String,
        provider: Option<String>,
    },

    #[error("Unsupported privacy level: {level}")]
    UnsupportedPrivacyLevel {
        level: String,
        provider: Option<String>,
    },

    #[error("Insufficient balance: need {required} {token}, have {available}")]
    InsufficientBalance {
        required: f64,
        available: f64,
        token: String,
    },

    #[error("Amount {amount} {token} is below the {provider} minimum of {minimum}")]
    AmountBelowMinimum {
        amount: f64,
        minimum: f64,
        token: String,
        provider: String,
    },

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Proof generation failed for circuit {circuit}: {cause}")]
    ProofGeneration { circuit: String, cause: String },

    #[error("Proof verification failed: {0}")]
    ProofVerification(String),

    #[error("Transaction failed: {cause}")]
    Transaction {
        cause: String,
        signature: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Merkle tree is full")]
    TreeFull,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No suitable provider: {0}")]
    NoSuitableProvider(String),
}

impl PrivacyKitError {
    /// Transport-level failures are the only errors the retry layer replays.
    pub fn is_transport(&self) -> bool {
        matches!(self, PrivacyKitError::Network(_))
    }
}

pub type PrivacyKitResult<T> = Result<T, PrivacyKitError>;
