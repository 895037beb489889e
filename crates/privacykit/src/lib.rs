#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod adapters;
pub mod chain;
pub mod http;
pub mod provider;
pub mod prover;
pub mod retry;
pub mod router;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::{
    ArciumAdapter, ArciumConfig, NoirAdapter, NoirConfig, PrivacyCashAdapter, PrivacyCashConfig,
    ShadowWireAdapter, ShadowWireConfig, WithdrawStage,
};
pub use chain::{derive_pda, nullifier_pda, pool_pda, Chain, InstructionPayload};
pub use provider::{check_support, local_estimate, PrivacyProvider, ProveResult};
pub use prover::{CircuitBackend, LocalProver};
pub use retry::{retry_with_backoff, with_timeout, RetryPolicy};
pub use router::{ProviderRouter, RankedProvider, SelectionResult};
pub use wallet::Wallet;

pub use privacykit_crypto as crypto;
pub use privacykit_types as types;
