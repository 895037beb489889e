use async_trait::async_trait;
use privacykit_types::PrivacyKitResult;
use sha2::{Digest, Sha256};

/// One instruction's worth of bytes bound for the chain. Transaction
/// assembly and signing happen behind the `Chain` capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionPayload {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: Vec<u8>,
}

/// RPC capability injected into adapters at initialization.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Submit an instruction and return the transaction signature.
    async fn send_instruction(&self, instruction: &InstructionPayload) -> PrivacyKitResult<String>;

    async fn confirm_transaction(&self, signature: &str) -> PrivacyKitResult<()>;

    async fn account_exists(&self, address: &str) -> PrivacyKitResult<bool>;

    /// Token balance of `address` in base units.
    async fn token_balance(&self, address: &str, token: &str) -> PrivacyKitResult<u128>;
}

/// Client-side label for a program-derived address. The chain collaborator
/// owns the real derivation; this digest only needs to be deterministic in
/// (program, seeds).
pub fn derive_pda(program_id: &str, seeds: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(program_id.as_bytes());
    for seed in seeds {
        hasher.update((seed.len() as u32).to_le_bytes());
        hasher.update(seed);
    }
    hex::encode(hasher.finalize())
}

/// Pool PDA: seeds `"pool" | mint`.
pub fn pool_pda(program_id: &str, mint: &str) -> String {
    derive_pda(program_id, &[b"pool", mint.as_bytes()])
}

/// Nullifier PDA: seeds `"nullifier" | nullifier_hash`.
pub fn nullifier_pda(program_id: &str, nullifier_hash: &[u8; 32]) -> String {
    derive_pda(program_id, &[b"nullifier", nullifier_hash])
}

/// 32-byte form of an address for instruction payloads. 64-character hex
/// addresses decode directly; anything else is folded to its SHA-256 image.
pub fn address_bytes(address: &str) -> [u8; 32] {
    if address.len() == 64 {
        if let Ok(bytes) = hex::decode(address) {
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes);
            return out;
        }
    }
    let digest = Sha256::digest(address.as_bytes());
    digest.into()
}
