//! Mock wallet and chain collaborators for adapter tests.

use async_trait::async_trait;
use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::chain::{Chain, InstructionPayload};
use crate::wallet::Wallet;

pub struct MockWallet {
    address: String,
}

impl MockWallet {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, message: &[u8]) -> PrivacyKitResult<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(self.address.as_bytes());
        hasher.update(message);
        Ok(hasher.finalize().to_vec())
    }
}

/// Records submitted instructions and simulates account creation: a pool
/// withdrawal (`0x02`) brings its nullifier PDA (second account) into
/// existence, which is what the replay check observes.
pub struct MockChain {
    instructions: Mutex<Vec<InstructionPayload>>,
    accounts: Mutex<HashSet<String>>,
    balances: Mutex<HashMap<(String, String), u128>>,
    fail_confirmations: AtomicBool,
    sequence: AtomicU64,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            instructions: Mutex::new(Vec::new()),
            accounts: Mutex::new(HashSet::new()),
            balances: Mutex::new(HashMap::new()),
            fail_confirmations: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn sent_instructions(&self) -> Vec<InstructionPayload> {
        self.instructions.lock().unwrap().clone()
    }

    pub fn fail_confirmations(&self, fail: bool) {
        self.fail_confirmations.store(fail, Ordering::SeqCst);
    }

    pub fn set_balance(&self, address: &str, token: &str, units: u128) {
        self.balances
            .lock()
            .unwrap()
            .insert((address.to_string(), token.to_string()), units);
    }

    pub fn clear_account(&self, address: &str) {
        self.accounts.lock().unwrap().remove(address);
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chain for MockChain {
    async fn send_instruction(&self, instruction: &InstructionPayload) -> PrivacyKitResult<String> {
        if instruction.data.first() == Some(&0x02) && instruction.accounts.len() >= 2 {
            self.accounts
                .lock()
                .unwrap()
                .insert(instruction.accounts[1].clone());
        }
        self.instructions.lock().unwrap().push(instruction.clone());

        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(format!("sig-{}", n))
    }

    async fn confirm_transaction(&self, signature: &str) -> PrivacyKitResult<()> {
        if self.fail_confirmations.load(Ordering::SeqCst) {
            return Err(PrivacyKitError::Transaction {
                cause: "confirmation failed".to_string(),
                signature: Some(signature.to_string()),
            });
        }
        Ok(())
    }

    async fn account_exists(&self, address: &str) -> PrivacyKitResult<bool> {
        Ok(self.accounts.lock().unwrap().contains(address))
    }

    async fn token_balance(&self, address: &str, token: &str) -> PrivacyKitResult<u128> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(address.to_string(), token.to_string()))
            .copied()
            .unwrap_or(0))
    }
}
