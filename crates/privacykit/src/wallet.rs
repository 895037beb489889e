use async_trait::async_trait;
use privacykit_types::PrivacyKitResult;

/// Signing capability injected into adapters at initialization. Key
/// management stays with the caller; the toolkit only asks for signatures
/// over canonical payload bytes.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> String;

    async fn sign_message(&self, message: &[u8]) -> PrivacyKitResult<Vec<u8>>;
}
