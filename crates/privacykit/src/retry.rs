use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default transport timeout for API and RPC calls.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Transaction confirmation timeout.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
/// Proof generation timeout.
pub const PROVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Exponential backoff policy for transport failures. Validation and
/// server-reported business errors are never replayed.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub should_retry: fn(&PrivacyKitError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            should_retry: PrivacyKitError::is_transport,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, the policy declines the error, or the
/// retry budget runs out.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> PrivacyKitResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PrivacyKitResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_retries && (policy.should_retry)(&error) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    op_name, attempt, policy.max_retries, error, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Bound a suspending operation; exceeding the limit surfaces `Timeout`
/// without leaving partial state behind.
pub async fn with_timeout<T, Fut>(limit: Duration, op_name: &str, future: Fut) -> PrivacyKitResult<T>
where
    Fut: Future<Output = PrivacyKitResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(PrivacyKitError::Timeout(op_name.to_string())),
    }
}
