use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry policy for a single remote call: bounded attempts with a fixed
/// delay between them. Exponential backoff can be opted into; the
/// max-attempts bound holds either way.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay between attempts (base value when backoff is enabled).
    pub delay: Duration,
    /// Double the delay after each failure, capped at 60s.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
            exponential_backoff: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            exponential_backoff: false,
        }
    }
}

/// Run `operation` under `policy`.
///
/// Returns the first success, or the last error once all attempts are
/// spent. Intermediate errors are logged and swallowed.
pub async fn retry_async<F, Fut, T, E>(mut operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = policy.delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("✅ Succeeded on attempt {attempt}");
                }
                return Ok(result);
            }
            Err(e) => {
                warn!("❌ Attempt {attempt} failed: {e}");

                if attempt >= policy.max_attempts {
                    warn!(
                        "🚫 Maximum attempts ({}) reached, giving up.",
                        policy.max_attempts
                    );
                    return Err(e);
                }

                info!("⏳ Waiting {:?} before retrying...", delay);
                sleep(delay).await;

                if policy.exponential_backoff {
                    delay = std::cmp::min(delay * 2, Duration::from_secs(60));
                }
            }
        }
    }
}
