//! Exponential backoff around repository calls.

use std::future::Future;
use tracing::warn;

use crate::config::RetryConfig;
use crate::ports::PersistenceError;

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// attempts run out.
pub(crate) async fn with_backoff<T, F, Fut>(
    policy: &RetryConfig,
    operation: &'static str,
    mut op: F,
) -> Result<T, PersistenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PersistenceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(operation, attempt, ?delay, error = %e, "repository call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
