// Bounded retry with exponential backoff for remote calls.
//
// Both the Graph API client and the Sheets ledger wrap their requests in
// with_backoff. Transient network failures get a few capped retries;
// anything still failing after that surfaces to the caller, which decides
// whether to absorb it (neutral result) or keep state for a later attempt.

use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Base delay for exponential backoff (doubles each retry).
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff delay to cap exponential growth.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry an async operation with exponential backoff.
///
/// The operation is attempted up to `max_attempts` times. Delays between
/// attempts grow as base * 2^attempt, capped at `MAX_BACKOFF`. The last
/// error is returned once attempts are exhausted.
pub async fn with_backoff<F, Fut, T>(label: &str, max_attempts: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }

                let backoff = BASE_BACKOFF.saturating_mul(1 << attempt).min(MAX_BACKOFF);

                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_secs = backoff.as_secs(),
                    "{label} failed: {err:#}, retrying"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}
