//! Whole-domain retry loop and delay helpers.
//!
//! Render failures and domain timeouts are retried after a fixed backoff.
//! Sink failures are not: re-scraping the merchant cannot fix a failed write.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::Render(_) | ScraperError::DomainTimeout { .. } | ScraperError::Http(_)
    )
}

/// Runs `operation` once plus up to `max_retries` more times on retriable
/// errors, sleeping `backoff_ms` between attempts.
///
/// `operation` receives the zero-based attempt number. The last error is
/// returned once retries are exhausted; non-retriable errors are returned
/// immediately.
pub(crate) async fn retry_fixed<T, F, Fut>(
    domain: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(
                    domain,
                    attempt,
                    max_retries,
                    backoff_ms,
                    error = %err,
                    "domain attempt failed, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// `ms` with ±25 % random jitter. Zero stays zero.
pub(crate) fn jittered(ms: u64) -> Duration {
    if ms == 0 {
        return Duration::ZERO;
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let delay_ms = (ms as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(delay_ms)
}
