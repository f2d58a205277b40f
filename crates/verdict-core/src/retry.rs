//! Exponential backoff retry policy shared by the embedding and LLM clients (§4.5).
//!
//! Models transient vs. non-transient failures as a distinct error kind (`is_retryable`), not
//! by branching on type identity — the "exception-driven control flow" design note in §9.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Anything a caller of [`retry_with_backoff`] can attempt must tell the retry loop whether it
/// is worth attempting again, and (for rate limiting) how long the server asked us to wait.
pub trait Retryable {
    /// Whether the retry loop should attempt again after this error.
    fn is_retryable(&self) -> bool;
    /// Server-supplied minimum wait, if this error carries one (e.g. `Retry-After`).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Compute the delay before attempt number `attempt` (1-indexed: the delay awaited *before*
/// that attempt), per §4.5: base 2s, exponential base 2, cap 120s, ±10% jitter.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, floor: Option<Duration>) -> Duration {
    let exp = attempt.saturating_sub(1).min(20);
    let scaled = config.base_delay.as_secs_f64() * 2f64.powi(exp as i32);
    let capped = scaled.min(config.max_delay.as_secs_f64());

    let jitter_frac = {
        let mut rng = rand::thread_rng();
        rng.gen_range(-config.jitter..=config.jitter)
    };
    let jittered = (capped * (1.0 + jitter_frac)).max(0.0);

    let mut delay = Duration::from_secs_f64(jittered);
    if let Some(floor) = floor {
        delay = delay.max(floor);
    }
    delay
}

/// Retry an async operation per the exponential-backoff policy in §4.5.
///
/// Calls `op` up to `config.max_attempts` times. Between attempts, sleeps
/// [`backoff_delay`], floored by the error's `retry_after()` when present. Stops immediately
/// (without sleeping) on a non-retryable error or after the last attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !err.is_retryable() {
                    return Err(err);
                }
                let delay = backoff_delay(config, attempt, err.retry_after());
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Transient;
    impl Retryable for Transient {
        fn is_retryable(&self) -> bool {
            true
        }
    }

    #[derive(Debug)]
    struct Permanent;
    impl Retryable for Permanent {
        fn is_retryable(&self) -> bool {
            false
        }
    }

    #[test]
    fn backoff_delay_grows_exponentially_and_respects_cap() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: 0.0,
        };
        assert_eq!(backoff_delay(&config, 1, None), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 2, None), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 3, None), Duration::from_secs(8));
        // 2 * 2^6 = 128, capped to 120
        assert_eq!(backoff_delay(&config, 7, None), Duration::from_secs(120));
    }

    #[test]
    fn backoff_delay_honors_retry_after_floor() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: 0.0,
        };
        let delay = backoff_delay(&config, 1, Some(Duration::from_secs(30)));
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        };
        let calls = AtomicU32::new(0);
        let result: Result<&str, Transient> = retry_with_backoff(&config, |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Transient)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), Permanent> = retry_with_backoff(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Permanent) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts_on_persistent_transient_failure() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: 0.0,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), Transient> = retry_with_backoff(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Transient) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
