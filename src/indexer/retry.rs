//! Exponential backoff for index and RPC calls
//!
//! The dev index regularly answers 502/503/520 under load. Those, plus
//! timeouts and dropped connections, are retried; anything else (404, bad
//! JSON, "pool not found") fails on the first attempt.

use eyre::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP statuses worth another attempt
const RETRYABLE_STATUS: &[u16] = &[500, 502, 503, 504, 520];

/// Message fragments of transient transport failures (alloy wraps the
/// underlying reqwest error as text)
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "connection closed",
    "error sending request",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "internal server error",
];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// A single attempt, no backoff
    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("✅ {} succeeded on attempt {}", what, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    warn!(
                        "⚠️  {} failed (attempt {}/{}): {} - retrying in {:?}",
                        what, attempt, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.next_delay(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether an error looks transient
pub fn is_retryable(err: &eyre::Report) -> bool {
    for cause in err.chain() {
        if let Some(re) = cause.downcast_ref::<reqwest::Error>() {
            if re.is_timeout() || re.is_connect() {
                return true;
            }
            if let Some(status) = re.status() {
                return RETRYABLE_STATUS.contains(&status.as_u16());
            }
        }
    }

    let message = format!("{:#}", err).to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        let mut seen = vec![];
        for _ in 0..7 {
            seen.push(delay.as_secs());
            delay = policy.next_delay(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_classification_by_message() {
        assert!(is_retryable(&eyre!("operation timed out")));
        assert!(is_retryable(&eyre!("HTTP 503 Service Unavailable")));
        assert!(!is_retryable(&eyre!("Pool 0xabc not found")));
        assert!(!is_retryable(&eyre!("missing field `vault0`")));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(5)
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(eyre!("connection reset by peer"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(5)
            .run("lookup", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(eyre!("Pool 0xdead not found")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .run("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(eyre!("gateway timeout")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
