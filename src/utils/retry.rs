//! Bounded retry with an explicit "do not retry" classification
//!
//! Operations hand back a [`Classified`] error: [`Classified::Retryable`] failures
//! are retried after a delay until the attempt budget runs out, while
//! [`Classified::Fatal`] failures stop the loop at once and the unwrapped cause
//! is returned. The caller decides the class; this module only honours it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SeatErrorTrait;

/// An error tagged with its retry class
#[derive(Debug)]
pub enum Classified<E> {
    /// Transient failure, the same call may be repeated after the delay
    Retryable(E),
    /// Definitive failure, the next attempt is someone else's decision
    Fatal(E),
}

impl<E> Classified<E> {
    /// Classify an error by its own recoverability
    pub fn by_recoverability(err: E) -> Self
    where
        E: SeatErrorTrait,
    {
        if err.is_recoverable() {
            Self::Retryable(err)
        } else {
            Self::Fatal(err)
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Drop the tag and return the underlying cause
    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(e) | Self::Fatal(e) => e,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of invocations, including the first one
    pub max_attempts: u32,

    /// Delay in milliseconds before the first retry
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps growth)
    pub max_delay_ms: u64,

    /// Multiplier applied per retry; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with a custom attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Exponential backoff starting at `base_delay_ms`, capped at `max_delay_ms`
    pub fn with_backoff(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Attempt budget, never below one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-based)
    fn calculate_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }
}

/// Execute an operation until it succeeds, fails fatally or the budget is spent
///
/// Each failed attempt emits one log record carrying the attempt index, the
/// budget and the failure. A [`Classified::Fatal`] error returns immediately
/// without sleeping; otherwise the last error is returned once every attempt
/// has been used.
///
/// # Example
///
/// ```no_run
/// use seat_killer::utils::retry::{with_retry, Classified, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig::fixed(2, Duration::from_millis(100));
///     let result: Result<u32, String> = with_retry(&config, || async {
///         Err(Classified::Fatal("seat already taken".to_string()))
///     })
///     .await;
///     assert!(result.is_err());
/// }
/// ```
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Classified<E>>>,
    E: Display,
{
    let max_attempts = config.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, max_attempts, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(Classified::Fatal(e)) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed with unretryable error"
                );
                return Err(e);
            }
            Err(Classified::Retryable(e)) => {
                if attempt >= max_attempts {
                    warn!(attempt, max_attempts, error = %e, "Attempt failed, budget exhausted");
                    return Err(e);
                }

                let delay = config.calculate_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
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
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::new(3);
        let result: Result<u32, String> = with_retry(&config, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::fixed(5, Duration::from_millis(100));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<u32, String> = with_retry(&config, move || {
            let attempts = Arc::clone(&counter);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 3 {
                    return Err(Classified::Retryable(format!("blip {count}")));
                }
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_returns_last_error() {
        let config = RetryConfig::fixed(3, Duration::from_secs(1));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), String> = with_retry(&config, move || {
            let attempts = Arc::clone(&counter);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                Err(Classified::Retryable(format!("failure {n}")))
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_stops_without_sleeping() {
        let config = RetryConfig::fixed(5, Duration::from_secs(60));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let started = tokio::time::Instant::now();

        let result: Result<(), String> = with_retry(&config, move || {
            let attempts = Arc::clone(&counter);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Classified::Fatal("seat taken".to_string()))
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "seat taken");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let config = RetryConfig::fixed(1, Duration::from_secs(60));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), String> = with_retry(&config, move || {
            let attempts = Arc::clone(&counter);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Classified::Retryable("timeout".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryConfig::new(0).attempts(), 1);
    }

    #[test]
    fn test_calculate_delay_fixed() {
        let config = RetryConfig::fixed(20, Duration::from_secs(3));
        assert_eq!(config.calculate_delay(1), Duration::from_secs(3));
        assert_eq!(config.calculate_delay(19), Duration::from_secs(3));
    }

    #[test]
    fn test_calculate_delay_backoff_cap() {
        let config = RetryConfig::with_backoff(10, 1000, 5000);
        assert_eq!(config.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_classified_into_inner() {
        let fatal: Classified<&str> = Classified::Fatal("x");
        assert!(fatal.is_fatal());
        assert_eq!(fatal.into_inner(), "x");
        assert!(!Classified::Retryable(1).is_fatal());
    }
}
