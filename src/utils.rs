//! Retry/backoff helper shared by the repository and background snapshotter.
//!
//! Exponential backoff with a cap and jitter; retryability is checked
//! against this crate's `AppError`.

use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(2),
            max_retries: 5,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// Tuned for the row-lock `sequence_conflict` retries the table manager
    /// performs around `modify_during_game_action`.
    pub fn for_table_mutations() -> Self {
        RetryConfig::default()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential_ms = base_ms.saturating_mul(1u64 << attempt.min(20));
        let capped_ms = exponential_ms.min(self.max_delay.as_millis() as u64);

        let jittered_ms = if self.jitter > 0.0 {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0) as u64;
            let hash = now.wrapping_mul(31).wrapping_add(attempt as u64 * 17);
            let jitter_pct = ((hash % 1000) as f64 / 1000.0) * 2.0 - 1.0;
            let jitter_factor = 1.0 + (jitter_pct * self.jitter);
            (capped_ms as f64 * jitter_factor) as u64
        } else {
            capped_ms
        };

        Duration::from_millis(jittered_ms)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Whether `err` is worth retrying under this policy — delegates to
/// `AppError::is_retryable`, kept as a free function so call sites read as
/// a single predicate rather than a method chain.
pub fn is_retryable(err: &AppError) -> bool {
    err.is_retryable()
}

/// Runs `op` up to `config.max_retries + 1` times, sleeping
/// `delay_for_attempt` between attempts, stopping early on a non-retryable
/// error or on success.
pub async fn retry_async<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && config.should_retry(attempt) => {
                tokio::time::sleep(config.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_without_jitter() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_retries: 5,
            jitter: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_retries: 10,
            jitter: 0.0,
        };
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_respects_max_retries() {
        let config = RetryConfig {
            max_retries: 2,
            ..Default::default()
        };
        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(!config.should_retry(2));
    }

    #[tokio::test]
    async fn retry_async_stops_on_non_retryable_error() {
        let config = RetryConfig::for_table_mutations();
        let mut calls = 0;
        let result: Result<(), AppError> = retry_async(&config, || {
            calls += 1;
            async { Err(AppError::rules("not_your_turn", "x")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_async_retries_sequence_conflicts() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_retries: 3,
            jitter: 0.0,
        };
        let mut calls = 0;
        let result: Result<i32, AppError> = retry_async(&config, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(AppError::internal("sequence_conflict", "retry me"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }
}
