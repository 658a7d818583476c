//! Async utilities: bounded retry policy and timeouts

use crate::error::{AttendError, AttendResult, ErrorContext};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier, 1.0 for a fixed delay
    pub backoff_multiplier: f64,
    /// Whether to add +/-10% jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Fixed delay between a bounded number of retries
    pub fn fixed(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Whether retry number `retry` (1-based) is still allowed
    pub fn allows(&self, retry: u32) -> bool {
        retry <= self.max_retries
    }

    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);

        let millis = if self.jitter {
            let jitter = (fastrand::f64() - 0.5) * 0.2;
            capped * (1.0 + jitter)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, bound: Duration, operation_name: &str) -> AttendResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(bound, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(AttendError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: bound.as_millis() as u64,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &bound.as_millis().to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delays_are_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 300,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
    }

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy::fixed(1, 10);
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
        assert!(!RetryPolicy::none().allows(1));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_timeout_error() {
        let result = with_timeout(
            tokio::time::sleep(Duration::from_secs(5)),
            Duration::from_secs(1),
            "sleep",
        )
        .await;
        assert!(result.unwrap_err().is_timeout());

        let value = with_timeout(async { 7 }, Duration::from_secs(1), "ready")
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
