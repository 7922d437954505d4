//! Retry and timeout configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout and retry limits applied to every outward call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Per-attempt timeout in milliseconds (0 = no timeout)
    pub timeout_ms: u64,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Linear backoff step in milliseconds
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Effective attempt count; never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Per-attempt timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Delay to wait before the given 1-based attempt.
    ///
    /// Attempt `n + 1` waits `base_delay_ms * n`; the first attempt does not
    /// wait.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let previous = u64::from(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(previous))
    }

    /// Delays before attempts 2..=max, in order.
    pub fn delay_schedule(&self) -> Vec<Duration> {
        (2..=self.attempts()).map(|n| self.delay_before(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1_000);
    }

    #[test]
    fn test_linear_delay_schedule() {
        let config = RetryConfig::new().with_max_attempts(4).with_base_delay_ms(250);
        assert_eq!(config.delay_before(1), Duration::ZERO);
        assert_eq!(
            config.delay_schedule(),
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_millis(750),
            ]
        );
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let config = RetryConfig::new().with_max_attempts(0);
        assert_eq!(config.attempts(), 1);
        assert!(config.delay_schedule().is_empty());
    }

    #[test]
    fn test_zero_timeout_disables() {
        assert!(RetryConfig::new().with_timeout_ms(0).timeout().is_none());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"maxAttempts": 5}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.timeout_ms, 60_000);
    }
}
