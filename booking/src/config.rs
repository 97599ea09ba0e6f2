//! Orchestrator configuration.
//!
//! Timeouts and retry counts are passed in explicitly; the saga never reads
//! the environment mid-algorithm. `from_env` exists for binaries and tests
//! and falls back to the defaults field by field.

use std::env;
use std::time::Duration;

use marquee_runtime::retry::RetryPolicy;

/// Configuration for one [`crate::BookingOrchestrator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Deadline for the showtime read
    pub get_showtime_timeout: Duration,
    /// Deadline for the seat lock call; expiry means unknown outcome
    pub lock_timeout: Duration,
    /// Deadline for the best-effort unlock issued after an unknown outcome
    pub unlock_timeout: Duration,
    /// Backoff schedule for the compensating delete
    pub compensation_retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            get_showtime_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(5),
            unlock_timeout: Duration::from_secs(5),
            compensation_retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables, defaulting field by
    /// field
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            get_showtime_timeout: env_millis("BOOKING_GET_SHOWTIME_TIMEOUT_MS")
                .unwrap_or(defaults.get_showtime_timeout),
            lock_timeout: env_millis("BOOKING_LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout),
            unlock_timeout: env_millis("BOOKING_UNLOCK_TIMEOUT_MS")
                .unwrap_or(defaults.unlock_timeout),
            compensation_retry: RetryPolicy {
                max_retries: env_parse("BOOKING_COMPENSATION_MAX_RETRIES")
                    .unwrap_or(defaults.compensation_retry.max_retries),
                initial_delay: env_millis("BOOKING_COMPENSATION_INITIAL_DELAY_MS")
                    .unwrap_or(defaults.compensation_retry.initial_delay),
                max_delay: env_millis("BOOKING_COMPENSATION_MAX_DELAY_MS")
                    .unwrap_or(defaults.compensation_retry.max_delay),
                multiplier: env_parse("BOOKING_COMPENSATION_MULTIPLIER")
                    .unwrap_or(defaults.compensation_retry.multiplier),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.compensation_retry.max_retries, 3);
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        // No BOOKING_* variables are set in the test environment.
        assert_eq!(OrchestratorConfig::from_env(), OrchestratorConfig::default());
    }
}
