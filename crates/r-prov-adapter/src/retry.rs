//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::time::Duration;

use r_prov_common::AdapterConfig;

use crate::executor::ExecutorError;

/// Retry policy applied to CREATE commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Status codes that make a failure retryable.
    pub retryable_statuses: BTreeSet<u16>,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AdapterConfig::default())
    }
}

impl RetryPolicy {
    /// Build the policy from adapter configuration.
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self {
            max_retries: config.network_create_retries,
            retryable_statuses: config.retryable_statuses.iter().copied().collect(),
            base_delay: config.retry_backoff,
        }
    }

    /// Override the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Whether the failure carries a retryable status code.
    pub fn is_retryable(&self, error: &ExecutorError) -> bool {
        error
            .status()
            .map(|status| self.retryable_statuses.contains(&status))
            .unwrap_or(false)
    }

    /// Attempt to run after `attempt` failed with `error`, if any. Attempts
    /// are numbered from zero, so the last permitted attempt is `max_retries`.
    pub fn next_attempt(&self, error: &ExecutorError, attempt: u32) -> Option<u32> {
        if self.is_retryable(error) && attempt < self.max_retries {
            Some(attempt + 1)
        } else {
            None
        }
    }

    /// Delay to wait before running `attempt` (which must be at least 1).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 1).min(8);
        self.base_delay.saturating_mul(1 << exponent)
    }
}
