use std::time::Duration;

use crate::errors::{FlashLoanError, FlashLoanResult};

/// Retry and confirmation schedule, expressed in abstract time units
///
/// With the defaults a failed broadcast is retried after 5, then 10 units,
/// and confirmation is polled every unit without an overall deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPolicy {
    /// Total broadcast attempts, including the first
    pub max_attempts: u32,
    /// Backoff grows by this many units after each failed attempt
    pub backoff_step_units: u32,
    /// Units between two signature status queries
    pub poll_interval_units: u32,
    /// Length of one unit
    pub time_unit: Duration,
    /// Give up waiting for finality after this long; `None` waits forever
    pub confirm_timeout: Option<Duration>,
    /// Query the already-known signature before resubmitting and after the
    /// final failed attempt
    pub reconcile_before_retry: bool,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_units: 5,
            poll_interval_units: 1,
            time_unit: Duration::from_secs(1),
            confirm_timeout: None,
            reconcile_before_retry: true,
        }
    }
}

impl SubmissionPolicy {
    /// Wait after the `failed_attempts`-th consecutive failure (1-indexed)
    pub fn backoff_after(&self, failed_attempts: u32) -> Duration {
        self.backoff_step_units
            .checked_mul(failed_attempts)
            .and_then(|units| self.time_unit.checked_mul(units))
            .unwrap_or(Duration::MAX)
    }

    pub fn poll_interval(&self) -> Duration {
        self.time_unit
            .checked_mul(self.poll_interval_units)
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> FlashLoanResult<()> {
        if self.max_attempts == 0 {
            return Err(FlashLoanError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.time_unit.is_zero() {
            return Err(FlashLoanError::Configuration(
                "time_unit must be non-zero".to_string(),
            ));
        }
        if self.poll_interval_units == 0 {
            return Err(FlashLoanError::Configuration(
                "poll_interval_units must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
