use reqwest::StatusCode;
use std::time::{Duration, SystemTime};

use crate::config::RetryOptions;

/// Policy parameters for retry decisions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay used for the first retry attempt.
    pub base_delay: Duration,
    /// Upper bound on any wait, server hints included.
    pub max_delay: Duration,
    /// Retries allowed after the first request.
    pub max_retries: u32,
}

impl RetryPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Total request attempts this policy allows, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryOptions::default())
    }
}

impl From<&RetryOptions> for RetryPolicy {
    fn from(options: &RetryOptions) -> Self {
        Self::new(
            Duration::from_millis(options.base_delay_ms),
            Duration::from_millis(options.max_delay_ms),
            options.max_attempts.max(1) - 1,
        )
    }
}

/// Error classes that influence retry decisions.
#[derive(Debug, Clone, Copy)]
pub enum RetryError {
    /// HTTP error with status code and optional server-provided delay.
    Http {
        status: StatusCode,
        retry_after: Option<Duration>,
    },
    /// Network level failure without a status code.
    Network,
    /// Reply arrived but could not be used.
    Malformed,
    /// Errors that should not be retried.
    Fatal,
}

/// Decision made by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay_ms: u64,
    pub used_hint: bool,
}

impl RetryDecision {
    const fn no_retry() -> Self {
        Self {
            should_retry: false,
            delay_ms: 0,
            used_hint: false,
        }
    }

    fn retry_with(delay: Duration, used_hint: bool, max_delay: Duration) -> Self {
        let capped = delay.min(max_delay);
        let delay_ms = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
        Self {
            should_retry: true,
            delay_ms,
            used_hint,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Calculates the next retry decision.
///
/// * `previous_attempts` counts the retries that have already been made.
pub fn evaluate_retry(
    error: RetryError,
    policy: RetryPolicy,
    previous_attempts: u32,
) -> RetryDecision {
    if previous_attempts >= policy.max_retries {
        return RetryDecision::no_retry();
    }

    match error {
        RetryError::Fatal => RetryDecision::no_retry(),
        RetryError::Http { status, .. } if !is_retryable_status(status) => {
            RetryDecision::no_retry()
        }
        // Identical request resent right away.
        RetryError::Malformed => RetryDecision::retry_with(Duration::ZERO, false, policy.max_delay),
        RetryError::Http {
            retry_after: Some(hint),
            ..
        } => RetryDecision::retry_with(hint, true, policy.max_delay),
        RetryError::Http { .. } | RetryError::Network => {
            let delay =
                compute_exponential_backoff(policy.base_delay, policy.max_delay, previous_attempts);
            RetryDecision::retry_with(delay, false, policy.max_delay)
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn compute_exponential_backoff(
    base: Duration,
    max_delay: Duration,
    previous_attempts: u32,
) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let multiplier = 1u128.checked_shl(previous_attempts).unwrap_or(u128::MAX);
    let delay_ms = base.as_millis().saturating_mul(multiplier);
    let capped_ms = delay_ms.min(max_delay.as_millis());
    Duration::from_millis(u64::try_from(capped_ms).unwrap_or(u64::MAX))
}

/// Parses the value of an HTTP `Retry-After` header.
///
/// Returns `None` when parsing fails.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(instant) = httpdate::parse_http_date(trimmed) {
        return Some(instant.duration_since(now).unwrap_or(Duration::ZERO));
    }

    None
}
