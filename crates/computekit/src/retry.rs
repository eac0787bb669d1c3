//! Retry logic with exponential backoff for transient provider errors.
//!
//! Only transport-level unavailability is retried. Semantic operations that
//! reach the provider and fail (create/update/delete) are never reattempted
//! here; blind reattempt after partial failure could duplicate resources.

use crate::error::{Error, Result};
use std::thread;
use std::time::Duration;

/// Configuration for retrying transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_factor: f64,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

/// Execute an operation, retrying transient failures with backoff.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once all attempts are exhausted.
pub fn with_retry<T, F>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..config.max_attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                if attempt + 1 >= config.max_attempts {
                    last_error = Some(e);
                    break;
                }

                let delay = config.delay_for_attempt(attempt);
                log::warn!(
                    "attempt {}/{} failed: {}, retrying in {:?}",
                    attempt + 1,
                    config.max_attempts,
                    e,
                    delay
                );
                thread::sleep(delay);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("retry exhausted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();

        let result: Result<()> = with_retry(&RetryConfig::default(), || {
            counter.set(counter.get() + 1);
            Err(Error::OperationFailed {
                kind: OperationKind::Create,
                message: "quota exceeded".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success_on_transient_error() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        };
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();

        let result = with_retry(&config, || {
            let current = counter.get();
            counter.set(current + 1);
            if current < 2 {
                Err(Error::Unavailable {
                    message: "503".to_string(),
                })
            } else {
                Ok(7)
            }
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_all_attempts_exhausted() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        };
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();

        let result: Result<()> = with_retry(&config, || {
            counter.set(counter.get() + 1);
            Err(Error::Unavailable {
                message: "503".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            backoff_factor: 10.0,
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }
}
