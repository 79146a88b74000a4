use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::GenerationError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Fixed-delay retry on rate limiting. No jitter, no growth between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    OtherFailure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationAttempt {
    pub attempt_index: u32,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: Vec<GenerationAttempt>,
}

/// The error that ended a retry loop, with every attempt made before it.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RetryFailure {
    pub error: GenerationError,
    pub attempts: Vec<GenerationAttempt>,
}

/// Runs `op` until it succeeds, fails with anything other than a rate
/// limit, or `max_attempts` calls have been made. A `max_attempts` of 0 is
/// treated as 1.
pub async fn retry_on_rate_limit<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<Retried<T>, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = Vec::new();

    loop {
        let attempt_index = attempts.len() as u32;
        match op().await {
            Ok(value) => {
                attempts.push(GenerationAttempt {
                    attempt_index,
                    outcome: AttemptOutcome::Success,
                });
                return Ok(Retried { value, attempts });
            }
            Err(err) if err.is_rate_limited() => {
                attempts.push(GenerationAttempt {
                    attempt_index,
                    outcome: AttemptOutcome::RateLimited,
                });
                if attempt_index + 1 >= max_attempts {
                    warn!(attempts = max_attempts, error = %err, "rate limited, giving up");
                    return Err(RetryFailure {
                        error: GenerationError::Exhausted {
                            attempts: max_attempts,
                            last: Box::new(err),
                        },
                        attempts,
                    });
                }
                warn!(
                    attempt = attempt_index + 1,
                    max_attempts,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    error = %err,
                    "rate limited, retrying after delay"
                );
                sleep(policy.retry_delay).await;
            }
            Err(err) => {
                attempts.push(GenerationAttempt {
                    attempt_index,
                    outcome: AttemptOutcome::OtherFailure,
                });
                debug!(
                    attempt = attempt_index + 1,
                    error = %err,
                    "generation failed, not retrying"
                );
                return Err(RetryFailure {
                    error: err,
                    attempts,
                });
            }
        }
    }
}
