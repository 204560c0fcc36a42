//! Secondary rate-limit backoff.

use std::future::Future;
use std::time::Duration;

use log::warn;

/// How often and how patiently to retry a rate-limited call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
        }
    }
}

/// Outcome of a call that did not succeed.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Retried<E> {
    /// Every attempt hit the rate limit.
    Exhausted { attempts: u32 },
    /// A non rate-limit failure, returned at once.
    Failed(E),
}

/// Run `call` until it succeeds, fails for another reason, or runs out of
/// attempts. Delays double after each rate-limited attempt, capped at
/// `max_delay`.
pub(crate) async fn retry_rate_limited<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    is_rate_limited: fn(&E) -> bool,
    mut call: F,
) -> Result<T, Retried<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if is_rate_limited(&err) => {
                if attempt >= policy.max_attempts {
                    return Err(Retried::Exhausted { attempts: attempt });
                }
                warn!(
                    "{operation}: secondary rate limit detected, retrying in {}s (attempt {attempt}/{})",
                    delay.as_secs(),
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
            Err(err) => return Err(Retried::Failed(err)),
        }
    }
}

/// Does an API answer with this status and message mean "slow down"?
pub(crate) fn is_rate_limit_response(status: u16, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    status == 429
        || (status == 403
            && (message.contains("secondary rate limit")
                || message.contains("rate limit exceeded")
                || message.contains("abuse detection")))
}

pub(crate) fn is_secondary_rate_limit(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            is_rate_limit_response(source.status_code.as_u16(), &source.message)
        }
        _ => false,
    }
}
