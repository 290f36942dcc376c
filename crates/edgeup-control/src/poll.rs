//! Bounded retry-until-predicate primitive

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Condition not met after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Fixed-interval polling with an attempt ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    /// Once per second for thirty seconds
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 30)
    }
}

/// Run `probe` until it yields a value or the attempts run out
///
/// The probe receives the 1-based attempt number. The policy interval is
/// slept between attempts, never after the last one.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<T, PollError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe(attempt).await {
            return Ok(value);
        }
        debug!("Poll attempt {}/{} came up empty", attempt, policy.max_attempts);

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_hit() {
        let started = Instant::now();
        let result = poll_until(PollPolicy::default(), |attempt| async move {
            (attempt == 4).then_some(attempt * 10)
        })
        .await;

        assert_eq!(result, Ok(40));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = poll_until(PollPolicy::new(Duration::from_secs(1), 30), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert_eq!(result, Err(PollError::Exhausted { attempts: 30 }));
        assert_eq!(calls.load(Ordering::SeqCst), 30);
        assert_eq!(started.elapsed(), Duration::from_secs(29));
    }

    #[tokio::test]
    async fn test_zero_attempts_never_probes() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = poll_until(PollPolicy::new(Duration::from_millis(1), 0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert_eq!(result, Err(PollError::Exhausted { attempts: 0 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
