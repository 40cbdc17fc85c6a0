//! Retry engine (C2).
//!
//! Executes one async operation under a [`RetryPolicy`], consulting the
//! classifier (C1) after every failed attempt to decide whether to sleep and
//! try again or give up. Sleeps are cancellable so a supervisor-initiated
//! shutdown drains in bounded time.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::ClassifiedError;

/// Per-call retry policy. `max_attempts >= 1`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be >= 1");
        Self {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_ratio: 0.2,
        }
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn with_multiplier(mut self, m: f64) -> Self {
        self.multiplier = m;
        self
    }

    pub fn with_jitter_ratio(mut self, r: f64) -> Self {
        self.jitter_ratio = r;
        self
    }

    /// Unjittered delay before attempt `i+1` (0-indexed `i`), clamped to `max_delay`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }

    /// Jittered delay before attempt `i+1`, sampled independently per call.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_for_with_rng(attempt, &mut rand::thread_rng())
    }

    fn delay_for_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay_for(attempt);
        if self.jitter_ratio <= 0.0 {
            return base;
        }
        let jitter_max = base.as_secs_f64() * self.jitter_ratio;
        let jitter = rng.gen_range(0.0..=jitter_max.max(0.0));
        base + Duration::from_secs_f64(jitter)
    }

    /// Search adapter policy: retryable on {429, 500, 502, 503, 504}.
    pub fn for_search() -> Self {
        Self::new(3)
    }

    /// Scraper adapter policy: retryable on {429, 502, 503, 504, 510}; permanent on {400, 401, 403}.
    pub fn for_scraper() -> Self {
        Self::new(3)
    }

    /// Reddit adapter policy — conservative, token refresh already serializes contention.
    pub fn for_reddit() -> Self {
        Self::new(3)
    }

    /// LLM adapter policy.
    pub fn for_llm() -> Self {
        Self::new(3)
    }

    /// A policy that exercises many retries quickly; test-only per the design notes —
    /// never constructed by production adapter setup.
    #[cfg(test)]
    pub fn test_many_attempts() -> Self {
        Self::new(20)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }
}

/// Run `op` under `policy`, classifying each failure with `classify`. `op` is
/// called once per attempt and must itself map its `Err` into a
/// [`ClassifiedError`] (adapters do this at the boundary where they still know
/// the HTTP status / transport error that produced it).
pub async fn run_with_retry<T, Fut, F>(mut op: F, policy: &RetryPolicy) -> Result<T, ClassifiedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ClassifiedError>>,
{
    let mut last_err: Option<ClassifiedError> = None;
    for attempt in 0..policy.max_attempts {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.retryable {
                    return Err(err);
                }
                let is_last = attempt + 1 == policy.max_attempts;
                if is_last {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(attempt, kind = %err.kind, delay_ms = delay.as_millis() as u64, "retrying after classified failure");
                last_err = Some(err);
                // Cancellation is handled by callers racing this future against a
                // shutdown signal via `tokio::select!`.
                tokio::time::sleep(delay).await;
            }
        }
    }
    // Unreachable in practice (max_attempts >= 1 guarantees at least one iteration
    // returns above), but keeps the function total.
    Err(last_err.unwrap_or_else(|| {
        crate::error::ClassifiedError::new(crate::error::ErrorKind::Internal, "no attempts made")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_first_attempt_without_sleep() {
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = run_with_retry(
            move |_attempt| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ClassifiedError>(42) }
            },
            &policy,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5).with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), _> = run_with_retry(
            move |_attempt| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Err(ClassifiedError::new(ErrorKind::Auth, "nope").retryable(false)) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_error_retries_up_to_max_attempts() {
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<(), _> = run_with_retry(
            move |_attempt| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Err(ClassifiedError::new(ErrorKind::ServiceUnavailable, "down")) }
            },
            &policy,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_on_last_attempt() {
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = run_with_retry(
            move |attempt| {
                let n = calls2.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 2 {
                        Ok(n)
                    } else {
                        Err(ClassifiedError::new(ErrorKind::RateLimited, "slow down"))
                    }
                }
            },
            &policy,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_monotonic_and_clamped() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_millis(300))
            .with_jitter_ratio(0.0);
        assert_eq!(policy.base_delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay_for(2), Duration::from_millis(300)); // clamped from 400
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_documented_bounds() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_multiplier(1.0)
            .with_jitter_ratio(0.25);
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        for _ in 0..50 {
            let d = policy.delay_for_with_rng(0, &mut rng);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(125));
        }
    }
}
