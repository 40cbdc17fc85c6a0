//! Bounded fan-out executor (C3).
//!
//! Runs N tasks with at most K in flight at any moment ("sliding-window"
//! pool). Each task writes its result directly into its own index of a
//! preallocated vector, so completion order never matters and no task can
//! clobber another's slot. A `tokio::sync::Semaphore` of size K is the only
//! concurrency control — there is no separate pending queue, so no more than
//! K tasks are ever polled concurrently.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// Run `task` over every element of `inputs` with at most `max_in_flight`
/// concurrent invocations. Returns results in input order; a panicking task
/// is caught and does not take down its peers or the executor.
///
/// `max_in_flight` is clamped to at least 1; `inputs` of length 0 returns
/// immediately with an empty vector and no task is ever polled.
pub async fn run_bounded<T, R, F, Fut>(inputs: Vec<T>, max_in_flight: usize, task: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    run_bounded_or(inputs, max_in_flight, task, || {
        panic!("fan-out task panicked and caller supplied no fallback; use run_bounded_or")
    })
    .await
}

/// Like [`run_bounded`], but tolerates a task that panics by substituting
/// `on_panic()` for that slot instead of panicking the whole executor. Use
/// this when a task's own work can legitimately panic and `R` can represent
/// "failed" without a full `Default` impl.
pub async fn run_bounded_or<T, R, F, Fut, P>(
    inputs: Vec<T>,
    max_in_flight: usize,
    task: F,
    mut on_panic: P,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    P: FnMut() -> R,
{
    if inputs.is_empty() {
        return Vec::new();
    }
    let cap = max_in_flight.max(1);
    let semaphore = Arc::new(Semaphore::new(cap));
    let task = Arc::new(task);
    let n = inputs.len();

    let mut in_flight = FuturesUnordered::new();
    let mut results: Vec<Option<R>> = (0..n).map(|_| None).collect();

    for (index, input) in inputs.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let task = task.clone();
        let permit = semaphore.acquire_owned().await.expect("semaphore never closed");
        in_flight.push(tokio::spawn(async move {
            let _permit = permit;
            let result = task(input).await;
            (index, result)
        }));
    }

    while let Some(joined) = in_flight.next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(join_err) => {
                tracing::error!(error = %join_err, "fan-out task panicked");
            }
        }
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(&mut on_panic))
        .collect()
}

/// Run `inputs` in waves of at most `wave_size`, each wave dispatched through
/// [`run_bounded`] with `wave_size` as the concurrency cap, pausing `pause`
/// between consecutive waves (not after the last one). This is the shape
/// batched-scrape needs (§5: "a short fixed pause … reduces burstiness") —
/// distinct from [`run_bounded`]'s sliding window, which has no notion of
/// discrete waves to pause between.
pub async fn run_in_waves<T, R, F, Fut>(
    inputs: Vec<T>,
    wave_size: usize,
    pause: std::time::Duration,
    task: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let cap = wave_size.max(1);
    let waves: Vec<Vec<T>> = {
        let mut waves = Vec::new();
        let mut current = Vec::new();
        for item in inputs {
            current.push(item);
            if current.len() == cap {
                waves.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            waves.push(current);
        }
        waves
    };
    let n_waves = waves.len();
    let mut results = Vec::new();
    for (i, wave) in waves.into_iter().enumerate() {
        let task = task.clone();
        results.extend(run_bounded(wave, cap, move |item| task(item)).await);
        if i + 1 < n_waves && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    results
}
