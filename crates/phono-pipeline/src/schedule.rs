//! Bounded fan-out scheduling with deterministic result order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{PipelineError, PipelineResult};

/// Cooperative cancellation flag shared across the pipeline.
///
/// Checked at phase boundaries and before each new unit of concurrent
/// work. Tripping it never interrupts in-flight work; it only stops new
/// submissions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run one async unit of work per item with at most `limit` in flight,
/// returning results in the original item order.
///
/// Each submission is tagged with its index; after fan-in the results
/// are sorted by that tag, so completion order never leaks into output
/// order. When `cancel` trips, no further items are submitted and the
/// in-flight units drain; the returned vector then covers a prefix of
/// the input. Unit outcomes are whatever `work` produces, so a failed
/// unit shows up as its own degraded result rather than aborting
/// siblings; only a panicked task surfaces as an error.
pub async fn run_ordered<I, T, F, Fut>(
    items: Vec<I>,
    limit: usize,
    cancel: &CancelFlag,
    work: F,
) -> PipelineResult<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: std::future::Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks: JoinSet<(usize, T)> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        // Acquiring before spawn is what enforces the bound: this loop
        // blocks here whenever `limit` units are already in flight.
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
        let fut = work(item);
        tasks.spawn(async move {
            let result = fut.await;
            drop(permit);
            (index, result)
        });
    }

    let mut tagged = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
        tagged.push((index, result));
    }
    tagged.sort_by_key(|(index, _)| *index);

    Ok(tagged.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order_under_random_delays() {
        // Pseudo-random per-item delays force out-of-order completion.
        let items: Vec<u64> = (0..20).collect();
        for limit in [1, 3, 20] {
            let cancel = CancelFlag::new();
            let results = run_ordered(items.clone(), limit, &cancel, |n| async move {
                tokio::time::sleep(Duration::from_millis((n * 7919) % 23)).await;
                n * 2
            })
            .await
            .unwrap();
            let expected: Vec<u64> = items.iter().map(|n| n * 2).collect();
            assert_eq!(results, expected, "limit {limit}");
        }
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancelFlag::new();

        let in_flight_c = Arc::clone(&in_flight);
        let peak_c = Arc::clone(&peak);
        run_ordered((0..32).collect(), 4, &cancel, move |_n: u32| {
            let in_flight = Arc::clone(&in_flight_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_unit_failures_do_not_abort_siblings() {
        let cancel = CancelFlag::new();
        let results = run_ordered(vec![1u32, 2, 3], 2, &cancel, |n| async move {
            if n == 2 {
                Err("boom")
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(results, vec![Ok(1), Err("boom"), Ok(3)]);
    }

    #[tokio::test]
    async fn test_cancel_stops_new_submissions() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let results = run_ordered(vec![1u32, 2, 3], 2, &cancel, |n| async move { n })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let cancel = CancelFlag::new();
        let results: Vec<u32> = run_ordered(Vec::<u32>::new(), 3, &cancel, |n| async move { n })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
