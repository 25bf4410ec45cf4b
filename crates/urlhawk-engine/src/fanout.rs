//! Fan-out/fan-in over keyed work items under a shared deadline.
//!
//! Used at both levels of a scan: the orchestrator fans out over registered
//! probes, and probes fan out over their own sub-checks (paths, record
//! types, ports). Every item runs in its own tokio task behind a panic
//! boundary and writes its result into one mutex-guarded map. The lock is
//! taken only for the insert, never across an await.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::deadline::Deadline;

/// How a single fan-out item ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<V> {
    Completed(V),
    /// The item panicked; carries the panic message.
    Faulted(String),
    /// The item was still outstanding when the hard bound passed.
    TimedOut,
}

impl<V> TaskOutcome<V> {
    pub fn completed(self) -> Option<V> {
        match self {
            Self::Completed(v) => Some(v),
            _ => None,
        }
    }
}

/// A configured fan-out: deadline, optional in-flight cap, optional hard
/// bound on the aggregate wait.
#[derive(Debug, Clone)]
pub struct FanOut {
    deadline: Deadline,
    limit: Option<Arc<Semaphore>>,
    hard_bound: Option<Instant>,
}

impl FanOut {
    pub fn new(deadline: Deadline) -> Self {
        Self {
            deadline,
            limit: None,
            hard_bound: None,
        }
    }

    /// Cap the number of items in flight. 0 leaves it unbounded.
    pub fn with_limit(mut self, max_in_flight: usize) -> Self {
        self.limit = (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight)));
        self
    }

    /// Stop waiting `grace` after the deadline. Items still running are
    /// reported as [`TaskOutcome::TimedOut`] and left to finish detached.
    pub fn with_hard_bound(mut self, grace: Duration) -> Self {
        self.hard_bound = Some(self.deadline.at() + grace);
        self
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Run `work` once per item concurrently and collect results by key.
    ///
    /// Every input key is present in the returned map.
    pub async fn run<K, V, F, Fut>(
        &self,
        items: impl IntoIterator<Item = K>,
        work: F,
    ) -> BTreeMap<K, TaskOutcome<V>>
    where
        K: Ord + Clone + Send + 'static,
        V: Send + 'static,
        F: Fn(K) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let keys: Vec<K> = items.into_iter().collect();
        let results: Arc<Mutex<BTreeMap<K, TaskOutcome<V>>>> =
            Arc::new(Mutex::new(BTreeMap::new()));
        let mut handles = Vec::with_capacity(keys.len());

        for key in &keys {
            let body = match std::panic::catch_unwind(AssertUnwindSafe(|| work(key.clone()))) {
                Ok(body) => body,
                Err(payload) => {
                    record(&results, key.clone(), TaskOutcome::Faulted(panic_message(&*payload)));
                    continue;
                }
            };

            let key = key.clone();
            let results = Arc::clone(&results);
            let limit = self.limit.clone();
            let deadline = self.deadline.clone();

            handles.push(tokio::spawn(async move {
                let outcome = run_guarded(body, limit, &deadline).await;
                record(&results, key, outcome);
            }));
        }

        let outstanding = handles.len();
        let joined = futures::future::join_all(handles);
        let joined = match self.hard_bound {
            Some(at) => tokio::time::timeout_at(at, joined).await.ok(),
            None => Some(joined.await),
        };

        match joined {
            Some(handles) => {
                for res in handles {
                    if let Err(e) = res {
                        tracing::error!(error = %e, "Fan-out task failed to join");
                    }
                }
            }
            None => {
                tracing::warn!(
                    tasks = outstanding,
                    "Hard deadline passed, returning partial results"
                );
            }
        }

        let mut collected =
            std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        for key in keys {
            collected.entry(key).or_insert(TaskOutcome::TimedOut);
        }
        collected
    }
}

/// Run `items` concurrently under `deadline` with no cap and no hard bound.
///
/// Convenience for probe-level sub-checks.
pub async fn run_concurrently<K, V, F, Fut>(
    deadline: &Deadline,
    items: impl IntoIterator<Item = K>,
    work: F,
) -> BTreeMap<K, TaskOutcome<V>>
where
    K: Ord + Clone + Send + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = V> + Send + 'static,
{
    FanOut::new(deadline.clone()).run(items, work).await
}

fn record<K: Ord, V>(results: &Mutex<BTreeMap<K, TaskOutcome<V>>>, key: K, outcome: TaskOutcome<V>) {
    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, outcome);
}

async fn run_guarded<V, Fut>(
    body: Fut,
    limit: Option<Arc<Semaphore>>,
    deadline: &Deadline,
) -> TaskOutcome<V>
where
    Fut: Future<Output = V>,
{
    let _permit = match limit {
        Some(semaphore) => match deadline.race(semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Some(permit),
            Ok(Err(_)) => return TaskOutcome::Faulted("concurrency limiter closed".to_string()),
            Err(_) => return TaskOutcome::TimedOut,
        },
        None => None,
    };

    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(value) => TaskOutcome::Completed(value),
        Err(payload) => TaskOutcome::Faulted(panic_message(&*payload)),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_collects_every_key() {
        let (deadline, _guard) = Deadline::after(Duration::from_secs(5));
        let results = run_concurrently(&deadline, 1..=20u32, |n| async move { n * 2 }).await;

        assert_eq!(results.len(), 20);
        for (k, v) in results {
            assert_eq!(v, TaskOutcome::Completed(k * 2));
        }
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_key() {
        let (deadline, _guard) = Deadline::after(Duration::from_secs(5));
        let results = run_concurrently(&deadline, ["a", "b", "c"], |k| async move {
            if k == "b" {
                panic!("boom in {k}");
            }
            k.len()
        })
        .await;

        assert_eq!(results["a"], TaskOutcome::Completed(1));
        assert_eq!(results["b"], TaskOutcome::Faulted("boom in b".to_string()));
        assert_eq!(results["c"], TaskOutcome::Completed(1));
    }

    #[tokio::test]
    async fn test_synchronous_panic_in_work_is_isolated() {
        let (deadline, _guard) = Deadline::after(Duration::from_secs(5));
        let results = run_concurrently(&deadline, [1u8, 2], |k| {
            assert!(k != 2, "bad item");
            async move { k }
        })
        .await;

        assert_eq!(results[&1], TaskOutcome::Completed(1));
        assert!(matches!(results[&2], TaskOutcome::Faulted(ref m) if m.contains("bad item")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_limit_caps_in_flight_items() {
        let (deadline, _guard) = Deadline::after(Duration::from_secs(5));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let fan_out = FanOut::new(deadline).with_limit(2);
        let results = fan_out
            .run(0..8u32, |n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    n
                }
            })
            .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_hard_bound_marks_stragglers() {
        let (deadline, _guard) = Deadline::after(Duration::from_millis(50));
        let fan_out = FanOut::new(deadline).with_hard_bound(Duration::from_millis(50));

        let start = std::time::Instant::now();
        let results = fan_out
            .run(["fast", "stuck"], |k| async move {
                if k == "stuck" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                k
            })
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(results["fast"], TaskOutcome::Completed("fast"));
        assert_eq!(results["stuck"], TaskOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_queued_items_time_out_waiting_for_a_permit() {
        let (deadline, _guard) = Deadline::after(Duration::from_millis(50));
        let fan_out = FanOut::new(deadline.clone()).with_limit(1);

        let results = fan_out
            .run([1u8, 2], |k| {
                let deadline = deadline.clone();
                async move {
                    // Holds the only permit past the deadline.
                    let _ = deadline.race(std::future::pending::<()>()).await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    k
                }
            })
            .await;

        let timed_out = results
            .values()
            .filter(|o| **o == TaskOutcome::TimedOut)
            .count();
        assert_eq!(timed_out, 1);
    }
}
