//! Single-flight execution keyed by resource.
//!
//! The first caller for a key spawns the task; everyone who arrives while it
//! runs awaits the same shared outcome. The task runs on its own tokio task,
//! so callers that stop waiting do not cancel it. Its key is removed from
//! the in-flight map by a drop guard that runs once when the task settles,
//! whether it succeeded, failed or panicked.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;

type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type InFlightMap<T, E> = Arc<Mutex<HashMap<String, SharedOutcome<T, E>>>>;

/// Removes its key from the in-flight map when dropped.
struct InFlightGuard<T, E> {
    in_flight: InFlightMap<T, E>,
    key: String,
}

impl<T, E> Drop for InFlightGuard<T, E> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.remove(&self.key);
    }
}

/// Deduplicates concurrent work for the same key.
pub struct RequestCoalescer<T, E> {
    in_flight: InFlightMap<T, E>,
}

impl<T, E> Clone for RequestCoalescer<T, E> {
    fn clone(&self) -> Self {
        Self { in_flight: Arc::clone(&self.in_flight) }
    }
}

impl<T, E> Default for RequestCoalescer<T, E> {
    fn default() -> Self {
        Self { in_flight: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<T, E> RequestCoalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` for `key`, or join the task already running for it.
    ///
    /// `task` is only invoked when no task for `key` is in flight.
    pub async fn run<F, Fut>(&self, key: &str, task: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let outcome = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(key) {
                Some(existing) => {
                    tracing::debug!(key, "joining in-flight task");
                    existing.clone()
                }
                None => {
                    let guard = InFlightGuard { in_flight: Arc::clone(&self.in_flight), key: key.to_string() };
                    let work = task();
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        work.await
                    });
                    let outcome = async move { handle.await.unwrap_or_else(|e| Err(E::from(e))) }
                        .boxed()
                        .shared();
                    in_flight.insert(key.to_string(), outcome.clone());
                    outcome
                }
            }
        };

        outcome.await
    }

    /// Number of keys with a task still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SummaryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Coalescer = RequestCoalescer<String, SummaryError>;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = coalescer.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("https://example.com/", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("summary".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "summary");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_key_released() {
        let coalescer = Coalescer::new();

        let first = coalescer.run("k", || async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err(SummaryError::SummarizationFailed("backend down".into()))
        });
        let second = coalescer.run("k", || async { Ok("never runs".to_string()) });

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Err(SummaryError::SummarizationFailed("backend down".into())));
        assert_eq!(a, b);
        assert!(!coalescer.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_settled_key_runs_again() {
        let coalescer = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            coalescer
                .run("k", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("done".to_string())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer = Coalescer::new();
        let a = coalescer.run("a", || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("a".to_string())
        });
        let b = coalescer.run("b", || async { Ok("b".to_string()) });

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_task() {
        let coalescer = Coalescer::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&finished);
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            coalescer.run("k", move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.fetch_add(1, Ordering::SeqCst);
                Ok("late".to_string())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(coalescer.is_in_flight("k"));

        let joined = coalescer.run("k", || async { Ok("fresh".to_string()) }).await;
        assert_eq!(joined.unwrap(), "late");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_surfaces_error_and_releases_key() {
        let coalescer = Coalescer::new();
        let result = coalescer
            .run("k", || async {
                if true {
                    panic!("task blew up");
                }
                Ok("unreachable".to_string())
            })
            .await;

        assert!(matches!(result, Err(SummaryError::SummarizationFailed(_))));
        assert_eq!(coalescer.in_flight(), 0);
    }
}
