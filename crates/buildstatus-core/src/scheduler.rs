//! Background execution of status updates.
//!
//! `submit` returns immediately; the update runs later on the tokio runtime,
//! gated by a semaphore shared by every dispatch engine that uses the same
//! scheduler. There is no result channel back to the submitter.
//!
//! Each update runs in its own task under a supervising task, so a panic is
//! contained to that update and the pool keeps serving others.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error};

/// Configuration for the update scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of updates talking to the remote service at once.
    pub max_concurrent: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Shared, bounded pool for fire-and-forget update tasks.
///
/// Cloning is cheap and clones share the same permits.
#[derive(Clone)]
pub struct UpdateScheduler {
    runtime: Handle,
    permits: Arc<Semaphore>,
    in_flight: Arc<watch::Sender<usize>>,
}

/// Decrements the in-flight count when a task ends, panicking or not.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl UpdateScheduler {
    /// Create a scheduler spawning onto `runtime`.
    pub fn new(runtime: Handle, config: SchedulerConfig) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            in_flight: Arc::new(in_flight),
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    pub fn on_current_runtime(
        config: SchedulerConfig,
    ) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, config))
    }

    /// Queue `work` and return without waiting for it.
    pub fn submit<F>(&self, label: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let permits = Arc::clone(&self.permits);
        let runtime = self.runtime.clone();

        self.runtime.spawn(async move {
            let _guard = guard;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(task = label, "Scheduler closed, dropping update");
                    return;
                }
            };

            if let Err(e) = runtime.spawn(work).await {
                if e.is_panic() {
                    error!(task = label, "Status update task panicked");
                } else {
                    debug!(task = label, "Status update task cancelled");
                }
            }
        });
    }

    /// Number of submitted updates that have not finished yet.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until every submitted update has finished.
    ///
    /// Lets short-lived processes flush pending work before exiting; it
    /// says nothing about whether the updates succeeded.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn scheduler(max_concurrent: usize) -> UpdateScheduler {
        UpdateScheduler::on_current_runtime(SchedulerConfig { max_concurrent }).unwrap()
    }

    #[tokio::test]
    async fn test_submit_runs_work() {
        let scheduler = scheduler(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            scheduler.submit("count", async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let scheduler = scheduler(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            scheduler.submit("bounded", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }
        scheduler.wait_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_pool() {
        let scheduler = scheduler(1);
        scheduler.submit("boom", async {
            panic!("remote client exploded");
        });
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        scheduler.submit("after", async move {
            flag.store(1, Ordering::SeqCst);
        });
        scheduler.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_work() {
        let scheduler = scheduler(1);
        scheduler.submit("slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        assert_eq!(scheduler.in_flight(), 1);
        scheduler.wait_idle().await;
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let scheduler = scheduler(1);
        tokio::time::timeout(Duration::from_secs(1), scheduler.wait_idle())
            .await
            .expect("idle scheduler should not block");
    }
}
