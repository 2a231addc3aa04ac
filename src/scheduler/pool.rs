//! Bounded pool for rotation cycles
//!
//! Cycles run off the scheduling loop so a slow probe never delays the
//! next scheduling decision. At most `capacity` cycles run at once; the
//! rest queue for a permit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub struct CyclePool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    /// Drops queued work
    shutdown: CancellationToken,
    /// Aborts running work once draining times out
    abort: CancellationToken,
}

impl CyclePool {
    pub fn new(capacity: usize, shutdown: CancellationToken) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            tracker: TaskTracker::new(),
            shutdown,
            abort: CancellationToken::new(),
        }
    }

    /// Queue a job; it starts once a permit is free
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            debug!("Pool closed; dropping job");
            return;
        }

        let permits = Arc::clone(&self.permits);
        let shutdown = self.shutdown.clone();
        let abort = self.abort.clone();

        self.tracker.spawn(async move {
            let _permit = tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Queued job cancelled by shutdown");
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            tokio::select! {
                () = abort.cancelled() => warn!("Running job aborted"),
                () = job => {},
            }
        });
    }

    /// Jobs queued or running
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Stop accepting work and wait for running jobs
    ///
    /// Returns `false` if jobs had to be aborted after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            return true;
        }

        warn!("{} job(s) still running after {:?}; aborting", self.tracker.len(), timeout);
        self.abort.cancel();
        self.tracker.wait().await;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bounds_concurrency() {
        let pool = CyclePool::new(2, CancellationToken::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(pool.drain(Duration::from_secs(60)).await);
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_queued_jobs() {
        let shutdown = CancellationToken::new();
        let pool = CyclePool::new(1, shutdown.clone());
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        // Let the first job take the permit
        tokio::task::yield_now().await;
        shutdown.cancel();

        assert!(pool.drain(Duration::from_secs(10)).await);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_stuck_jobs() {
        let pool = CyclePool::new(2, CancellationToken::new());
        pool.submit(std::future::pending::<()>());

        assert!(!pool.drain(Duration::from_secs(1)).await);
        assert!(pool.is_empty());

        // Closed pools reject new work
        pool.submit(async {});
        assert!(pool.is_empty());
    }
}
