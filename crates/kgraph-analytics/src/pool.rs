//! Bounded pool for CPU-bound analytics.
//!
//! Jobs run on tokio's blocking threads, gated by a semaphore so at most
//! `workers` computations run at once. Each call gets one deadline covering
//! both the wait for a permit and the computation itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use kgraph_core::{KgError, KgResult};

/// Shared cancellation signal checked by long-running jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        let workers = workers.max(1);
        Self { permits: Arc::new(Semaphore::new(workers)), workers, timeout }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Workers not currently running a job.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking worker.
    ///
    /// On expiry the cancel flag is raised and `Timeout` returned; the
    /// worker keeps its permit until the job notices and returns, and the
    /// job's result is dropped.
    pub async fn run<T, F>(&self, job: F) -> KgResult<T>
    where
        F: FnOnce(&CancelFlag) -> KgResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;

        let permit = match timeout_at(deadline, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(KgError::AnalyticsUnavailable("worker pool is closed".into())),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Timed out waiting for an analytics worker");
                return Err(KgError::Timeout(self.timeout));
            }
        };

        let cancel = CancelFlag::default();
        let flag = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(&flag)
        });

        match timeout_at(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                Err(KgError::AnalyticsUnavailable(format!("analytics worker failed: {e}")))
            }
            Err(_) => {
                cancel.cancel();
                warn!(timeout = ?self.timeout, "Analytics computation timed out; result discarded");
                Err(KgError::Timeout(self.timeout))
            }
        }
    }

    /// Stop handing out workers. Running jobs finish normally.
    pub fn close(&self) {
        debug!("Closing analytics worker pool");
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_result_is_returned() {
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let value = pool.run(|_| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.idle(), 2);
    }

    #[tokio::test]
    async fn slow_job_times_out_and_is_cancelled() {
        let pool = WorkerPool::new(1, Duration::from_millis(50));
        let err = pool
            .run(|cancel| {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::Timeout(_)));

        // The permit comes back once the job observes the flag.
        for _ in 0..100 {
            if pool.idle() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.idle(), 1);
    }

    #[tokio::test]
    async fn job_errors_pass_through() {
        let pool = WorkerPool::new(1, Duration::from_secs(5));
        let err = pool.run::<(), _>(|_| Err(KgError::validation("bad input"))).await.unwrap_err();
        assert!(matches!(err, KgError::Validation(_)));
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let pool = WorkerPool::new(1, Duration::from_secs(5));
        pool.close();
        let err = pool.run(|_| Ok(())).await.unwrap_err();
        assert!(matches!(err, KgError::AnalyticsUnavailable(_)));
    }

    #[test]
    fn zero_workers_still_gets_one() {
        assert_eq!(WorkerPool::new(0, Duration::from_secs(1)).workers(), 1);
    }
}
