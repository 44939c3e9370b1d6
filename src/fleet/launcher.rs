//! Bounded launch queue.
//!
//! Jobs are spawned immediately but wait for one of `limit` permits before
//! running, so at most `limit` joins are ever in progress. The semaphore
//! hands permits out in arrival order as running jobs finish.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchQueueStats {
    pub limit: usize,
    pub running: usize,
    pub queued: usize,
}

/// Decrements a counter when dropped, so counts stay right even if a job
/// is aborted mid-flight.
struct CountGuard(Arc<AtomicUsize>);

impl CountGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for CountGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct LaunchQueue {
    permits: Arc<Semaphore>,
    limit: usize,
    running: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl LaunchQueue {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
            running: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues `job`. Returns immediately; the job runs once a slot frees up.
    pub fn submit<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let running = self.running.clone();
        let queued = CountGuard::enter(&self.queued);

        tokio::spawn(async move {
            let permit = permits.acquire_owned().await;
            drop(queued);
            // A closed queue drops the job unrun.
            let Ok(_permit) = permit else {
                return;
            };
            let _running = CountGuard::enter(&running);
            job.await;
        })
    }

    /// Rejects queued jobs. Running jobs finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn stats(&self) -> LaunchQueueStats {
        LaunchQueueStats {
            limit: self.limit,
            running: self.running.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
        }
    }
}
