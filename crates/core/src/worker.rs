//! Bounded-concurrency worker pool for fan-out work.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Semaphore-bounded pool of spawned jobs.
///
/// Jobs submitted beyond the limit queue on the semaphore; the permit is
/// released on every exit path when the task's guard drops.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            tasks: Vec::new(),
        }
    }

    /// Spawn a job; it runs once a permit is available.
    pub fn submit<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        self.tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            job.await;
        }));
    }

    /// Wait for every submitted job to finish.
    pub async fn wait(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
