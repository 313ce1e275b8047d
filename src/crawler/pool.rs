//! Fixed-size worker pool with bounded admission
//!
//! A pool of `workers` tasks pulls jobs from a shared channel. Admission is
//! limited to `workers + queue_capacity` jobs in flight; a submission beyond
//! that is rejected immediately with `PoolError::Rejected` instead of waiting.
//! `shutdown` closes the pool and waits for every admitted job to finish.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Errors raised by the worker pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Worker pool is full ({capacity} jobs admitted), job rejected")]
    Rejected { capacity: usize },

    #[error("Worker pool is shut down")]
    Closed,

    #[error("Job panicked: {0}")]
    Panicked(String),
}

type BoxedJob<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

struct Job<T> {
    future: BoxedJob<T>,
    permit: OwnedSemaphorePermit,
}

/// A pool running at most `workers` jobs at a time
pub struct WorkerPool<T> {
    sender: Option<mpsc::Sender<Job<T>>>,
    admission: Arc<Semaphore>,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
    results: mpsc::UnboundedReceiver<Result<T, PoolError>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Starts `workers` worker tasks on the current runtime
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = workers + queue_capacity;

        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let (result_tx, results) = mpsc::unbounded_channel();

        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, receiver.clone(), result_tx.clone())))
            .collect();

        Self {
            sender: Some(sender),
            admission: Arc::new(Semaphore::new(capacity)),
            capacity,
            workers: handles,
            results,
        }
    }

    /// Maximum number of jobs admitted at once (running plus waiting)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admits a job or rejects it when the pool is saturated
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        let permit = self
            .admission
            .clone()
            .try_acquire_owned()
            .map_err(|_| PoolError::Rejected {
                capacity: self.capacity,
            })?;

        sender
            .try_send(Job {
                future: Box::pin(job),
                permit,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => PoolError::Rejected {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => PoolError::Closed,
            })
    }

    /// Stops accepting jobs and waits until every admitted job has finished
    ///
    /// Results are returned in completion order.
    pub async fn shutdown(mut self) -> Vec<Result<T, PoolError>> {
        // Workers exit once the channel is drained
        self.sender.take();

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let mut results = Vec::new();
        while let Some(result) = self.results.recv().await {
            results.push(result);
        }
        results
    }
}

async fn worker_loop<T: Send + 'static>(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job<T>>>>,
    results: mpsc::UnboundedSender<Result<T, PoolError>>,
) {
    loop {
        let next = { jobs.lock().await.recv().await };
        let Some(Job { future, permit }) = next else {
            break;
        };

        // Run the job as its own task so a panic is reported, not fatal to the worker
        let result = tokio::spawn(future)
            .await
            .map_err(|e| PoolError::Panicked(e.to_string()));
        drop(permit);

        if results.send(result).is_err() {
            tracing::debug!("Worker {} result dropped, pool receiver gone", id);
        }
    }

    tracing::debug!("Worker {} stopped", id);
}
