//! Asynchronous worker pool for off-request greeting computation.
//!
//! This module defines the [`WorkerPool`] struct, which manages a set of
//! asynchronous workers responsible for processing [`WorkRequest`]s. It
//! distributes work using round-robin scheduling and supports coordinated
//! shutdown via a shared [`CancellationToken`].
//!
//! Each worker listens on its own bounded [`mpsc::Receiver`] and executes tasks
//! independently. This model allows parallelism without contention or
//! locking.

use super::{
    request::{GreetingHandle, WorkRequest, task_pair},
    worker::worker_loop,
};
use core::time::Duration;
use greeter_tonic_core::{Error, Result};
use portable_atomic::{AtomicUsize, Ordering};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Time each worker gets to acknowledge a shutdown request.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// A cooperative pool of asynchronous workers that process [`WorkRequest`]s.
///
/// Workers receive requests over bounded MPSC channels. Work is distributed in
/// round-robin fashion and the pool supports graceful, cancellable shutdown.
pub struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    /// Spawns `num_workers` worker tasks on the current Tokio runtime.
    ///
    /// Every call to [`submit`](Self::submit) awaits the caller's result, so a
    /// queue depth of one per worker is enough to keep them busy.
    pub fn spawn(num_workers: usize, shutdown_token: CancellationToken) -> Self {
        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(1);
            workers.push(tx);
            tokio::spawn(worker_loop(worker_id, rx));
        }
        Self::new(workers, shutdown_token)
    }

    /// Constructs a new [`WorkerPool`] from initialized worker channels and a
    /// shared cancellation token.
    pub const fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns the index of the next worker to receive work (round-robin).
    ///
    /// Uses a relaxed atomic increment to minimize contention.
    pub fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Submits `task` to the next worker and returns the handle that
    /// resolves with its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool has no workers or is shutting down (`shutdown_token` was
    ///   cancelled).
    /// - The worker's channel is closed.
    pub async fn submit<F>(&self, task: F) -> Result<GreetingHandle>
    where
        F: FnOnce() -> Result<String> + Send + 'static,
    {
        if self.shutdown_token.is_cancelled() || self.workers.is_empty() {
            return Err(Error::ServiceShutdown);
        }

        let (request, handle) = task_pair(task);
        let worker_idx = self.next_worker_index();

        match self.workers[worker_idx].send(request).await {
            Ok(()) => Ok(handle),
            Err(_) => Err(Error::ChannelError {
                context: format!("Worker {worker_idx} channel closed"),
            }),
        }
    }

    /// Shuts down all workers in the pool.
    ///
    /// - Cancels the shared [`CancellationToken`] to prevent new work.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker.
    /// - Waits (up to 3 seconds per worker) for shutdown acknowledgements.
    ///
    /// Tasks already queued ahead of the shutdown request still resolve.
    pub async fn shutdown(&self) {
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();

        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                tracing::error!("Failed to send shutdown to worker {i}: {e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let timeout_futures = shutdown_handles.into_iter().map(|(i, rx)| async move {
            match timeout(WORKER_SHUTDOWN_TIMEOUT, rx).await {
                Ok(Ok(())) => tracing::trace!("Worker {i} shutdown acknowledged"),
                Ok(Err(e)) => tracing::error!("Worker {i} returned error: {e}"),
                Err(_) => tracing::warn!("Worker {i} shutdown timed out"),
            }
        });

        futures::future::join_all(timeout_futures).await;

        tracing::info!("Worker pool shutdown complete");
    }
}
