use super::request::{GreetingTask, WorkRequest};
use greeter_tonic_core::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::mpsc;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// The worker listens on an MPSC channel and processes requests until a
/// shutdown signal is received or every sender is dropped.
///
/// # Request Types
///
/// - [`WorkRequest::Run`] - Runs the task and resolves its promise.
/// - [`WorkRequest::Shutdown`] - Signals the worker to stop and acknowledge
///   shutdown.
pub async fn worker_loop(worker_id: usize, mut rx: mpsc::Receiver<WorkRequest>) {
    tracing::trace!("Worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Run { task, promise } => {
                let outcome = run_task(worker_id, task);
                if promise.send(outcome).is_err() {
                    tracing::debug!("Worker {worker_id}: caller went away before resolution");
                }
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

/// Runs `task`, turning a panic into [`Error::UpstreamFailure`] so the worker
/// survives and the caller still gets exactly one resolution.
fn run_task(worker_id: usize, task: GreetingTask) -> Result<String> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            tracing::error!("Worker {worker_id} task panicked: {reason}");
            Err(Error::UpstreamFailure { reason })
        }
    }
}
