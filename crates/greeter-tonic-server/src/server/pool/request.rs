use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use greeter_tonic_core::{Error, Result};
use tokio::sync::oneshot;

/// A unit of work executed by a pool worker.
pub type GreetingTask = Box<dyn FnOnce() -> Result<String> + Send + 'static>;

/// A message sent from the worker pool to an individual worker task.
///
/// [`WorkRequest`]s are sent over bounded asynchronous channels and are
/// consumed by the worker's main event loop.
pub enum WorkRequest {
    /// Run `task` and resolve `promise` with its outcome.
    Run {
        task: GreetingTask,
        promise: oneshot::Sender<Result<String>>,
    },

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   completed its shutdown routine.
    Shutdown { response: oneshot::Sender<()> },
}

impl core::fmt::Debug for WorkRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Run { .. } => f.write_str("WorkRequest::Run"),
            Self::Shutdown { .. } => f.write_str("WorkRequest::Shutdown"),
        }
    }
}

/// Creates a task paired with the handle that observes its result.
pub fn task_pair<F>(task: F) -> (WorkRequest, GreetingHandle)
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    let (promise, rx) = oneshot::channel();
    (
        WorkRequest::Run {
            task: Box::new(task),
            promise,
        },
        GreetingHandle { rx },
    )
}

/// The caller's side of a submitted task.
///
/// Resolves exactly once: with the task's value, with the task's error, or
/// with [`Error::UpstreamFailure`] if the worker dropped the promise without
/// resolving it.
#[derive(Debug)]
#[must_use = "a greeting handle does nothing unless awaited"]
pub struct GreetingHandle {
    rx: oneshot::Receiver<Result<String>>,
}

impl Future for GreetingHandle {
    type Output = Result<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::UpstreamFailure {
                reason: "task dropped before completion".to_string(),
            }),
        })
    }
}
