//! Error types for the greeter service.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure of the greeter. It implements `From<Error>` for
//! `tonic::Status` so handlers can surface errors to gRPC clients with `?` and
//! `.into()`.
//!
//! ## Error Cases
//! - `InvalidArgument`: The request was malformed (e.g. `name` missing).
//! - `InvalidState`: A streaming session received an event after it had
//!   already completed or failed.
//! - `UpstreamFailure`: A computation submitted to the worker pool failed or
//!   was dropped before resolving.
//! - `SinkFailure`: The outbound stream rejected an item, usually because the
//!   peer disconnected.
//! - `ChannelError`: An internal channel between tasks was closed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the greeter service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request was malformed or missing a required field.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A session event arrived after the session reached a terminal state.
    #[error("Invalid state: {event} after session {state}")]
    InvalidState {
        event: &'static str,
        state: &'static str,
    },

    /// The asynchronous computation failed before producing a value.
    #[error("Upstream failure: {reason}")]
    UpstreamFailure { reason: String },

    /// The outbound sink rejected an item.
    #[error("Sink failure: {context}")]
    SinkFailure { context: String },

    /// Internal channel send/receive failure (e.g. a worker went away).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Shorthand for the error returned when a request carries no `name`.
    pub fn missing_name() -> Self {
        Self::InvalidArgument {
            reason: "`name` is required".to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::InvalidState { event, state } => {
                Status::failed_precondition(format!("{event} after session {state}"))
            }
            Error::UpstreamFailure { reason } => {
                Status::internal(format!("Upstream failure: {reason}"))
            }
            Error::SinkFailure { context } => Status::aborted(context),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
