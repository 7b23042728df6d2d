//! Worker pool executing explicit task/promise pairs.
//!
//! - [`manager`] - [`WorkerPool`](manager::WorkerPool): round-robin dispatch
//!   and coordinated shutdown.
//! - [`worker`] - The per-worker event loop.
//! - [`request`] - Messages exchanged with workers and the
//!   [`GreetingHandle`](request::GreetingHandle) returned to callers.

pub mod manager;
pub mod request;
pub mod worker;
