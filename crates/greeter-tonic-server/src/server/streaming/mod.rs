//! Streaming call machinery.
//!
//! - [`outbound`] - Response channel with a slot held back for the terminal
//!   status.
//! - [`coordinator`] - Emits the replies of a server-streaming call.
//! - [`session`] - Bidirectional session state and the driver that feeds it.

pub mod coordinator;
pub mod outbound;
pub mod session;
