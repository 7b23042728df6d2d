//! Shared protocol, policy and error definitions for the greeter service.
//!
//! ## Submodules
//!
//! - [`error`] - Service error type and its mapping to gRPC status codes.
//! - [`types`] - Greeting policy, the shared [`Banner`](types::Banner) and the
//!   reply builder.
//! - [`proto`] - Generated protobuf messages, client and server bindings.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/greeter.proto`.
///
/// ## Service
///
/// `greeter.Greeter` exposes one method per interaction mode:
///
/// - `SayHello` - unary, banner greeting.
/// - `SayHelloAsync` - unary, computed on the server's worker pool.
/// - `SayHelloServerStream` - a configured number of banner greetings.
/// - `SayHelloBiStream` - one reply per inbound request, in order.
///
/// [`FILE_DESCRIPTOR_SET`](proto::FILE_DESCRIPTOR_SET) is the encoded
/// descriptor set registered with gRPC reflection.
pub mod proto {
    tonic::include_proto!("greeter");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("greeter_descriptor");
}
