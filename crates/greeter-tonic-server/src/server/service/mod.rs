//! gRPC service implementation and call admission.
//!
//! - [`handler`] - gRPC service entry point (`GreeterService`).
//! - [`tracker`] - In-flight stream accounting used for graceful shutdown.

pub mod handler;
pub mod tracker;

use greeter_tonic_core::proto::greeter_server::GreeterServer;
use handler::GreeterService;
use tonic::codec::CompressionEncoding;

/// Wraps `service` in its generated gRPC server, accepting and offering
/// zstd, gzip and deflate compression.
pub fn build_greeter_service(service: GreeterService) -> GreeterServer<GreeterService> {
    GreeterServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}
