/// Builds the gRPC client and server code for `proto/greeter.proto` using
/// `tonic-prost-build`.
///
/// A vendored `protoc` is exported through the `PROTOC` environment variable
/// so the build does not depend on a system-wide protobuf compiler.
///
/// # Output
///
/// - Message types and `greeter_server` / `greeter_client` modules, included
///   through `tonic::include_proto!("greeter")`.
/// - `greeter_descriptor.bin`, the encoded file descriptor set served by
///   gRPC reflection.
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or if code generation fails.
use std::env;
use std::path::PathBuf;
fn main() {
    let protoc_path = protoc_bin_vendored::protoc_bin_path().unwrap();
    // SAFETY: build scripts are single-threaded at this point.
    unsafe {
        env::set_var("PROTOC", protoc_path);
    }

    println!("cargo:rerun-if-changed=proto/greeter.proto");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("greeter_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/greeter.proto"], &["proto"])
        .unwrap();
}
