/// Builds the gRPC client and server code for the `ecommerce.proto` definition
/// using `tonic-prost-build`.
///
/// The proto sources are parsed with `protox`, so no system `protoc` is
/// required. `protox` also ships the well-known types, which covers the
/// `google/protobuf/wrappers.proto` import used for `StringValue`.
///
/// # Files and Paths
///
/// - Proto file: `proto/ecommerce.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/ecommerce_descriptor.bin` (served by gRPC
///   reflection)
///
/// # Panics
///
/// This function will `panic!` if parsing or code generation fails.
///
/// # Output
///
/// Generated code will be accessible in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("ecommerce");
/// }
/// ```
use prost::Message;
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("ecommerce_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/ecommerce.proto");

    let fds = protox::compile(["proto/ecommerce.proto"], ["proto"]).unwrap();
    std::fs::write(&descriptor_path, fds.encode_to_vec()).unwrap();

    tonic_prost_build::configure().compile_fds(fds).unwrap();
}
