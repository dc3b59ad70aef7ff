pub mod error;
pub mod types;
pub use error::*;

/// Generated protobuf messages and gRPC stubs for `ecommerce.proto`.
pub mod proto {
    tonic::include_proto!("ecommerce");

    /// Encoded `FileDescriptorSet` for the `ecommerce` package, registered
    /// with the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("ecommerce_descriptor");
}
