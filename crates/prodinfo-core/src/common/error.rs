//! Error types for the product info service.
//!
//! This module defines the central `Error` enum, which covers both the
//! startup-class failures of the server (certificate loading, trust bundle
//! parsing, binding the listener) and the per-request failures of the product
//! registry. It implements `From<Error>` for `tonic::Status` so request errors
//! propagate to gRPC clients with appropriate status codes and messages.
//!
//! ## Error Cases
//! - `CertificateLoad`: The server certificate chain or private key could not
//!   be read or parsed.
//! - `TrustBundle`: The trusted-issuer bundle could not be read or held no
//!   usable certificates.
//! - `Listen`: The listening socket could not be bound.
//! - `Serve`: The accept loop terminated with an error.
//! - `IdentityGeneration`: A fresh product id could not be produced.
//! - `NotFound`: No product is stored under the requested id.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the product info service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The server identity (certificate chain + private key) is unusable.
    #[error("Certificate load error: {reason}")]
    CertificateLoad { reason: String },

    /// The trusted-issuer bundle is unreadable or has no usable certificates.
    #[error("Trust bundle error: {reason}")]
    TrustBundle { reason: String },

    /// Binding the listener failed (e.g. address already in use).
    #[error("Failed to listen on {addr}: {reason}")]
    Listen { addr: String, reason: String },

    /// The serve loop stopped with an unrecoverable error.
    #[error("Serve error: {reason}")]
    Serve { reason: String },

    /// The id source failed; nothing was stored.
    #[error("ID generation error: {reason}")]
    IdentityGeneration { reason: String },

    /// Lookup of an unknown product id.
    #[error("Product does not exist for the ID {id}")]
    NotFound { id: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { .. } => Status::not_found(err.to_string()),
            Error::IdentityGeneration { reason } => {
                Status::internal(format!("ID generation error: {}", reason))
            }
            Error::CertificateLoad { .. } | Error::TrustBundle { .. } => {
                Status::internal(err.to_string())
            }
            Error::Listen { .. } | Error::Serve { .. } => Status::unavailable(err.to_string()),
        }
    }
}
