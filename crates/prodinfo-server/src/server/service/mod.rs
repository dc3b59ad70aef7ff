//! gRPC service implementation.
//!
//! This module contains the client-facing side of the registry: it binds the
//! [`ProductStore`](crate::server::store::ProductStore) operations to the
//! `ecommerce.ProductInfo` methods and turns store errors into gRPC statuses.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`ProductService`).

pub mod handler;
