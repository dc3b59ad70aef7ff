//! Product registry server.
//!
//! ## Structure
//!
//! - [`config`] - CLI / environment configuration.
//! - [`identity`] - product id generation.
//! - [`store`] - the in-memory, concurrency-safe registry.
//! - [`tls`] - mutual TLS channel policy.
//! - [`service`] - gRPC service entry point (`ProductService`).
//! - [`lifecycle`] - channel setup, binding and serving.
//! - [`telemetry`] - logging, tracing and metrics.

pub mod config;
pub mod identity;
pub mod lifecycle;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod tls;

#[cfg(test)]
mod test_support;
