//! gRPC service implementation for the product registry.
//!
//! This module defines [`ProductService`], the concrete implementation of the
//! [`ProductInfo`] gRPC service defined in `ecommerce.proto`. It is a thin
//! translation layer: each method delegates to the shared [`ProductStore`]
//! and converts store errors into gRPC status codes via
//! `From<prodinfo_core::Error> for Status`.
//!
//! ## Responsibilities
//!
//! - `addProduct`: store the record under a fresh id, return the id.
//! - `getProduct`: look the record up by id, `NOT_FOUND` if unknown.
//!
//! Both methods are synchronous with respect to the store: they never await
//! while touching it, so a client that cancels mid-call cannot interrupt an
//! insert halfway.

use crate::server::{
    identity::{IdGenerator, UuidGenerator},
    store::ProductStore,
    telemetry::{
        increment_lookups, increment_not_found, increment_products_created, increment_rpc_errors,
    },
};
use prodinfo_core::{
    Error,
    proto::{Product, product_info_server::ProductInfo},
    types::ProductId,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// gRPC front end of a [`ProductStore`].
///
/// Cloning is cheap and every clone shares the same store. Each instance
/// created with [`ProductService::new`] owns a brand-new empty store, so
/// independent servers (and tests) never see each other's records.
pub struct ProductService<G = UuidGenerator> {
    store: Arc<ProductStore<G>>,
}

impl<G> Clone for ProductService<G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl ProductService {
    /// Creates a service backed by a fresh, empty store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(ProductStore::new()))
    }
}

impl Default for ProductService {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGenerator> ProductService<G> {
    /// Creates a service over an existing store.
    pub fn with_store(store: Arc<ProductStore<G>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ProductStore<G>> {
        &self.store
    }
}

#[tonic::async_trait]
impl<G: IdGenerator> ProductInfo for ProductService<G> {
    /// Registers a product and returns its server-assigned id.
    ///
    /// Any `id` set on the incoming record is discarded.
    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn add_product(&self, req: Request<Product>) -> Result<Response<ProductId>, Status> {
        match self.store.create(req.into_inner()) {
            Ok(id) => {
                increment_products_created();
                tracing::debug!(%id, "product added");
                Ok(Response::new(id))
            }
            Err(e) => {
                increment_rpc_errors("addProduct");
                tracing::error!("failed to add product: {e}");
                Err(e.into())
            }
        }
    }

    /// Returns the product stored under the requested id.
    #[tracing::instrument(skip_all, fields(id = %req.get_ref()))]
    async fn get_product(&self, req: Request<ProductId>) -> Result<Response<Product>, Status> {
        increment_lookups();
        let id = req.into_inner();
        self.store.get(&id).map(Response::new).map_err(|e| {
            if counts_as_rpc_error(&e) {
                increment_rpc_errors("getProduct");
            } else {
                increment_not_found();
            }
            tracing::debug!("{e}");
            e.into()
        })
    }
}

/// An unknown id is an answer, not a fault; it has its own counter.
fn counts_as_rpc_error(err: &Error) -> bool {
    !matches!(err, Error::NotFound { .. })
}
