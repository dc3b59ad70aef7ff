//! In-memory product registry.
//!
//! [`ProductStore`] maps product ids to records. Entries are only ever added;
//! there is no update or delete. The map sits behind a `parking_lot::RwLock`:
//! lookups share the read lock and run concurrently, inserts take the write
//! lock for the duration of a single `HashMap` insert. No lock is held across
//! an `.await`, so a cancelled request can never leave a half-applied insert.

use crate::server::identity::{IdGenerator, UuidGenerator};
use parking_lot::RwLock;
use prodinfo_core::{Error, Result, proto::Product, types::ProductId};
use std::collections::{HashMap, hash_map::Entry};

/// Concurrency-safe registry of product records keyed by server-assigned id.
#[derive(Debug, Default)]
pub struct ProductStore<G = UuidGenerator> {
    ids: G,
    products: RwLock<HashMap<ProductId, Product>>,
}

impl ProductStore {
    /// Creates an empty store that assigns UUID ids.
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }
}

impl<G: IdGenerator> ProductStore<G> {
    /// Creates an empty store that takes ids from `ids`.
    pub fn with_generator(ids: G) -> Self {
        Self {
            ids,
            products: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `product` under a freshly generated id and returns that id.
    ///
    /// Whatever `id` the caller put on the record is overwritten. If no id
    /// can be produced the store is left untouched.
    pub fn create(&self, mut product: Product) -> Result<ProductId> {
        let id = self.ids.next_id()?;
        if id.is_empty() {
            return Err(Error::IdentityGeneration {
                reason: "generator returned an empty id".to_string(),
            });
        }
        product.id.clone_from(&id);

        match self.products.write().entry(id.clone()) {
            Entry::Occupied(_) => Err(Error::IdentityGeneration {
                reason: format!("generated id {id} is already in use"),
            }),
            Entry::Vacant(slot) => {
                slot.insert(product);
                Ok(id)
            }
        }
    }

    /// Returns a copy of the record stored under `id`.
    pub fn get(&self, id: &str) -> Result<Product> {
        self.products
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    /// Returns `true` when nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
