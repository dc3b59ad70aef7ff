//! Product id generation.
//!
//! Ids are random (version 4) RFC-4122 UUIDs rendered in hyphenated form. The
//! random bytes come straight from the operating system's entropy source so a
//! failure to obtain them surfaces as [`Error::IdentityGeneration`] instead of
//! a panic, letting the RPC layer fail just the affected request.

use prodinfo_core::{Error, Result, types::ProductId};
use uuid::Builder;

/// Source of fresh product ids.
///
/// Implementations must never return an empty id and must make collisions
/// negligible. A failing source returns an error rather than a fallback id.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> Result<ProductId>;
}

/// Default [`IdGenerator`] backed by the OS random number generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> Result<ProductId> {
        let mut bytes = [0u8; 16];
        getrandom::fill(&mut bytes).map_err(|e| Error::IdentityGeneration {
            reason: format!("entropy source unavailable: {e}"),
        })?;
        Ok(Builder::from_random_bytes(bytes)
            .into_uuid()
            .hyphenated()
            .to_string())
    }
}
