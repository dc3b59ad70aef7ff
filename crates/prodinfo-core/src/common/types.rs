//! # Common Product Registry Types
//!
//! Aliases shared by the server and clients so both sides agree on how a
//! product is keyed and what an RPC returns.

use crate::proto::Product;

/// Opaque product identifier assigned by the server (a hyphenated UUID).
///
/// On the wire this travels as `google.protobuf.StringValue`, which the
/// generated code maps to a plain `String`.
pub type ProductId = String;

/// The extra attributes carried by a [`Product`], stored and returned as-is.
pub type Attributes = std::collections::HashMap<String, String>;

/// Convenience constructor for a product as a client would submit it (no
/// `id`; the server assigns one).
pub fn new_product(
    name: impl Into<String>,
    description: impl Into<String>,
    price: f32,
    attributes: Attributes,
) -> Product {
    Product {
        id: String::new(),
        name: name.into(),
        description: description.into(),
        price,
        attributes,
    }
}
