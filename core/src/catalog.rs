//! Catalog collaborator contracts.
//!
//! The product and promotion catalogs are owned by other subsystems; the
//! saga consumes them at this boundary only. Both are local, synchronous
//! lookups — the orchestrator's only remote suspension points are the three
//! inventory calls. Prices and discount terms are snapshotted at booking
//! time, never re-read later.

use crate::types::{Product, ProductId, Promotion};

/// Read-only product lookup by id
pub trait ProductCatalog: Send + Sync {
    /// Fetch a product, or `None` if the id is unknown
    fn product_by_id(&self, product_id: ProductId) -> Option<Product>;
}

/// Read-only promotion lookup by code.
///
/// Returns whatever the catalog holds for the code; validity (active flag,
/// window, minimum order) is the pricing engine's judgement, not the
/// catalog's.
pub trait PromotionCatalog: Send + Sync {
    /// Fetch a promotion by its client-facing code, or `None` if unknown
    fn promotion_by_code(&self, code: &str) -> Option<Promotion>;
}
