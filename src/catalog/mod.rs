//! Product Catalog Accessor
//!
//! Read-only lookups used by the cart engine and the `list_products` tool.

pub mod fuzzy;
pub mod models;

pub use models::{PriceTiers, Product, ProductFilters};

use crate::error::Result;
use crate::store::SqliteStore;

/// Read-only view over the `products` table.
#[derive(Clone)]
pub struct Catalog {
    store: SqliteStore,
}

impl Catalog {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Exact lookup by product id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Product>> {
        self.store.find_product(id).await
    }

    /// Fuzzy search over available products, bounded to
    /// [`models::SEARCH_LIMIT`] rows. An empty result is not an error.
    pub async fn search(&self, filters: &ProductFilters) -> Result<Vec<Product>> {
        let products = self.store.search_products(filters).await?;
        tracing::info!(found = products.len(), ?filters, "catalog search");
        Ok(products)
    }
}
