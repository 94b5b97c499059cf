//! Catalog domain models.

use serde::{Deserialize, Serialize};

/// Maximum number of products a single search returns.
pub const SEARCH_LIMIT: usize = 20;

/// Quantity at which the 100-unit wholesale price applies.
pub const TIER_100_MIN_QTY: u32 = 100;
/// Quantity at which the 200-unit wholesale price applies.
pub const TIER_200_MIN_QTY: u32 = 200;

/// Unit prices in cents, keyed by quantity breakpoint.
///
/// `base` is the floor price that applies below the first breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTiers {
    pub base: i64,
    pub tier_100: i64,
    pub tier_200: i64,
}

/// A catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    /// Available-to-promise units.
    pub stock: i64,
    pub prices: PriceTiers,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Product {
    /// Short label used in cart listings and shortfall messages.
    pub fn display_name(&self) -> String {
        if self.color.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.color)
        }
    }
}

/// Optional filters accepted by [`crate::catalog::Catalog::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilters {
    pub text: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}
