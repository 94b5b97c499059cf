//! Tier pricing.

use crate::catalog::models::{PriceTiers, TIER_100_MIN_QTY, TIER_200_MIN_QTY};

/// Unit price (cents) for a line holding `qty` units.
///
/// The tier is chosen from the line's own quantity; other lines in the cart
/// are never repriced.
pub fn unit_price(tiers: &PriceTiers, qty: u32) -> i64 {
    if qty >= TIER_200_MIN_QTY {
        tiers.tier_200
    } else if qty >= TIER_100_MIN_QTY {
        tiers.tier_100
    } else {
        tiers.base
    }
}

pub fn line_total(unit_price: i64, qty: u32) -> i64 {
    unit_price * i64::from(qty)
}
