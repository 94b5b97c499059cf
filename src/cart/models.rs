//! Shopping Cart Domain Models
//!
//! Persistent cart state plus the outcome types returned by the cart
//! engine. Each outcome renders the Spanish text the chat agent relays to
//! the shopper through its `Display` implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::helpers::format_money;
use super::pricing::line_total;
use crate::catalog::Product;

// =============================================================================
// Persistent State
// =============================================================================

/// Lifecycle of a cart: `Active → Reserved` on checkout, back on expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Reserved,
}

impl CartStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Reserved => "reserved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }
}

/// A row of the `carts` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: String,
    pub status: CartStatus,
    pub reserved_at: Option<DateTime<Utc>>,
    /// Cached Σ qty×price over the cart's items, in cents.
    pub total: i64,
    pub updated_at: DateTime<Utc>,
    /// Conversation identifier supplied by the caller when the cart was created.
    pub conversation_ref: Option<String>,
    /// Helpdesk conversation bound to this cart after a handoff.
    pub support_conversation_id: Option<u64>,
}

impl Cart {
    /// The helpdesk conversation this cart can be reached at without
    /// creating a new one.
    pub fn helpdesk_conversation(&self) -> Option<u64> {
        self.support_conversation_id.or_else(|| {
            self.conversation_ref
                .as_deref()
                .and_then(|raw| raw.parse::<u64>().ok())
        })
    }
}

/// A cart item joined with the product fields needed to describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub qty: u32,
    /// Unit price snapshotted at the last write, in cents.
    pub price: i64,
}

impl CartLine {
    pub fn subtotal(&self) -> i64 {
        line_total(self.price, self.qty)
    }

    /// `"Remera Negro (M)"`, omitting empty attributes.
    pub fn label(&self) -> String {
        let mut label = self.name.clone();
        if !self.color.is_empty() {
            label.push(' ');
            label.push_str(&self.color);
        }
        if !self.size.is_empty() {
            label.push_str(&format!(" ({})", self.size));
        }
        label
    }
}

// =============================================================================
// Operation Outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartCreated {
    pub cart_id: String,
}

impl fmt::Display for CartCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Carrito listo. ID: {}", self.cart_id)
    }
}

/// Result of a successful add or set that left the item in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWrite {
    pub cart_id: String,
    pub product: Product,
    /// Quantity now held for this product.
    pub qty: u32,
    pub unit_price: i64,
    pub cart_total: i64,
    /// Whether this write put the product into the cart for the first time.
    pub first_for_product: bool,
    /// Whether the cart had no items before this write.
    pub cart_was_empty: bool,
    pub helpdesk_conversation: Option<u64>,
}

/// Outcome of `add_to_cart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAdded(pub ItemWrite);

impl fmt::Display for ItemAdded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write = &self.0;
        write!(
            f,
            "✅ Producto añadido. {}: ahora tienes {} unidades a {} c/u. Total del carrito: {}.",
            write.product.display_name(),
            write.qty,
            format_money(write.unit_price),
            format_money(write.cart_total)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRemoved {
    pub cart_id: String,
    pub product_id: String,
    pub cart_total: i64,
}

/// Outcome of `update_cart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSet {
    Updated(ItemWrite),
    Removed(ItemRemoved),
}

impl ItemSet {
    pub fn cart_total(&self) -> i64 {
        match self {
            Self::Updated(write) => write.cart_total,
            Self::Removed(removed) => removed.cart_total,
        }
    }
}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated(write) => write!(
                f,
                "✅ Carrito actualizado. {}: {} unidades a {} c/u. Total del carrito: {}.",
                write.product.display_name(),
                write.qty,
                format_money(write.unit_price),
                format_money(write.cart_total)
            ),
            Self::Removed(removed) => write!(
                f,
                "✅ Producto eliminado del carrito. Total del carrito: {}.",
                format_money(removed.cart_total)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartCleared {
    pub cart_id: String,
    pub removed_items: usize,
}

impl fmt::Display for CartCleared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("✅ Carrito vaciado correctamente.")
    }
}

/// Read-only itemized listing of a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub cart_id: String,
    pub status: CartStatus,
    pub lines: Vec<CartLine>,
    pub total: i64,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for CartView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("El carrito está vacío.");
        }

        writeln!(f, "🛒 *CARRITO ACTUAL*:")?;
        writeln!(f)?;
        for line in &self.lines {
            writeln!(
                f,
                "- {}x {} a {} = {}",
                line.qty,
                line.label(),
                format_money(line.price),
                format_money(line.subtotal())
            )?;
        }
        writeln!(f)?;
        write!(f, "💰 *TOTAL ESTIMADO: {}*", format_money(self.total))?;
        if self.status == CartStatus::Reserved {
            write!(
                f,
                "\n\n🔒 Este carrito está reservado mientras un agente confirma el pago."
            )?;
        }
        Ok(())
    }
}
