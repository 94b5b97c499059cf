//! Cart Engine
//!
//! Item mutations and reads for a single cart. The persistence layer makes
//! each operation atomic; this layer adds the support notifications that
//! accompany certain writes.

use chrono::Utc;

use super::models::{CartCreated, CartCleared, CartView, ItemAdded, ItemSet, ItemWrite};
use super::validate::{CartId, CartRef, ProductId, Quantity};
use crate::error::Result;
use crate::helpdesk::{normalize_label, HelpdeskClient};
use crate::store::SqliteStore;

/// Label attached to the support conversation when a cart gets its first item.
pub const CART_STARTED_LABEL: &str = "carrito_iniciado";

#[derive(Clone)]
pub struct CartEngine {
    store: SqliteStore,
    helpdesk: Option<HelpdeskClient>,
}

impl CartEngine {
    pub fn new(store: SqliteStore, helpdesk: Option<HelpdeskClient>) -> Self {
        Self { store, helpdesk }
    }

    /// Ensures a cart row exists, generating an id when none is given.
    pub async fn create_cart(&self, cart: Option<CartRef>) -> Result<CartCreated> {
        let cart = cart.unwrap_or_else(|| CartRef::new(CartId::generate()));
        let created = self.store.ensure_cart(&cart, Utc::now()).await?;
        tracing::info!(cart_id = %created.id, "cart ready");
        Ok(CartCreated { cart_id: created.id })
    }

    /// Adds `qty` units of a product on top of what the cart holds.
    pub async fn add_to_cart(
        &self,
        cart: &CartRef,
        product_id: &ProductId,
        qty: Quantity,
    ) -> Result<ItemAdded> {
        let write = self.store.add_item(cart, product_id, qty, Utc::now()).await?;
        tracing::info!(
            cart_id = %write.cart_id,
            product_id = %product_id,
            qty = write.qty,
            total = write.cart_total,
            "item added"
        );

        if write.cart_was_empty {
            self.notify(&write, vec![CART_STARTED_LABEL.to_string()]);
        }
        Ok(ItemAdded(write))
    }

    /// Sets the final quantity of a product. `qty <= 0` removes the item.
    pub async fn set_cart_item(
        &self,
        cart: &CartRef,
        product_id: &ProductId,
        qty: i64,
    ) -> Result<ItemSet> {
        let now = Utc::now();
        let Some(qty) = u32::try_from(qty).ok().and_then(Quantity::new) else {
            let removed = self.store.remove_item(&cart.id, product_id, now).await?;
            tracing::info!(cart_id = %cart.id, product_id = %product_id, "item removed");
            return Ok(ItemSet::Removed(removed));
        };

        let write = self.store.set_item(cart, product_id, qty, now).await?;
        tracing::info!(
            cart_id = %write.cart_id,
            product_id = %product_id,
            qty = write.qty,
            total = write.cart_total,
            "item quantity set"
        );

        if write.first_for_product {
            let label = normalize_label(&format!("{} {}", write.product.name, write.qty));
            self.notify(&write, vec![label]);
        }
        Ok(ItemSet::Updated(write))
    }

    pub async fn clear_cart(&self, cart: &CartRef) -> Result<CartCleared> {
        let removed_items = self.store.clear_cart(cart, Utc::now()).await?;
        tracing::info!(cart_id = %cart.id, removed_items, "cart cleared");
        Ok(CartCleared {
            cart_id: cart.id.to_string(),
            removed_items,
        })
    }

    pub async fn view_cart(&self, cart: &CartRef) -> Result<CartView> {
        self.store.cart_view(&cart.id).await
    }

    /// Best-effort support notification, detached from the caller.
    /// Failures are logged and dropped.
    fn notify(&self, write: &ItemWrite, labels: Vec<String>) {
        let Some(helpdesk) = self.helpdesk.clone() else {
            return;
        };
        let Some(conversation) = write.helpdesk_conversation else {
            tracing::debug!(cart_id = %write.cart_id, "no helpdesk conversation to notify");
            return;
        };
        let cart_id = write.cart_id.clone();
        tokio::spawn(async move {
            if let Err(err) = helpdesk.add_labels(conversation, &labels).await {
                tracing::warn!(
                    cart_id = %cart_id,
                    conversation,
                    error = %err,
                    "support notification failed"
                );
            }
        });
    }
}
