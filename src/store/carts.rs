//! Cart and cart item mutations.
//!
//! Each public method is a single transaction: the status check, the stock
//! check, the item write and the total recomputation commit together or not
//! at all.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension as _, Row};

use super::products::load_product;
use super::{from_millis, to_millis, SqliteStore};
use crate::cart::models::{Cart, CartLine, CartStatus, CartView, ItemRemoved, ItemWrite};
use crate::cart::pricing::unit_price;
use crate::cart::validate::{CartId, CartRef, ProductId, Quantity};
use crate::error::{Error, Result, StockShortfall};

const CART_COLUMNS: &str =
    "id, status, reserved_at, total, updated_at, conversation_ref, support_conversation_id";

fn map_cart(row: &Row<'_>) -> rusqlite::Result<Cart> {
    let status: String = row.get(1)?;
    let status = CartStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown cart status {status:?}").into(),
        )
    })?;
    let support: Option<i64> = row.get(6)?;
    Ok(Cart {
        id: row.get(0)?,
        status,
        reserved_at: row.get::<_, Option<i64>>(2)?.map(from_millis),
        total: row.get(3)?,
        updated_at: from_millis(row.get(4)?),
        conversation_ref: row.get(5)?,
        support_conversation_id: support.and_then(|id| u64::try_from(id).ok()),
    })
}

pub(super) fn load_cart(conn: &Connection, id: &str) -> rusqlite::Result<Option<Cart>> {
    conn.query_row(
        &format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"),
        params![id],
        map_cart,
    )
    .optional()
}

/// Upserts the cart row and returns it. A conversation reference is only
/// recorded if the cart does not have one yet.
fn ensure_cart(
    conn: &Connection,
    id: &str,
    conversation_ref: Option<&str>,
    now_ms: i64,
) -> rusqlite::Result<Cart> {
    conn.execute(
        "INSERT INTO carts (id, updated_at, conversation_ref) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           conversation_ref = COALESCE(carts.conversation_ref, excluded.conversation_ref)",
        params![id, now_ms, conversation_ref],
    )?;
    conn.query_row(
        &format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"),
        params![id],
        map_cart,
    )
}

fn item_qty(conn: &Connection, cart_id: &str, product_id: &str) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        "SELECT qty FROM cart_items WHERE cart_id = ?1 AND product_id = ?2",
        params![cart_id, product_id],
        |r| r.get(0),
    )
    .optional()
}

fn item_count(conn: &Connection, cart_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM cart_items WHERE cart_id = ?1",
        params![cart_id],
        |r| r.get(0),
    )
}

fn upsert_item(
    conn: &Connection,
    cart_id: &str,
    product_id: &str,
    qty: u32,
    price: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO cart_items (cart_id, product_id, qty, price) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(cart_id, product_id) DO UPDATE SET
           qty = excluded.qty,
           price = excluded.price",
        params![cart_id, product_id, qty, price],
    )?;
    Ok(())
}

/// Recomputes and persists the cached total. Returns the new total.
fn recompute_total(conn: &Connection, cart_id: &str, now_ms: i64) -> rusqlite::Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(qty * price), 0) FROM cart_items WHERE cart_id = ?1",
        params![cart_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "UPDATE carts SET total = ?1, updated_at = ?2 WHERE id = ?3",
        params![total, now_ms, cart_id],
    )?;
    Ok(total)
}

pub(super) fn load_lines(conn: &Connection, cart_id: &str) -> rusqlite::Result<Vec<CartLine>> {
    let mut stmt = conn.prepare(
        "SELECT ci.product_id, p.name, p.color, p.size, ci.qty, ci.price
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = ?1
         ORDER BY p.name, ci.product_id",
    )?;
    let rows = stmt.query_map(params![cart_id], |r| {
        Ok(CartLine {
            product_id: r.get(0)?,
            name: r.get(1)?,
            color: r.get(2)?,
            size: r.get(3)?,
            qty: r.get(4)?,
            price: r.get(5)?,
        })
    })?;
    let lines = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

impl SqliteStore {
    pub async fn get_cart(&self, id: &CartId) -> Result<Option<Cart>> {
        let id = id.as_str().to_owned();
        self.read("get_cart", move |conn| load_cart(conn, &id)).await
    }

    /// Idempotently creates the cart row.
    pub async fn ensure_cart(&self, cart: &CartRef, now: DateTime<Utc>) -> Result<Cart> {
        let id = cart.id.as_str().to_owned();
        let conversation_ref = cart.conversation_ref.clone();
        let now_ms = to_millis(now);
        self.transact("create_cart", move |tx| {
            ensure_cart(tx, &id, conversation_ref.as_deref(), now_ms).map(Ok)
        })
        .await
    }

    /// Adds `qty` units on top of what the cart already holds.
    pub async fn add_item(
        &self,
        cart: &CartRef,
        product_id: &ProductId,
        qty: Quantity,
        now: DateTime<Utc>,
    ) -> Result<ItemWrite> {
        let cart_id = cart.id.as_str().to_owned();
        let conversation_ref = cart.conversation_ref.clone();
        let product_id = product_id.as_str().to_owned();
        let adding = qty.get();
        let now_ms = to_millis(now);

        self.transact("add_to_cart", move |tx| {
            let cart = ensure_cart(tx, &cart_id, conversation_ref.as_deref(), now_ms)?;
            if cart.status == CartStatus::Reserved {
                return Ok(Err(Error::CartLocked(cart_id)));
            }

            let current = item_qty(tx, &cart_id, &product_id)?;
            let Some(product) = load_product(tx, &product_id)? else {
                return Ok(Err(Error::ProductNotFound(product_id)));
            };

            let in_cart = current.unwrap_or(0);
            let total = in_cart.checked_add(adding);
            let Some(total) = total.filter(|t| product.stock >= i64::from(*t)) else {
                return Ok(Err(Error::Stock(StockShortfall::Add {
                    product: product.display_name(),
                    in_cart,
                    adding,
                    total: in_cart.saturating_add(adding),
                    available: product.stock,
                })));
            };

            let cart_was_empty = item_count(tx, &cart_id)? == 0;
            let price = unit_price(&product.prices, total);
            upsert_item(tx, &cart_id, &product_id, total, price)?;
            let cart_total = recompute_total(tx, &cart_id, now_ms)?;

            Ok(Ok(ItemWrite {
                cart_id,
                helpdesk_conversation: cart.helpdesk_conversation(),
                product,
                qty: total,
                unit_price: price,
                cart_total,
                first_for_product: current.is_none(),
                cart_was_empty,
            }))
        })
        .await
    }

    /// Sets the final quantity held for a product.
    ///
    /// Stock is checked against the product's raw stock; holds of other
    /// reserved carts are only considered at checkout.
    pub async fn set_item(
        &self,
        cart: &CartRef,
        product_id: &ProductId,
        qty: Quantity,
        now: DateTime<Utc>,
    ) -> Result<ItemWrite> {
        let cart_id = cart.id.as_str().to_owned();
        let conversation_ref = cart.conversation_ref.clone();
        let product_id = product_id.as_str().to_owned();
        let requested = qty.get();
        let now_ms = to_millis(now);

        self.transact("update_cart", move |tx| {
            let cart = ensure_cart(tx, &cart_id, conversation_ref.as_deref(), now_ms)?;
            if cart.status == CartStatus::Reserved {
                return Ok(Err(Error::CartLocked(cart_id)));
            }

            let Some(product) = load_product(tx, &product_id)? else {
                return Ok(Err(Error::ProductNotFound(product_id)));
            };
            if product.stock < i64::from(requested) {
                return Ok(Err(Error::Stock(StockShortfall::Set {
                    product: product.display_name(),
                    requested,
                    available: product.stock,
                })));
            }

            let current = item_qty(tx, &cart_id, &product_id)?;
            let cart_was_empty = item_count(tx, &cart_id)? == 0;
            let price = unit_price(&product.prices, requested);
            upsert_item(tx, &cart_id, &product_id, requested, price)?;
            let cart_total = recompute_total(tx, &cart_id, now_ms)?;

            Ok(Ok(ItemWrite {
                cart_id,
                helpdesk_conversation: cart.helpdesk_conversation(),
                product,
                qty: requested,
                unit_price: price,
                cart_total,
                first_for_product: current.is_none(),
                cart_was_empty,
            }))
        })
        .await
    }

    /// Deletes one item. Removing an item that is not there is an error.
    pub async fn remove_item(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<ItemRemoved> {
        let cart_id = cart_id.as_str().to_owned();
        let product_id = product_id.as_str().to_owned();
        let now_ms = to_millis(now);

        self.transact("remove_item", move |tx| {
            let cart = load_cart(tx, &cart_id)?;
            if cart.is_some_and(|c| c.status == CartStatus::Reserved) {
                return Ok(Err(Error::CartLocked(cart_id)));
            }

            let deleted = tx.execute(
                "DELETE FROM cart_items WHERE cart_id = ?1 AND product_id = ?2",
                params![cart_id, product_id],
            )?;
            if deleted == 0 {
                return Ok(Err(Error::ItemNotInCart {
                    cart_id,
                    product_id,
                }));
            }

            let cart_total = recompute_total(tx, &cart_id, now_ms)?;
            Ok(Ok(ItemRemoved {
                cart_id,
                product_id,
                cart_total,
            }))
        })
        .await
    }

    /// Deletes every item and zeroes the total. Returns the number of items
    /// removed.
    pub async fn clear_cart(&self, cart: &CartRef, now: DateTime<Utc>) -> Result<usize> {
        let cart_id = cart.id.as_str().to_owned();
        let conversation_ref = cart.conversation_ref.clone();
        let now_ms = to_millis(now);

        self.transact("clear_cart", move |tx| {
            let cart = ensure_cart(tx, &cart_id, conversation_ref.as_deref(), now_ms)?;
            if cart.status == CartStatus::Reserved {
                return Ok(Err(Error::CartLocked(cart_id)));
            }

            let removed = tx.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![cart_id])?;
            tx.execute(
                "UPDATE carts SET total = 0, updated_at = ?1 WHERE id = ?2",
                params![now_ms, cart_id],
            )?;
            Ok(Ok(removed))
        })
        .await
    }

    /// Itemized listing plus the cached total. A missing cart reads as empty.
    pub async fn cart_view(&self, cart_id: &CartId) -> Result<CartView> {
        let cart_id = cart_id.as_str().to_owned();
        self.read("view_cart", move |conn| {
            let cart = load_cart(conn, &cart_id)?;
            let lines = load_lines(conn, &cart_id)?;
            Ok(CartView {
                status: cart.as_ref().map_or(CartStatus::Active, |c| c.status),
                total: cart.as_ref().map_or(0, |c| c.total),
                cart_id,
                lines,
            })
        })
        .await
    }

    /// Binds a helpdesk conversation to the cart, creating the cart row if
    /// needed.
    pub async fn bind_support_conversation(
        &self,
        cart_id: &CartId,
        conversation_id: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let cart_id = cart_id.as_str().to_owned();
        let now_ms = to_millis(now);
        let conversation = i64::try_from(conversation_id)
            .map_err(|_| Error::validation("identificador de conversación fuera de rango."))?;

        self.transact("bind_support_conversation", move |tx| {
            ensure_cart(tx, &cart_id, None, now_ms)?;
            tx.execute(
                "UPDATE carts SET support_conversation_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![conversation, now_ms, cart_id],
            )?;
            Ok(Ok(()))
        })
        .await
    }
}
