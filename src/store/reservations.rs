//! Checkout reservations and their expiry.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::carts::{load_cart, load_lines};
use super::{to_millis, SqliteStore};
use crate::cart::models::{CartLine, CartStatus};
use crate::cart::validate::CartId;
use crate::error::{Error, Result, StockShortfall};

/// A cart whose stock was debited at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub cart_id: String,
    pub lines: Vec<CartLine>,
    pub total: i64,
    pub reserved_at: DateTime<Utc>,
}

/// A cart returned to `active` by the reaper, with the stock it gave back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimedCart {
    pub cart_id: String,
    pub restored: Vec<(String, u32)>,
}

/// Units of `product_id` held by reserved carts other than `cart_id`.
fn reserved_by_others(conn: &Connection, product_id: &str, cart_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(ci.qty), 0)
         FROM cart_items ci
         JOIN carts c ON c.id = ci.cart_id
         WHERE ci.product_id = ?1 AND c.status = 'reserved' AND c.id <> ?2",
        params![product_id, cart_id],
        |r| r.get(0),
    )
}

fn product_stock(conn: &Connection, product_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT stock FROM products WHERE id = ?1",
        params![product_id],
        |r| r.get(0),
    )
}

impl SqliteStore {
    /// Validates every line against available-to-promise stock, then debits
    /// stock for all lines and marks the cart reserved.
    ///
    /// No stock is touched unless every line passes.
    pub async fn reserve_cart(&self, cart_id: &CartId, now: DateTime<Utc>) -> Result<Reservation> {
        let cart_id = cart_id.as_str().to_owned();
        let now_ms = to_millis(now);

        self.transact("reserve_cart", move |tx| {
            let Some(cart) = load_cart(tx, &cart_id)? else {
                return Ok(Err(Error::EmptyCart(cart_id)));
            };
            if cart.status == CartStatus::Reserved {
                return Ok(Err(Error::CartLocked(cart_id)));
            }

            let lines = load_lines(tx, &cart_id)?;
            if lines.is_empty() {
                return Ok(Err(Error::EmptyCart(cart_id)));
            }

            // Conservative: reserved carts were already debited from `stock`.
            for line in &lines {
                let stock = product_stock(tx, &line.product_id)?;
                let available = stock - reserved_by_others(tx, &line.product_id, &cart_id)?;
                if available < i64::from(line.qty) {
                    return Ok(Err(Error::Stock(StockShortfall::Checkout {
                        product: line.label(),
                        requested: line.qty,
                        available,
                    })));
                }
            }

            for line in &lines {
                tx.execute(
                    "UPDATE products SET stock = stock - ?1 WHERE id = ?2",
                    params![line.qty, line.product_id],
                )?;
            }
            tx.execute(
                "UPDATE carts SET status = 'reserved', reserved_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now_ms, cart_id],
            )?;

            Ok(Ok(Reservation {
                cart_id,
                lines,
                total: cart.total,
                reserved_at: now,
            }))
        })
        .await
    }

    /// Returns every cart reserved before `cutoff` to `active`, crediting
    /// its items back to stock.
    ///
    /// Only rows still matching `status = 'reserved' AND reserved_at < cutoff`
    /// are touched, so concurrent sweeps never credit a cart twice.
    pub async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReclaimedCart>> {
        let cutoff_ms = to_millis(cutoff);
        let now_ms = to_millis(now);

        self.transact("reclaim_expired", move |tx| {
            let expired: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM carts WHERE status = 'reserved' AND reserved_at < ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![cutoff_ms], |r| r.get(0))?;
                let ids = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let mut reclaimed = Vec::with_capacity(expired.len());
            for cart_id in expired {
                let items: Vec<(String, u32)> = {
                    let mut stmt =
                        tx.prepare("SELECT product_id, qty FROM cart_items WHERE cart_id = ?1")?;
                    let rows = stmt.query_map(params![cart_id], |r| Ok((r.get(0)?, r.get(1)?)))?;
                    let items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                    items
                };

                for (product_id, qty) in &items {
                    tx.execute(
                        "UPDATE products SET stock = stock + ?1 WHERE id = ?2",
                        params![qty, product_id],
                    )?;
                }
                tx.execute(
                    "UPDATE carts SET status = 'active', reserved_at = NULL, updated_at = ?1
                     WHERE id = ?2 AND status = 'reserved'",
                    params![now_ms, cart_id],
                )?;

                reclaimed.push(ReclaimedCart {
                    cart_id,
                    restored: items,
                });
            }
            Ok(Ok(reclaimed))
        })
        .await
    }
}
