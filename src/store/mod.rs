//! SQLite persistence for products, carts and cart items.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every multi-step mutation runs
//! inside one `BEGIN IMMEDIATE` transaction, so the read-check-write
//! sequences of the cart engine and the reservation protocol are atomic.

mod carts;
mod products;
mod reservations;
mod schema;

pub use reservations::{ReclaimedCart, Reservation};

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Error, Result};
use schema::SCHEMA;

/// A commerce store backed by a single SQLite file.
///
/// Cloning is cheap, the inner connection handle is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|source| storage_failure("open", source))?;
        let store = Self { conn };
        store.init_schema(true).await?;
        Ok(store)
    }

    /// Open an in-memory store, useful for testing.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|source| storage_failure("open", source))?;
        let store = Self { conn };
        store.init_schema(false).await?;
        Ok(store)
    }

    async fn init_schema(&self, wal: bool) -> Result<()> {
        self.read("init_schema", move |conn| {
            if wal {
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            }
            conn.execute_batch(SCHEMA)
        })
        .await
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// The transaction commits only when `f` returns `Ok(Ok(_))`. A business
    /// rejection (`Ok(Err(_))`) rolls back and is handed to the caller
    /// unchanged; a database error becomes [`Error::Storage`].
    async fn transact<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<Result<T>> + Send + 'static,
    {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let outcome = f(&tx)?;
                if outcome.is_ok() {
                    tx.commit()?;
                }
                Ok(outcome)
            })
            .await
            .map_err(|source| storage_failure(op, source))?
    }

    /// Runs a read (or single-statement write) outside an explicit transaction.
    async fn read<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(|source| storage_failure(op, source))
    }
}

fn storage_failure(op: &'static str, source: tokio_rusqlite::Error) -> Error {
    tracing::error!(op, error = %source, "storage failure");
    Error::Storage { op, source }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
