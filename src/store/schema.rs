//! SQL schema for the commerce store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Money columns are integer cents, timestamps are unix milliseconds.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category    TEXT NOT NULL DEFAULT '',
    color       TEXT NOT NULL DEFAULT '',
    size        TEXT NOT NULL DEFAULT '',
    stock       INTEGER NOT NULL CHECK (stock >= 0),
    price_base  INTEGER NOT NULL,
    price_100   INTEGER NOT NULL,
    price_200   INTEGER NOT NULL,
    available   INTEGER NOT NULL DEFAULT 1,
    -- Search keys: Unicode-folded copies written by upsert_products.
    -- SQLite's LIKE only folds ASCII, so 'Ñ' never matches 'ñ' on the raw columns.
    name_key        TEXT NOT NULL DEFAULT '',
    description_key TEXT NOT NULL DEFAULT '',
    category_key    TEXT NOT NULL DEFAULT '',
    color_key       TEXT NOT NULL DEFAULT '',
    size_key        TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS carts (
    id                      TEXT PRIMARY KEY,
    status                  TEXT NOT NULL DEFAULT 'active'
                            CHECK (status IN ('active', 'reserved')),
    reserved_at             INTEGER,
    total                   INTEGER NOT NULL DEFAULT 0,
    updated_at              INTEGER NOT NULL,
    conversation_ref        TEXT,
    support_conversation_id INTEGER,
    CHECK ((status = 'reserved') = (reserved_at IS NOT NULL))
);

-- Rows with qty <= 0 are deleted, never stored.
CREATE TABLE IF NOT EXISTS cart_items (
    cart_id    TEXT NOT NULL REFERENCES carts(id),
    product_id TEXT NOT NULL REFERENCES products(id),
    qty        INTEGER NOT NULL CHECK (qty > 0),
    price      INTEGER NOT NULL,
    PRIMARY KEY (cart_id, product_id)
);

CREATE INDEX IF NOT EXISTS carts_reservation_idx ON carts(status, reserved_at);
CREATE INDEX IF NOT EXISTS cart_items_product_idx ON cart_items(product_id);

PRAGMA user_version = 1;
";
