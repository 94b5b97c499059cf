//! Catalog queries.

use rusqlite::{params, Connection, OptionalExtension as _, Row};

use super::SqliteStore;
use crate::catalog::fuzzy::{contains, escape_like, to_pattern};
use crate::catalog::models::SEARCH_LIMIT;
use crate::catalog::{PriceTiers, Product, ProductFilters};
use crate::error::Result;

pub(super) const PRODUCT_COLUMNS: &str =
    "id, name, description, category, color, size, stock, price_base, price_100, price_200, available";

pub(super) fn map_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        color: row.get(4)?,
        size: row.get(5)?,
        stock: row.get(6)?,
        prices: PriceTiers {
            base: row.get(7)?,
            tier_100: row.get(8)?,
            tier_200: row.get(9)?,
        },
        available: row.get(10)?,
    })
}

pub(super) fn load_product(conn: &Connection, id: &str) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        params![id],
        map_product,
    )
    .optional()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SqliteStore {
    pub async fn find_product(&self, id: &str) -> Result<Option<Product>> {
        let id = id.to_owned();
        self.read("find_product", move |conn| load_product(conn, &id))
            .await
    }

    pub async fn search_products(&self, filters: &ProductFilters) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE available = 1");
        let mut args: Vec<String> = Vec::new();

        if let Some(text) = non_blank(&filters.text) {
            let pattern = contains(&to_pattern(text));
            tracing::debug!(text, %pattern, "fuzzy text filter");
            args.push(pattern);
            let n = args.len();
            sql.push_str(&format!(
                " AND (name_key LIKE ?{n} ESCAPE '\\' OR description_key LIKE ?{n} ESCAPE '\\')"
            ));
        }
        for (column, value) in [("category_key", &filters.category), ("color_key", &filters.color)] {
            if let Some(value) = non_blank(value) {
                args.push(contains(&to_pattern(value)));
                sql.push_str(&format!(" AND {column} LIKE ?{} ESCAPE '\\'", args.len()));
            }
        }
        if let Some(size) = non_blank(&filters.size) {
            let size = size.to_uppercase();
            args.push(contains(&escape_like(&size)));
            args.push(size);
            let n = args.len();
            sql.push_str(&format!(
                " AND (size_key = ?{n} OR size_key LIKE ?{} ESCAPE '\\')",
                n - 1
            ));
        }
        sql.push_str(&format!(" ORDER BY name, id LIMIT {SEARCH_LIMIT}"));

        self.read("search_products", move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), map_product)?;
            let products = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(products)
        })
        .await
    }

    /// Inserts or replaces catalog rows, e.g. when seeding at startup.
    pub async fn upsert_products(&self, products: Vec<Product>) -> Result<usize> {
        self.transact("upsert_products", move |tx| {
            for product in &products {
                tx.execute(
                    "INSERT INTO products (
                       id, name, description, category, color, size,
                       stock, price_base, price_100, price_200, available,
                       name_key, description_key, category_key, color_key, size_key
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       description = excluded.description,
                       category = excluded.category,
                       color = excluded.color,
                       size = excluded.size,
                       stock = excluded.stock,
                       price_base = excluded.price_base,
                       price_100 = excluded.price_100,
                       price_200 = excluded.price_200,
                       available = excluded.available,
                       name_key = excluded.name_key,
                       description_key = excluded.description_key,
                       category_key = excluded.category_key,
                       color_key = excluded.color_key,
                       size_key = excluded.size_key",
                    params![
                        product.id,
                        product.name,
                        product.description,
                        product.category,
                        product.color,
                        product.size,
                        product.stock,
                        product.prices.base,
                        product.prices.tier_100,
                        product.prices.tier_200,
                        product.available,
                        product.name.to_lowercase(),
                        product.description.to_lowercase(),
                        product.category.to_lowercase(),
                        product.color.to_lowercase(),
                        product.size.to_uppercase(),
                    ],
                )?;
            }
            Ok(Ok(products.len()))
        })
        .await
    }
}
