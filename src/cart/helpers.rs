//! Shopping Cart Formatting Helpers

use super::models::CartLine;
use uuid::Uuid;

/// Creates a fresh cart identifier.
pub fn generate_cart_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Formats an amount in cents, e.g. `123450` → `"$1234.50"`.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Produces a human-readable one-line summary for a list of cart lines.
///
/// Renders as `"2x Remera Negro (M), 1x Falda Azul (S)"`.
pub fn format_item_summary(lines: &[CartLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}x {}", line.qty, line.label()))
        .collect::<Vec<_>>()
        .join(", ")
}
