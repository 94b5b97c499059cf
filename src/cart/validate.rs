//! Boundary validation for identifiers and quantities.
//!
//! Every identifier that reaches a storage predicate goes through one of the
//! constructors here first; the types cannot be built any other way.

use serde_json::Number;
use std::fmt;

use crate::error::{Error, Result};

/// Longest identifier accepted from the chat agent.
pub const MAX_ID_LEN: usize = 255;
/// Longest handoff reason accepted from the chat agent.
pub const MAX_REASON_LEN: usize = 500;

/// Only ASCII alphanumerics, `-` and `_`.
pub fn is_safe_identifier(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn checked_identifier(raw: &str, field: &str) -> Result<String> {
    let trimmed = raw.trim();
    if is_safe_identifier(trimmed) {
        Ok(trimmed.to_owned())
    } else {
        Err(Error::validation(format!(
            "{field} inválido, solo se permiten letras, números, guiones y guiones bajos."
        )))
    }
}

/// A validated cart identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartId(String);

impl CartId {
    pub fn parse(raw: &str) -> Result<Self> {
        checked_identifier(raw, "cart_id").map(Self)
    }

    /// A fresh identifier for a cart the caller did not name.
    pub fn generate() -> Self {
        Self(super::helpers::generate_cart_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductId(String);

impl ProductId {
    pub fn parse(raw: &str) -> Result<Self> {
        checked_identifier(raw, "product_id").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A strictly positive item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// The cart a tool call addresses.
///
/// `conversation_ref` is the caller's conversation identifier, recorded on
/// the cart when it is first created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRef {
    pub id: CartId,
    pub conversation_ref: Option<String>,
}

impl CartRef {
    pub fn new(id: CartId) -> Self {
        Self {
            id,
            conversation_ref: None,
        }
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Resolves a cart from an explicit id or a conversation alias.
///
/// Both identifiers are validated when present; `cart_id` wins when both
/// are given. Returns `None` when neither is present.
pub fn resolve_cart(cart_id: Option<&str>, conversation_id: Option<&str>) -> Result<Option<CartRef>> {
    let conversation_ref = present(conversation_id)
        .map(|raw| checked_identifier(raw, "conversation_id"))
        .transpose()?;
    let explicit = present(cart_id).map(CartId::parse).transpose()?;

    Ok(match (explicit, conversation_ref) {
        (Some(id), conversation_ref) => Some(CartRef {
            id,
            conversation_ref,
        }),
        (None, Some(conversation)) => Some(CartRef {
            id: CartId(conversation.clone()),
            conversation_ref: Some(conversation),
        }),
        (None, None) => None,
    })
}

/// Like [`resolve_cart`] but a missing identifier is a validation error.
pub fn require_cart(cart_id: Option<&str>, conversation_id: Option<&str>) -> Result<CartRef> {
    resolve_cart(cart_id, conversation_id)?
        .ok_or_else(|| Error::validation("necesito cart_id o conversation_id."))
}

fn integral(qty: &Number) -> Result<i64> {
    if let Some(value) = qty.as_i64() {
        return Ok(value);
    }
    match qty.as_f64() {
        Some(value) if value.is_finite() && value.fract() == 0.0 && value.abs() <= u32::MAX as f64 => {
            Ok(value as i64)
        }
        Some(value) if value.is_finite() && value.fract() != 0.0 => Err(Error::validation(
            "la cantidad debe ser un número entero de unidades.",
        )),
        _ => Err(Error::validation("la cantidad es demasiado grande.")),
    }
}

/// Parses the `qty` of `add_to_cart`: a positive integer.
pub fn positive_quantity(qty: Option<&Number>) -> Result<Quantity> {
    let qty = qty.ok_or_else(|| Error::validation("necesito product_id y qty positivo."))?;
    let value = integral(qty)?;
    if value <= 0 {
        return Err(Error::validation("necesito product_id y qty positivo."));
    }
    u32::try_from(value)
        .ok()
        .and_then(Quantity::new)
        .ok_or_else(|| Error::validation("la cantidad es demasiado grande."))
}

/// Parses the `qty` of `update_cart`: the final quantity, `<= 0` removes.
pub fn target_quantity(qty: Option<&Number>) -> Result<i64> {
    let qty = qty.ok_or_else(|| Error::validation("necesito product_id y qty."))?;
    let value = integral(qty)?;
    if value > i64::from(u32::MAX) {
        return Err(Error::validation("la cantidad es demasiado grande."));
    }
    Ok(value)
}

/// Trims a handoff reason and rejects markup.
pub fn handoff_reason(reason: Option<&str>) -> Result<String> {
    let reason = present(reason).ok_or_else(|| Error::validation("se requieren cart_id y reason."))?;
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(Error::validation("el motivo es demasiado largo."));
    }
    if reason.contains('<') || reason.contains('>') {
        return Err(Error::validation("el motivo contiene caracteres no permitidos."));
    }
    Ok(reason.to_owned())
}
