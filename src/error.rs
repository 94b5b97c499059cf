//! Error taxonomy for the commerce backend.
//!
//! Business-rule rejections and infrastructure failures share one enum so the
//! MCP boundary can turn any of them into a flagged tool result with a
//! Spanish, user-facing message.

use std::fmt;

use thiserror::Error;

/// Diagnostic numbers for a quantity that exceeds what can be promised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockShortfall {
    /// `add_to_cart` would push the accumulated quantity past the stock.
    Add {
        product: String,
        in_cart: u32,
        adding: u32,
        total: u32,
        available: i64,
    },
    /// `update_cart` asked for a final quantity above the stock.
    Set {
        product: String,
        requested: u32,
        available: i64,
    },
    /// Checkout found other reservations leaving too little to promise.
    Checkout {
        product: String,
        requested: u32,
        available: i64,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("product {product_id} is not in cart {cart_id}")]
    ItemNotInCart { cart_id: String, product_id: String },

    #[error("cart {0} is empty")]
    EmptyCart(String),

    #[error("insufficient stock: {0}")]
    Stock(StockShortfall),

    #[error("cart {0} is reserved")]
    CartLocked(String),

    #[error("storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: tokio_rusqlite::Error,
    },

    #[error("helpdesk error: {message}")]
    ExternalService {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("helpdesk integration is not configured")]
    HelpdeskDisabled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(message: impl Into<String>, source: Option<reqwest::Error>) -> Self {
        Self::ExternalService {
            message: message.into(),
            source,
        }
    }

    /// Whether this is an expected rejection rather than a system failure.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::ProductNotFound(_)
                | Self::ItemNotInCart { .. }
                | Self::EmptyCart(_)
                | Self::Stock(_)
                | Self::CartLocked(_)
        )
    }

    /// Renders the message shown to the shopper through the chat agent.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => format!("Error: {msg}"),
            Self::ProductNotFound(id) => format!(
                "Error: El producto con ID \"{id}\" no existe. Por favor, usa list_products para obtener el ID real."
            ),
            Self::ItemNotInCart { product_id, .. } => format!(
                "Error: El producto \"{product_id}\" no está en el carrito, no hay nada que eliminar."
            ),
            Self::EmptyCart(_) => "❌ El carrito está vacío o no existe.".to_string(),
            Self::Stock(shortfall) => shortfall.user_message(),
            Self::CartLocked(_) => "🔒 Tu carrito ya está reservado y en manos de un agente humano. \
                 Espera a que te contacten para confirmar el pago antes de hacer cambios."
                .to_string(),
            Self::Storage { .. } => {
                "Error en la operación: no pudimos acceder al sistema de pedidos. Intenta nuevamente en unos minutos."
                    .to_string()
            }
            Self::ExternalService { .. } | Self::HelpdeskDisabled => {
                "Error en la derivación: no pudimos contactar al equipo de atención. Intenta nuevamente más tarde."
                    .to_string()
            }
        }
    }
}

impl StockShortfall {
    pub fn user_message(&self) -> String {
        match self {
            Self::Add {
                in_cart,
                adding,
                total,
                available,
                ..
            } => format!(
                "⚠️ Stock insuficiente. Tienes {in_cart} en carrito y quieres sumar {adding} (Total: {total}), pero solo hay {available} disponibles."
            ),
            Self::Set {
                product,
                requested,
                available,
            } => format!(
                "⚠️ Stock insuficiente. Quieres {requested} unidades, pero solo quedan {available} disponibles de {product}."
            ),
            Self::Checkout {
                product,
                requested,
                available,
            } => format!(
                "❌ Stock insuficiente para \"{product}\". Necesitás {requested} unidades pero solo hay {available} disponibles."
            ),
        }
    }
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add {
                product,
                in_cart,
                adding,
                available,
                ..
            } => write!(
                f,
                "{product}: {in_cart} in cart + {adding} requested exceeds {available} available"
            ),
            Self::Set {
                product,
                requested,
                available,
            } => write!(f, "{product}: {requested} requested exceeds {available} available"),
            Self::Checkout {
                product,
                requested,
                available,
            } => write!(
                f,
                "{product}: checkout of {requested} exceeds {available} available to promise"
            ),
        }
    }
}
