//! Tool Schemas and Typed Requests
//!
//! Tool arguments arrive as loose JSON from the chat agent. They are first
//! deserialised into [`ToolCall`] (one variant per tool, every field
//! optional) and then validated into a strict [`ToolRequest`] before any
//! of it reaches the cart engine.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

use crate::cart::helpers::format_money;
use crate::cart::validate::{
    handoff_reason, positive_quantity, require_cart, resolve_cart, target_quantity, CartId,
    CartRef, ProductId, Quantity,
};
use crate::catalog::{Product, ProductFilters};
use crate::error::{Error, Result};

// =============================================================================
// Tool Names
// =============================================================================

pub const LIST_PRODUCTS: &str = "list_products";
pub const CREATE_CART: &str = "create_cart";
pub const ADD_TO_CART: &str = "add_to_cart";
pub const UPDATE_CART: &str = "update_cart";
pub const VIEW_CART: &str = "view_cart";
pub const CLEAR_CART: &str = "clear_cart";
pub const HANDOVER_TO_HUMAN: &str = "handover_to_human";
pub const HANDOVER_FOR_PURCHASE: &str = "handover_for_purchase";

pub const TOOL_NAMES: [&str; 8] = [
    LIST_PRODUCTS,
    CREATE_CART,
    ADD_TO_CART,
    UPDATE_CART,
    VIEW_CART,
    CLEAR_CART,
    HANDOVER_TO_HUMAN,
    HANDOVER_FOR_PURCHASE,
];

// =============================================================================
// Loose Arguments
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsArgs {
    pub text: Option<String>,
    /// Alias of `text`.
    pub name: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartArgs {
    pub cart_id: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemArgs {
    pub cart_id: Option<String>,
    pub conversation_id: Option<String>,
    pub product_id: Option<String>,
    pub qty: Option<Number>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandoverArgs {
    pub cart_id: Option<String>,
    pub reason: Option<String>,
}

/// A `tools/call` as received, discriminated by tool name.
#[derive(Debug, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ListProducts(ListProductsArgs),
    CreateCart(CartArgs),
    AddToCart(ItemArgs),
    UpdateCart(ItemArgs),
    ViewCart(CartArgs),
    ClearCart(CartArgs),
    HandoverToHuman(HandoverArgs),
    HandoverForPurchase(HandoverArgs),
}

impl ToolCall {
    /// Parses the `params` of a `tools/call` request.
    ///
    /// Missing or `null` arguments are treated as an empty object.
    pub fn from_params(params: &Value) -> Result<Self> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !TOOL_NAMES.contains(&name) {
            return Err(Error::validation(format!("herramienta no encontrada: \"{name}\".")));
        }

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(args @ Value::Object(_)) => args.clone(),
            Some(_) => {
                return Err(Error::validation(format!(
                    "los argumentos de {name} deben ser un objeto."
                )))
            }
        };

        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| Error::validation(format!("argumentos inválidos para {name}: {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListProducts(_) => LIST_PRODUCTS,
            Self::CreateCart(_) => CREATE_CART,
            Self::AddToCart(_) => ADD_TO_CART,
            Self::UpdateCart(_) => UPDATE_CART,
            Self::ViewCart(_) => VIEW_CART,
            Self::ClearCart(_) => CLEAR_CART,
            Self::HandoverToHuman(_) => HANDOVER_TO_HUMAN,
            Self::HandoverForPurchase(_) => HANDOVER_FOR_PURCHASE,
        }
    }
}

// =============================================================================
// Validated Requests
// =============================================================================

/// A tool call whose identifiers and quantities have been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    ListProducts(ProductFilters),
    CreateCart(Option<CartRef>),
    AddToCart {
        cart: CartRef,
        product_id: ProductId,
        qty: Quantity,
    },
    UpdateCart {
        cart: CartRef,
        product_id: ProductId,
        qty: i64,
    },
    ViewCart(CartRef),
    ClearCart(CartRef),
    HandoverToHuman {
        cart_id: CartId,
        reason: String,
    },
    HandoverForPurchase {
        cart_id: CartId,
        reason: String,
    },
}

fn required_product(raw: Option<&str>, missing: &str) -> Result<ProductId> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => ProductId::parse(raw),
        None => Err(Error::validation(missing)),
    }
}

fn handover(args: HandoverArgs) -> Result<(CartId, String)> {
    let cart_id = match args.cart_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => CartId::parse(raw)?,
        None => return Err(Error::validation("se requieren cart_id y reason.")),
    };
    let reason = handoff_reason(args.reason.as_deref())?;
    Ok((cart_id, reason))
}

impl TryFrom<ToolCall> for ToolRequest {
    type Error = Error;

    fn try_from(call: ToolCall) -> Result<Self> {
        Ok(match call {
            ToolCall::ListProducts(args) => Self::ListProducts(ProductFilters {
                text: args.text.or(args.name),
                category: args.category,
                color: args.color,
                size: args.size,
            }),
            ToolCall::CreateCart(args) => Self::CreateCart(resolve_cart(
                args.cart_id.as_deref(),
                args.conversation_id.as_deref(),
            )?),
            ToolCall::AddToCart(args) => {
                let qty = positive_quantity(args.qty.as_ref())?;
                let product_id = required_product(
                    args.product_id.as_deref(),
                    "necesito product_id y qty positivo.",
                )?;
                let cart = require_cart(args.cart_id.as_deref(), args.conversation_id.as_deref())?;
                Self::AddToCart {
                    cart,
                    product_id,
                    qty,
                }
            }
            ToolCall::UpdateCart(args) => {
                let qty = target_quantity(args.qty.as_ref())?;
                let product_id =
                    required_product(args.product_id.as_deref(), "necesito product_id y qty.")?;
                let cart = require_cart(args.cart_id.as_deref(), args.conversation_id.as_deref())?;
                Self::UpdateCart {
                    cart,
                    product_id,
                    qty,
                }
            }
            ToolCall::ViewCart(args) => Self::ViewCart(require_cart(
                args.cart_id.as_deref(),
                args.conversation_id.as_deref(),
            )?),
            ToolCall::ClearCart(args) => Self::ClearCart(require_cart(
                args.cart_id.as_deref(),
                args.conversation_id.as_deref(),
            )?),
            ToolCall::HandoverToHuman(args) => {
                let (cart_id, reason) = handover(args)?;
                Self::HandoverToHuman { cart_id, reason }
            }
            ToolCall::HandoverForPurchase(args) => {
                let (cart_id, reason) = handover(args)?;
                Self::HandoverForPurchase { cart_id, reason }
            }
        })
    }
}

// =============================================================================
// Output
// =============================================================================

/// Product as shown to the chat agent by `list_products`.
#[derive(Debug, Serialize)]
pub struct ProductListing<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub color: &'a str,
    pub size: &'a str,
    pub stock: i64,
    pub price_base: String,
    pub price_100_u: String,
    pub price_200_u: String,
}

impl<'a> From<&'a Product> for ProductListing<'a> {
    fn from(p: &'a Product) -> Self {
        Self {
            id: &p.id,
            name: &p.name,
            description: &p.description,
            category: &p.category,
            color: &p.color,
            size: &p.size,
            stock: p.stock,
            price_base: format_money(p.prices.base),
            price_100_u: format_money(p.prices.tier_100),
            price_200_u: format_money(p.prices.tier_200),
        }
    }
}

// =============================================================================
// Schemas
// =============================================================================

fn cart_properties() -> Value {
    json!({
        "cart_id": { "type": "string", "description": "ID del carrito (alternativa a conversation_id)" },
        "conversation_id": { "type": "string", "description": "ID de la conversación (alternativa a cart_id)" }
    })
}

fn item_schema(qty_description: &str) -> Value {
    let mut properties = cart_properties();
    properties["product_id"] = json!({ "type": "string", "description": "ID real del producto, obtenido de list_products" });
    properties["qty"] = json!({ "type": "integer", "description": qty_description });
    json!({
        "type": "object",
        "properties": properties,
        "required": ["product_id", "qty"]
    })
}

fn handover_schema(reason_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "cart_id": { "type": "string", "description": "ID del carrito" },
            "reason": { "type": "string", "description": reason_description }
        },
        "required": ["cart_id", "reason"]
    })
}

/// The `tools/list` payload.
pub fn tool_definitions() -> Value {
    json!({
        "tools": [
            {
                "name": LIST_PRODUCTS,
                "description": "Busca productos disponibles por texto, categoría, color o talle. Tolera plurales y acentos. Devuelve precios por escala y stock.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "Tipo de prenda o texto libre (Remera, Pantalón, Sudadera...)" },
                        "name": { "type": "string", "description": "Alias de text" },
                        "category": { "type": "string", "description": "Categoría (Deportivo, Casual, Formal)" },
                        "color": { "type": "string", "description": "Color de la prenda" },
                        "size": { "type": "string", "description": "Talle de la prenda" }
                    }
                }
            },
            {
                "name": CREATE_CART,
                "description": "Crea (o recupera) el carrito de la conversación actual.",
                "inputSchema": { "type": "object", "properties": cart_properties() }
            },
            {
                "name": ADD_TO_CART,
                "description": "Suma unidades de un producto a las que ya hay en el carrito. El precio unitario se ajusta a la escala de la cantidad total.",
                "inputSchema": item_schema("Unidades a sumar (entero positivo)")
            },
            {
                "name": UPDATE_CART,
                "description": "Fija la cantidad final de un producto en el carrito. Con qty 0 elimina el producto.",
                "inputSchema": item_schema("Cantidad final (0 para eliminar)")
            },
            {
                "name": VIEW_CART,
                "description": "Muestra el contenido actual del carrito y el total estimado.",
                "inputSchema": { "type": "object", "properties": cart_properties() }
            },
            {
                "name": CLEAR_CART,
                "description": "Vacía el carrito. Usar solo si el usuario pide explícitamente borrar todo.",
                "inputSchema": { "type": "object", "properties": cart_properties() }
            },
            {
                "name": HANDOVER_TO_HUMAN,
                "description": "Deriva la conversación a un agente humano: abre la conversación en la mesa de ayuda y agrega etiquetas.",
                "inputSchema": handover_schema("Motivo de la derivación")
            },
            {
                "name": HANDOVER_FOR_PURCHASE,
                "description": "Confirma la compra: reserva el stock del carrito por 24 horas y deriva a un agente humano para cobrar.",
                "inputSchema": handover_schema("Detalle o comentario del cliente sobre el pago")
            }
        ]
    })
}
