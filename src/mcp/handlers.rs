//! MCP (Model Context Protocol) route handlers
//!
//! JSON-RPC over HTTP, with an optional SSE stream per client. A POST that
//! names a live session is answered on that session's stream; any other
//! POST is answered directly.

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};

use super::helpers::*;
use super::models::*;
use super::tools::{tool_definitions, ProductListing, ToolCall, ToolRequest};
use crate::error::Result;
use crate::state::{AppState, SharedState};

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Creates routes for MCP-related operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(handle_banner).post(handle_mcp))
        .route("/mcp", post(handle_mcp).get(handle_mcp_sse))
        .route("/mcp/", post(handle_mcp).get(handle_mcp_sse))
        .route("/events", post(handle_mcp).get(handle_mcp_sse))
}

async fn handle_banner() -> &'static str {
    concat!("Conversational Commerce MCP v", env!("CARGO_PKG_VERSION"))
}

/// Endpoint: GET /mcp
/// Opens an SSE session. The first event tells the client where to POST.
async fn handle_mcp_sse(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.sessions.open();
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGE_PATH}?sessionId={}", session.id()));

    let messages = stream::unfold(session, |mut session| async move {
        let message = session.recv().await?;
        let event = Event::default().event("message").data(message.to_string());
        Some((Ok(event), session))
    });

    Sse::new(stream::iter([Ok(endpoint)]).chain(messages))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("heartbeat"))
}

/// Endpoint: POST /mcp
/// Handles the Model Context Protocol communication for POST requests.
async fn handle_mcp(
    State(state): State<SharedState>,
    Query(query): Query<SessionQuery>,
    body: std::result::Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(r)) => r,
        Err(e) => {
            tracing::warn!(error = %e.body_text(), "JSON-RPC parse error");
            return (
                StatusCode::BAD_REQUEST,
                Json(rpc_error(Value::Null, PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };

    let id = req.id.clone().unwrap_or(Value::Null);
    tracing::debug!(method = %req.method, ?id, "MCP call");

    // Handshake and discovery are always answered inline.
    let inline = matches!(req.method.as_str(), "initialize" | "tools/list");
    let session = query
        .session_id
        .as_deref()
        .filter(|_| !inline)
        .and_then(|sid| state.sessions.sender(sid));

    let Some(sender) = session else {
        return Json(dispatch(&state, req).await).into_response();
    };

    let response = dispatch(&state, req).await;
    if sender.send(response).await.is_err() {
        tracing::warn!("SSE session closed before its response was delivered");
    }
    Json(rpc_success(id, json!("accepted"))).into_response()
}

/// Routes one JSON-RPC request to its method handler.
pub async fn dispatch(state: &AppState, req: JsonRpcRequest) -> Value {
    let id = req.id.unwrap_or(Value::Null);
    let params = req.params.unwrap_or(Value::Null);

    match req.method.as_str() {
        "initialize" => rpc_success(id, handle_initialize()),
        "notifications/initialized" => rpc_success(id, json!({})),
        "tools/list" => rpc_success(id, tool_definitions()),
        "tools/call" => rpc_success(id, handle_tool_call(state, &params).await),
        "ping" => rpc_success(id, json!({})),
        method => {
            tracing::warn!(method, "unknown JSON-RPC method");
            rpc_error(id, METHOD_NOT_FOUND, "Method not found")
        }
    }
}

// =============================================================================
// MCP Method Handlers
// =============================================================================

/// Handles `initialize` request (Handshake).
fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION
        }
    })
}

/// Handles `tools/call`. Every outcome, failures included, is a tool result.
pub async fn handle_tool_call(state: &AppState, params: &Value) -> Value {
    let tool = params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let outcome = match ToolCall::from_params(params).and_then(ToolRequest::try_from) {
        Ok(request) => run_tool(state, request).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(text) => tool_text(text),
        Err(err) => {
            if err.is_business() {
                tracing::warn!(tool = %tool, error = %err, "tool call rejected");
            } else {
                tracing::error!(tool = %tool, error = %err, "tool call failed");
            }
            tool_error(err.user_message())
        }
    }
}

async fn run_tool(state: &AppState, request: ToolRequest) -> Result<String> {
    Ok(match request {
        ToolRequest::ListProducts(filters) => {
            let products = state.catalog.search(&filters).await?;
            if products.is_empty() {
                "No se encontraron productos con esos filtros.".to_string()
            } else {
                let listings: Vec<ProductListing> = products.iter().map(Into::into).collect();
                serde_json::to_string_pretty(&listings).unwrap_or_default()
            }
        }
        ToolRequest::CreateCart(cart) => state.carts.create_cart(cart).await?.to_string(),
        ToolRequest::AddToCart {
            cart,
            product_id,
            qty,
        } => state
            .carts
            .add_to_cart(&cart, &product_id, qty)
            .await?
            .to_string(),
        ToolRequest::UpdateCart {
            cart,
            product_id,
            qty,
        } => state
            .carts
            .set_cart_item(&cart, &product_id, qty)
            .await?
            .to_string(),
        ToolRequest::ViewCart(cart) => state.carts.view_cart(&cart).await?.to_string(),
        ToolRequest::ClearCart(cart) => state.carts.clear_cart(&cart).await?.to_string(),
        ToolRequest::HandoverToHuman { cart_id, reason } => state
            .handoff
            .handover_to_human(&cart_id, &reason)
            .await?
            .to_string(),
        ToolRequest::HandoverForPurchase { cart_id, reason } => state
            .handoff
            .handover_for_purchase(&cart_id, &reason)
            .await?
            .to_string(),
    })
}
