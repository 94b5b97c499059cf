//! Shared fixtures: a seeded in-memory store and a mock helpdesk server.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    time::Duration,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{patch, post},
    Json, Router,
};
use conversational_commerce::{
    cart::validate::{require_cart, CartId, CartRef, ProductId, Quantity},
    catalog::{PriceTiers, Product},
    helpdesk::{HelpdeskClient, HelpdeskConfig},
    store::SqliteStore,
};
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";

pub fn product(id: &str, name: &str, color: &str, size: &str, stock: i64) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        description: format!("{name} de algodón"),
        category: "Casual".into(),
        color: color.into(),
        size: size.into(),
        stock,
        prices: PriceTiers {
            base: 1_500,
            tier_100: 1_200,
            tier_200: 1_000,
        },
        available: true,
    }
}

/// `remera-negra-m` (stock 10), `pantalon-azul-l` (stock 500),
/// `falda-roja-s` (stock 20).
pub async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
        .upsert_products(vec![
            product("remera-negra-m", "Remera", "Negro", "M", 10),
            product("pantalon-azul-l", "Pantalón", "Azul", "L", 500),
            product("falda-roja-s", "Falda", "Rojo", "S", 20),
        ])
        .await
        .unwrap();
    store
}

pub fn cart(id: &str) -> CartRef {
    CartRef::new(CartId::parse(id).unwrap())
}

/// A cart addressed by conversation id, as the chat agent does.
pub fn conversation_cart(conversation: &str) -> CartRef {
    require_cart(None, Some(conversation)).unwrap()
}

pub fn pid(id: &str) -> ProductId {
    ProductId::parse(id).unwrap()
}

pub fn qty(n: u32) -> Quantity {
    Quantity::new(n).unwrap()
}

pub async fn stock_of(store: &SqliteStore, id: &str) -> i64 {
    store.find_product(id).await.unwrap().unwrap().stock
}

// =============================================================================
// Mock Helpdesk
// =============================================================================

/// In-process stand-in for the helpdesk REST API.
#[derive(Clone, Default)]
pub struct MockHelpdesk {
    pub requests: Arc<Mutex<Vec<String>>>,
    pub labels: Arc<Mutex<HashMap<u64, Vec<String>>>>,
    pub statuses: Arc<Mutex<HashMap<u64, String>>>,
    pub fail_status_change: Arc<AtomicBool>,
    pub next_conversation: Arc<AtomicU64>,
}

impl MockHelpdesk {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn labels_of(&self, conversation: u64) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .get(&conversation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn status_of(&self, conversation: u64) -> Option<String> {
        self.statuses.lock().unwrap().get(&conversation).cloned()
    }

    pub fn preset_labels(&self, conversation: u64, labels: &[&str]) {
        self.labels.lock().unwrap().insert(
            conversation,
            labels.iter().map(|l| l.to_string()).collect(),
        );
    }

    fn record(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }
}

fn authorized(headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get("api_access_token").and_then(|v| v.to_str().ok()) {
        Some(TOKEN) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn create_conversation(
    State(mock): State<MockHelpdesk>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    let id = mock.next_conversation.fetch_add(1, Ordering::SeqCst) + 900;
    mock.record(format!("POST /conversations inbox={}", body["inbox_id"]));
    Ok(Json(json!({ "data": { "id": id } })))
}

async fn update_status(
    State(mock): State<MockHelpdesk>,
    Path((_account, id)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    mock.record(format!("PATCH /conversations/{id}"));
    if mock.fail_status_change.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let status = body["status"].as_str().unwrap_or_default().to_string();
    mock.statuses.lock().unwrap().insert(id, status);
    Ok(Json(json!({ "id": id })))
}

async fn get_labels(
    State(mock): State<MockHelpdesk>,
    Path((_account, id)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    mock.record(format!("GET /conversations/{id}/labels"));
    Ok(Json(json!({ "payload": mock.labels_of(id) })))
}

async fn set_labels(
    State(mock): State<MockHelpdesk>,
    Path((_account, id)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    authorized(&headers)?;
    mock.record(format!("POST /conversations/{id}/labels"));
    let labels: Vec<String> = serde_json::from_value(body["labels"].clone()).unwrap_or_default();
    mock.labels.lock().unwrap().insert(id, labels.clone());
    Ok(Json(json!({ "payload": labels })))
}

/// Starts the mock on an ephemeral port and returns its base URL.
pub async fn spawn_helpdesk(mock: MockHelpdesk) -> String {
    let app = Router::new()
        .route("/api/v1/accounts/:account/conversations", post(create_conversation))
        .route("/api/v1/accounts/:account/conversations/:id", patch(update_status))
        .route(
            "/api/v1/accounts/:account/conversations/:id/labels",
            post(set_labels).get(get_labels),
        )
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn helpdesk_config(base_url: &str, create_fallback: bool) -> HelpdeskConfig {
    HelpdeskConfig {
        base_url: base_url.to_string(),
        account_id: 1,
        api_token: TOKEN.to_string(),
        inbox_id: 5,
        contact_id: 8,
        source_id: None,
        create_conversation_fallback: create_fallback,
        timeout_secs: 5,
    }
}

pub async fn mock_client(create_fallback: bool) -> (MockHelpdesk, HelpdeskClient) {
    let mock = MockHelpdesk::default();
    let base = spawn_helpdesk(mock.clone()).await;
    let client = HelpdeskClient::new(helpdesk_config(&base, create_fallback)).unwrap();
    (mock, client)
}

/// A client whose server accepts connections but never answers.
pub async fn silent_client() -> HelpdeskClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    HelpdeskClient::new(helpdesk_config(&format!("http://{addr}"), false)).unwrap()
}

/// Polls `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A client pointed at a port nothing listens on.
pub fn unreachable_client() -> HelpdeskClient {
    HelpdeskClient::new(helpdesk_config("http://127.0.0.1:9", true)).unwrap()
}
