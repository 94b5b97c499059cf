//! Handoff coordinator, reservations and the reaper.

mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use common::*;
use conversational_commerce::{
    cart::{models::CartStatus, validate::CartId, CartEngine},
    error::{Error, StockShortfall},
    handoff::{HandoffCoordinator, Reaper},
    helpdesk::HelpdeskClient,
    store::SqliteStore,
};

fn coordinator(store: &SqliteStore, helpdesk: Option<HelpdeskClient>) -> HandoffCoordinator {
    let reaper = Reaper::new(store.clone(), Duration::hours(24));
    HandoffCoordinator::new(store.clone(), helpdesk, reaper)
}

fn id(raw: &str) -> CartId {
    CartId::parse(raw).unwrap()
}

async fn status_of(store: &SqliteStore, cart: &str) -> CartStatus {
    store.get_cart(&id(cart)).await.unwrap().unwrap().status
}

// =============================================================================
// handover_to_human
// =============================================================================

#[tokio::test]
async fn handover_opens_conversation_and_merges_labels() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(false).await;
    mock.preset_labels(42, &["vip"]);
    store
        .ensure_cart(&conversation_cart("42"), Utc::now())
        .await
        .unwrap();

    let notice = coordinator(&store, Some(client))
        .handover_to_human(&id("42"), "Cliente pide factura A")
        .await
        .unwrap();

    assert_eq!(notice.conversation_id, 42);
    assert!(!notice.created_conversation);
    assert_eq!(mock.status_of(42).as_deref(), Some("open"));
    assert_eq!(
        mock.labels_of(42),
        vec!["vip", "handover", "cliente_pide_factura_a"]
    );
    assert!(notice.to_string().contains("agente humano"));
}

#[tokio::test]
async fn handover_without_conversation_fails_when_creation_is_disabled() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(false).await;

    let err = coordinator(&store, Some(client))
        .handover_to_human(&id("web-cart"), "consulta")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalService { .. }));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn handover_creates_and_binds_a_conversation_once() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(true).await;
    let handoff = coordinator(&store, Some(client));

    let first = handoff
        .handover_to_human(&id("web-cart"), "consulta de talles")
        .await
        .unwrap();
    assert!(first.created_conversation);
    assert_eq!(first.conversation_id, 900);

    let bound = store.get_cart(&id("web-cart")).await.unwrap().unwrap();
    assert_eq!(bound.support_conversation_id, Some(900));

    let second = handoff
        .handover_to_human(&id("web-cart"), "otra consulta")
        .await
        .unwrap();
    assert!(!second.created_conversation);
    assert_eq!(second.conversation_id, 900);

    let creations = mock
        .requests()
        .iter()
        .filter(|r| r.starts_with("POST /conversations inbox"))
        .count();
    assert_eq!(creations, 1);
}

#[tokio::test]
async fn failed_status_change_aborts_the_handover() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(false).await;
    mock.fail_status_change.store(true, Ordering::SeqCst);
    store
        .ensure_cart(&conversation_cart("42"), Utc::now())
        .await
        .unwrap();

    let err = coordinator(&store, Some(client))
        .handover_to_human(&id("42"), "consulta")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalService { .. }));
    assert!(mock.labels_of(42).is_empty());
}

#[tokio::test]
async fn handover_without_helpdesk_is_reported() {
    let store = seeded_store().await;
    let err = coordinator(&store, None)
        .handover_to_human(&id("c1"), "consulta")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HelpdeskDisabled));
}

// =============================================================================
// handover_for_purchase
// =============================================================================

#[tokio::test]
async fn purchase_reserves_stock_and_hands_over() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(false).await;
    let engine = CartEngine::new(store.clone(), None);
    let c = conversation_cart("42");
    engine.add_to_cart(&c, &pid("remera-negra-m"), qty(4)).await.unwrap();
    engine.add_to_cart(&c, &pid("falda-roja-s"), qty(2)).await.unwrap();

    let confirmation = coordinator(&store, Some(client))
        .handover_for_purchase(&c.id, "paga con transferencia")
        .await
        .unwrap();

    assert_eq!(stock_of(&store, "remera-negra-m").await, 6);
    assert_eq!(stock_of(&store, "falda-roja-s").await, 18);
    assert_eq!(status_of(&store, "42").await, CartStatus::Reserved);

    assert_eq!(confirmation.window_hours, 24);
    assert_eq!(confirmation.reservation.total, 6 * 1_500);
    let text = confirmation.to_string();
    assert!(text.contains("24 horas"));
    assert!(text.contains("4x Remera Negro (M)"));
    assert!(text.contains("$90.00"));

    assert_eq!(mock.status_of(42).as_deref(), Some("open"));
    assert_eq!(
        mock.labels_of(42),
        vec!["handover", "pago", "paga_con_transferencia"]
    );
}

#[tokio::test]
async fn second_checkout_is_rejected_without_touching_stock() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let c = cart("c1");
    engine.add_to_cart(&c, &pid("remera-negra-m"), qty(4)).await.unwrap();
    let handoff = coordinator(&store, None);

    handoff.handover_for_purchase(&c.id, "pago").await.unwrap();
    let reserved_at = store.get_cart(&c.id).await.unwrap().unwrap().reserved_at;

    let err = handoff.handover_for_purchase(&c.id, "pago").await.unwrap_err();
    assert!(matches!(err, Error::CartLocked(_)));
    assert_eq!(stock_of(&store, "remera-negra-m").await, 6);
    let cart_row = store.get_cart(&c.id).await.unwrap().unwrap();
    assert_eq!(cart_row.reserved_at, reserved_at);
}

#[tokio::test]
async fn empty_cart_cannot_be_purchased() {
    let store = seeded_store().await;
    store.ensure_cart(&cart("c1"), Utc::now()).await.unwrap();

    let err = coordinator(&store, None)
        .handover_for_purchase(&id("c1"), "pago")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyCart(_)));
    assert_eq!(status_of(&store, "c1").await, CartStatus::Active);
}

#[tokio::test]
async fn reservation_stands_when_the_helpdesk_fails() {
    let store = seeded_store().await;
    let (mock, client) = mock_client(false).await;
    mock.fail_status_change.store(true, Ordering::SeqCst);
    let engine = CartEngine::new(store.clone(), None);
    let c = conversation_cart("42");
    engine.add_to_cart(&c, &pid("remera-negra-m"), qty(3)).await.unwrap();

    let confirmation = coordinator(&store, Some(client))
        .handover_for_purchase(&c.id, "pago")
        .await
        .unwrap();

    assert!(confirmation.handoff.is_none());
    assert!(confirmation.to_string().contains("reserva sigue vigente"));
    assert_eq!(status_of(&store, "42").await, CartStatus::Reserved);
    assert_eq!(stock_of(&store, "remera-negra-m").await, 7);
}

#[tokio::test]
async fn competing_checkouts_cannot_oversell() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let (a, b) = (cart("a"), cart("b"));
    engine.add_to_cart(&a, &pid("remera-negra-m"), qty(6)).await.unwrap();
    engine.add_to_cart(&b, &pid("remera-negra-m"), qty(6)).await.unwrap();
    let handoff = coordinator(&store, None);

    let (first, second) = tokio::join!(
        handoff.handover_for_purchase(&a.id, "pago"),
        handoff.handover_for_purchase(&b.id, "pago"),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        err,
        Error::Stock(StockShortfall::Checkout { requested: 6, .. })
    ));
    assert_eq!(stock_of(&store, "remera-negra-m").await, 4);
}

#[tokio::test]
async fn multi_line_checkout_is_all_or_nothing() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let (holder, buyer) = (cart("holder"), cart("buyer"));
    engine.add_to_cart(&holder, &pid("falda-roja-s"), qty(15)).await.unwrap();
    engine.add_to_cart(&buyer, &pid("pantalon-azul-l"), qty(50)).await.unwrap();
    engine.add_to_cart(&buyer, &pid("falda-roja-s"), qty(10)).await.unwrap();
    let handoff = coordinator(&store, None);

    handoff.handover_for_purchase(&holder.id, "pago").await.unwrap();
    let err = handoff
        .handover_for_purchase(&buyer.id, "pago")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Stock(_)));
    assert_eq!(stock_of(&store, "pantalon-azul-l").await, 500);
    assert_eq!(stock_of(&store, "falda-roja-s").await, 5);
    assert_eq!(status_of(&store, "buyer").await, CartStatus::Active);
}

// =============================================================================
// Reaper
// =============================================================================

#[tokio::test]
async fn reaper_reclaims_only_expired_reservations() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let (stale, recent) = (cart("stale"), cart("recent"));
    engine.add_to_cart(&stale, &pid("pantalon-azul-l"), qty(30)).await.unwrap();
    engine.add_to_cart(&recent, &pid("pantalon-azul-l"), qty(20)).await.unwrap();

    let now = Utc::now();
    let handoff = coordinator(&store, None);
    handoff
        .handover_for_purchase_at(&stale.id, "pago", now - Duration::hours(25))
        .await
        .unwrap();
    handoff
        .handover_for_purchase_at(&recent.id, "pago", now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(stock_of(&store, "pantalon-azul-l").await, 450);

    let reclaimed = handoff
        .reaper()
        .cleanup_expired_reservations(now)
        .await
        .unwrap();

    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].cart_id, "stale");
    assert_eq!(stock_of(&store, "pantalon-azul-l").await, 480);
    assert_eq!(status_of(&store, "stale").await, CartStatus::Active);
    assert_eq!(status_of(&store, "recent").await, CartStatus::Reserved);

    let stale_row = store.get_cart(&stale.id).await.unwrap().unwrap();
    assert_eq!(stale_row.reserved_at, None);
}

#[tokio::test]
async fn reaper_without_expired_carts_is_a_no_op() {
    let store = seeded_store().await;
    let reaper = Reaper::new(store.clone(), Duration::hours(24));

    assert!(reaper
        .cleanup_expired_reservations(Utc::now())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(stock_of(&store, "remera-negra-m").await, 10);
}

#[tokio::test]
async fn concurrent_sweeps_credit_stock_once() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let c = cart("c1");
    engine.add_to_cart(&c, &pid("remera-negra-m"), qty(8)).await.unwrap();
    let now = Utc::now();
    store
        .reserve_cart(&c.id, now - Duration::hours(30))
        .await
        .unwrap();

    let reaper = Reaper::new(store.clone(), Duration::hours(24));
    let (a, b) = tokio::join!(
        reaper.cleanup_expired_reservations(now),
        reaper.cleanup_expired_reservations(now),
    );

    assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);
    assert_eq!(stock_of(&store, "remera-negra-m").await, 10);
}

#[tokio::test]
async fn checkout_sweeps_expired_holds_first() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let (abandoned, buyer) = (cart("abandoned"), cart("buyer"));
    engine.add_to_cart(&abandoned, &pid("remera-negra-m"), qty(8)).await.unwrap();
    engine.add_to_cart(&buyer, &pid("remera-negra-m"), qty(5)).await.unwrap();

    let now = Utc::now();
    store
        .reserve_cart(&abandoned.id, now - Duration::hours(26))
        .await
        .unwrap();
    assert_eq!(stock_of(&store, "remera-negra-m").await, 2);

    coordinator(&store, None)
        .handover_for_purchase_at(&buyer.id, "pago", now)
        .await
        .unwrap();

    assert_eq!(status_of(&store, "abandoned").await, CartStatus::Active);
    assert_eq!(stock_of(&store, "remera-negra-m").await, 5);
}

#[tokio::test]
async fn spawned_reaper_sweeps_on_its_interval() {
    let store = seeded_store().await;
    let engine = CartEngine::new(store.clone(), None);
    let c = cart("c1");
    engine.add_to_cart(&c, &pid("remera-negra-m"), qty(3)).await.unwrap();
    store
        .reserve_cart(&c.id, Utc::now() - Duration::hours(48))
        .await
        .unwrap();

    let handle = Reaper::new(store.clone(), Duration::hours(24))
        .spawn(std::time::Duration::from_secs(60));

    let mut reclaimed = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if status_of(&store, "c1").await == CartStatus::Active {
            reclaimed = true;
            break;
        }
    }
    handle.abort();

    assert!(reclaimed);
    assert_eq!(stock_of(&store, "remera-negra-m").await, 10);
}
