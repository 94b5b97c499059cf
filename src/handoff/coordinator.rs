//! Handoff Coordinator
//!
//! Moves a conversation to a human operator, and for purchases reserves
//! the cart's stock first.

use chrono::{DateTime, Utc};

use super::models::{HandoffNotice, PurchaseConfirmation};
use super::reaper::Reaper;
use crate::cart::helpers::format_item_summary;
use crate::cart::models::CartStatus;
use crate::cart::validate::CartId;
use crate::error::{Error, Result};
use crate::helpdesk::{normalize_label, HelpdeskClient};
use crate::store::SqliteStore;

pub const HANDOVER_LABEL: &str = "handover";
pub const PURCHASE_LABEL: &str = "pago";

#[derive(Clone)]
pub struct HandoffCoordinator {
    store: SqliteStore,
    helpdesk: Option<HelpdeskClient>,
    reaper: Reaper,
}

impl HandoffCoordinator {
    pub fn new(store: SqliteStore, helpdesk: Option<HelpdeskClient>, reaper: Reaper) -> Self {
        Self {
            store,
            helpdesk,
            reaper,
        }
    }

    pub fn reaper(&self) -> &Reaper {
        &self.reaper
    }

    /// Opens the cart's support conversation for an operator and labels it.
    ///
    /// Conversation creation and the status change are mandatory; labeling
    /// is best-effort.
    pub async fn handover_to_human(&self, cart_id: &CartId, reason: &str) -> Result<HandoffNotice> {
        let labels = vec![HANDOVER_LABEL.to_string(), normalize_label(reason)];
        self.hand_over(cart_id, reason, labels).await
    }

    /// The checkout path: reserve the cart's stock, then hand over.
    ///
    /// Once stock is debited the reservation stands even if the helpdesk
    /// call fails; the reaper releases it when the window elapses.
    pub async fn handover_for_purchase(
        &self,
        cart_id: &CartId,
        reason: &str,
    ) -> Result<PurchaseConfirmation> {
        self.handover_for_purchase_at(cart_id, reason, Utc::now()).await
    }

    pub async fn handover_for_purchase_at(
        &self,
        cart_id: &CartId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PurchaseConfirmation> {
        if let Some(cart) = self.store.get_cart(cart_id).await? {
            if cart.status == CartStatus::Reserved {
                tracing::warn!(cart_id = %cart_id, "checkout attempted on a reserved cart");
                return Err(Error::CartLocked(cart.id));
            }
        }

        if let Err(err) = self.reaper.cleanup_expired_reservations(now).await {
            tracing::warn!(error = %err, "inline reservation sweep failed");
        }

        let reservation = self.store.reserve_cart(cart_id, now).await?;
        tracing::info!(
            cart_id = %cart_id,
            total = reservation.total,
            items = reservation.lines.len(),
            "cart reserved"
        );

        let summary = format_item_summary(&reservation.lines);
        let purchase_reason = format!("PAGO: {summary}");
        let labels = vec![
            HANDOVER_LABEL.to_string(),
            PURCHASE_LABEL.to_string(),
            normalize_label(reason),
        ];
        let handoff = match self.hand_over(cart_id, &purchase_reason, labels).await {
            Ok(notice) => Some(notice),
            Err(err) => {
                tracing::warn!(
                    cart_id = %cart_id,
                    error = %err,
                    "purchase handoff failed after reservation"
                );
                None
            }
        };

        Ok(PurchaseConfirmation {
            reservation,
            window_hours: self.reaper.window().num_hours(),
            handoff,
        })
    }

    async fn hand_over(
        &self,
        cart_id: &CartId,
        reason: &str,
        labels: Vec<String>,
    ) -> Result<HandoffNotice> {
        let Some(helpdesk) = &self.helpdesk else {
            return Err(Error::HelpdeskDisabled);
        };

        let (conversation, created) = self.resolve_conversation(helpdesk, cart_id).await?;
        helpdesk.open_conversation(conversation).await?;

        let labels: Vec<String> = labels.into_iter().filter(|l| !l.is_empty()).collect();
        let applied = match helpdesk.add_labels(conversation, &labels).await {
            Ok(merged) => merged,
            Err(err) => {
                tracing::warn!(conversation, error = %err, "labeling handoff conversation failed");
                Vec::new()
            }
        };

        tracing::info!(cart_id = %cart_id, conversation, reason, "handed over to human");
        Ok(HandoffNotice {
            cart_id: cart_id.to_string(),
            conversation_id: conversation,
            labels: applied,
            created_conversation: created,
        })
    }

    /// Bound conversation first, then the caller's conversation reference,
    /// then (if enabled) a new conversation bound to the cart.
    async fn resolve_conversation(
        &self,
        helpdesk: &HelpdeskClient,
        cart_id: &CartId,
    ) -> Result<(u64, bool)> {
        let cart = self.store.get_cart(cart_id).await?;
        if let Some(conversation) = cart.as_ref().and_then(|c| c.helpdesk_conversation()) {
            return Ok((conversation, false));
        }

        if !helpdesk.creates_missing_conversations() {
            return Err(Error::external(
                format!("cart {cart_id} has no helpdesk conversation"),
                None,
            ));
        }

        let conversation = helpdesk.create_conversation().await?;
        self.store
            .bind_support_conversation(cart_id, conversation, Utc::now())
            .await?;
        Ok((conversation, true))
    }
}
