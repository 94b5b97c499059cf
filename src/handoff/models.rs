//! Handoff outcomes and the texts relayed to the shopper.

use std::fmt;

use crate::cart::helpers::{format_item_summary, format_money};
use crate::store::Reservation;

/// A conversation that was handed to a human operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffNotice {
    pub cart_id: String,
    pub conversation_id: u64,
    pub labels: Vec<String>,
    /// Whether the helpdesk conversation was created for this handoff.
    pub created_conversation: bool,
}

impl fmt::Display for HandoffNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            "Te estoy transfiriendo con un agente humano. En breve alguien del equipo continuará la conversación.",
        )
    }
}

/// Outcome of `handover_for_purchase`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseConfirmation {
    pub reservation: Reservation,
    pub window_hours: i64,
    /// `None` when the reservation stands but the helpdesk could not be reached.
    pub handoff: Option<HandoffNotice>,
}

impl fmt::Display for PurchaseConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✅ *Stock reservado por {} horas.*", self.window_hours)?;
        writeln!(f)?;
        writeln!(f, "Pedido: {}", format_item_summary(&self.reservation.lines))?;
        writeln!(f, "Total: {}", format_money(self.reservation.total))?;
        writeln!(f)?;
        match &self.handoff {
            Some(notice) => write!(f, "{notice}"),
            None => f.write_str(
                "No pudimos avisar al equipo de ventas en este momento; tu reserva sigue vigente y te contactaremos a la brevedad.",
            ),
        }
    }
}
