//! Human handoff and stock reservation.

pub mod coordinator;
pub mod models;
pub mod reaper;

pub use coordinator::HandoffCoordinator;
pub use models::{HandoffNotice, PurchaseConfirmation};
pub use reaper::Reaper;
