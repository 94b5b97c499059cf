//! Application State
//!
//! Services shared by every request handler.

use std::sync::Arc;

use crate::cart::CartEngine;
use crate::catalog::Catalog;
use crate::handoff::{HandoffCoordinator, Reaper};
use crate::helpdesk::HelpdeskClient;
use crate::mcp::session::SessionRegistry;
use crate::store::SqliteStore;

/// Thread-safe shared state for the application
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub catalog: Catalog,
    pub carts: CartEngine,
    pub handoff: HandoffCoordinator,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Wires the services over one store.
    ///
    /// # Arguments
    ///
    /// * `store` - Backing store shared by every service.
    /// * `helpdesk` - Helpdesk client, `None` when the integration is off.
    /// * `reservation_window` - How long a checkout holds stock.
    pub fn new(
        store: SqliteStore,
        helpdesk: Option<HelpdeskClient>,
        reservation_window: chrono::Duration,
    ) -> Self {
        let reaper = Reaper::new(store.clone(), reservation_window);
        Self {
            catalog: Catalog::new(store.clone()),
            carts: CartEngine::new(store.clone(), helpdesk.clone()),
            handoff: HandoffCoordinator::new(store, helpdesk, reaper),
            sessions: SessionRegistry::new(),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
