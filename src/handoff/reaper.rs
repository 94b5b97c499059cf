//! Reservation Reaper
//!
//! Returns carts reserved longer than the reservation window to `active`
//! and credits their stock back. Runs periodically and inline before
//! every checkout; both paths may race safely.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::store::{ReclaimedCart, SqliteStore};

#[derive(Clone)]
pub struct Reaper {
    store: SqliteStore,
    window: chrono::Duration,
}

impl Reaper {
    pub fn new(store: SqliteStore, window: chrono::Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Reclaims every cart reserved before `now - window`.
    pub async fn cleanup_expired_reservations(&self, now: DateTime<Utc>) -> Result<Vec<ReclaimedCart>> {
        let reclaimed = self.store.reclaim_expired(now - self.window, now).await?;
        for cart in &reclaimed {
            tracing::info!(
                cart_id = %cart.cart_id,
                items = cart.restored.len(),
                "expired reservation reclaimed"
            );
        }
        Ok(reclaimed)
    }

    /// Spawns the periodic sweep. The first tick fires immediately.
    pub fn spawn(self, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.cleanup_expired_reservations(Utc::now()).await {
                    Ok(reclaimed) if !reclaimed.is_empty() => {
                        tracing::info!(count = reclaimed.len(), "reservation sweep finished");
                    }
                    Ok(_) => tracing::debug!("reservation sweep found nothing to reclaim"),
                    Err(err) => tracing::error!(error = %err, "reservation sweep failed"),
                }
            }
        })
    }
}
