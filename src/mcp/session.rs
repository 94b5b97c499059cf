//! SSE Session Registry
//!
//! Maps a session id to the channel feeding that client's event stream.
//! A session lives exactly as long as its [`Session`] handle: the handle is
//! owned by the stream, so a client disconnect drops it and unregisters
//! the session.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Messages buffered per session before senders are told the client is slow.
const SESSION_BUFFER: usize = 32;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, mpsc::Sender<Value>>>,
}

/// An open session. Dropping it removes the session from the registry.
pub struct Session {
    id: String,
    receiver: mpsc::Receiver<Value>,
    registry: SessionRegistry,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.sessions.insert(id.clone(), tx);
        tracing::info!(session_id = %id, "SSE session opened");
        Session {
            id,
            receiver: rx,
            registry: self.clone(),
        }
    }

    /// The sender for a live session, if any.
    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<Value>> {
        let sender = self.sessions.get(id)?.clone();
        if sender.is_closed() {
            self.close(id);
            return None;
        }
        Some(sender)
    }

    pub fn close(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            tracing::info!(session_id = %id, "SSE session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next message to deliver, `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.close(&self.id);
    }
}
