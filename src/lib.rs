//! Conversational Commerce Library
//!
//! MCP tool server backing a chat sales agent: fuzzy catalog search, a
//! transactional cart with tiered pricing, checkout reservations with a
//! 24-hour expiry, and handoff to a human helpdesk.

// Domain modules
pub mod cart;
pub mod catalog;
pub mod handoff;
pub mod mcp;

// Infrastructure
pub mod error;
pub mod helpdesk;
pub mod router;
pub mod settings;
pub mod state;
pub mod store;

pub use error::{Error, Result};
