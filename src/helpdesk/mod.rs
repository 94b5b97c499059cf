//! External helpdesk integration.
//!
//! The helpdesk is treated as unreliable: callers decide per call whether a
//! failure aborts their operation or is only logged.

mod client;

pub use client::HelpdeskClient;

use serde::Deserialize;

/// Connection settings for the helpdesk REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct HelpdeskConfig {
    pub base_url: String,
    pub account_id: u64,
    pub api_token: String,
    pub inbox_id: u64,
    pub contact_id: u64,
    #[serde(default)]
    pub source_id: Option<String>,
    /// Create a new conversation when a cart has none bound to it.
    #[serde(default)]
    pub create_conversation_fallback: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Turns free text into a helpdesk label: lowercase, whitespace runs become
/// `_`, anything other than alphanumerics, `_` and `-` is dropped.
pub fn normalize_label(text: &str) -> String {
    let mut label = String::with_capacity(text.len());
    let mut pending_gap = false;
    for c in text.trim().to_lowercase().chars() {
        if c.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if !(c.is_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if pending_gap && !label.is_empty() {
            label.push('_');
        }
        pending_gap = false;
        label.push(c);
    }
    label
}

/// Appends `incoming` to `existing`, skipping labels already present.
pub fn merge_labels(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for label in incoming {
        if !label.is_empty() && !merged.contains(label) {
            merged.push(label.clone());
        }
    }
    merged
}
