//! Async HTTP client for the helpdesk conversations API.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};

use super::{merge_labels, HelpdeskConfig};
use crate::error::{Error, Result};

/// Header carrying the static API token.
const TOKEN_HEADER: &str = "api_access_token";

/// Cheap to clone, the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HelpdeskClient {
    client: Client,
    config: Arc<HelpdeskConfig>,
}

#[derive(Deserialize)]
struct ConversationId {
    id: u64,
}

/// Creation responses carry the id either at the top level or under `data`.
#[derive(Deserialize)]
struct CreatedConversation {
    id: Option<u64>,
    data: Option<ConversationId>,
}

#[derive(Deserialize)]
struct LabelList {
    #[serde(default)]
    payload: Vec<String>,
}

impl HelpdeskClient {
    pub fn new(config: HelpdeskConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::external("failed to build HTTP client", Some(e)))?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Whether a cart without a bound conversation may get a new one.
    pub fn creates_missing_conversations(&self) -> bool {
        self.config.create_conversation_fallback
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/accounts/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_id,
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(TOKEN_HEADER, &self.config.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| Error::external(format!("{what} failed"), Some(e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::external(format!("{what} → {status}: {body}"), None))
    }

    /// `POST /conversations`
    pub async fn create_conversation(&self) -> Result<u64> {
        let body = json!({
            "inbox_id": self.config.inbox_id,
            "contact_id": self.config.contact_id,
            "source_id": self.config.source_id,
        });
        let resp = self
            .send(
                "POST /conversations",
                self.request(Method::POST, "/conversations").json(&body),
            )
            .await?;

        let created: CreatedConversation = resp
            .json()
            .await
            .map_err(|e| Error::external("deserialising created conversation", Some(e)))?;
        let id = created
            .id
            .or(created.data.map(|d| d.id))
            .ok_or_else(|| Error::external("helpdesk returned no conversation id", None))?;

        tracing::info!(conversation = id, "helpdesk conversation created");
        Ok(id)
    }

    /// `PATCH /conversations/{id}` with `status: open`.
    pub async fn open_conversation(&self, conversation: u64) -> Result<()> {
        let path = format!("/conversations/{conversation}");
        self.send(
            "PATCH /conversations/{id}",
            self.request(Method::PATCH, &path)
                .json(&json!({ "status": "open" })),
        )
        .await?;
        tracing::info!(conversation, "helpdesk conversation opened");
        Ok(())
    }

    /// `GET /conversations/{id}/labels`
    pub async fn labels(&self, conversation: u64) -> Result<Vec<String>> {
        let path = format!("/conversations/{conversation}/labels");
        let resp = self
            .send(
                "GET /conversations/{id}/labels",
                self.request(Method::GET, &path),
            )
            .await?;
        let list: LabelList = resp
            .json()
            .await
            .map_err(|e| Error::external("deserialising labels", Some(e)))?;
        Ok(list.payload)
    }

    /// `POST /conversations/{id}/labels`, which replaces the label set.
    pub async fn replace_labels(&self, conversation: u64, labels: &[String]) -> Result<()> {
        let path = format!("/conversations/{conversation}/labels");
        self.send(
            "POST /conversations/{id}/labels",
            self.request(Method::POST, &path)
                .json(&json!({ "labels": labels })),
        )
        .await?;
        Ok(())
    }

    /// Adds labels without dropping the ones already on the conversation.
    pub async fn add_labels(&self, conversation: u64, labels: &[String]) -> Result<Vec<String>> {
        let existing = self.labels(conversation).await?;
        let merged = merge_labels(&existing, labels);
        if merged != existing {
            self.replace_labels(conversation, &merged).await?;
        }
        tracing::info!(conversation, labels = ?merged, "helpdesk labels updated");
        Ok(merged)
    }
}
