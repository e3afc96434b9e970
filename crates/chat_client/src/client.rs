//! Chat API HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chat API client (blocking).
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Body of `POST /api/v1/chat/query`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatQuery {
    pub message: String,
    pub conversation_id: String,
    pub language: String,
}

impl ChatQuery {
    pub fn new(message: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
            language: "en".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub temporal_info: Option<serde_json::Value>,
    #[serde(default)]
    pub postgres_results_count: Option<u64>,
}

/// A chat answer. The server names the text field either `response` or
/// `message` depending on version; both land in `text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub text: String,
    pub metadata: ChatMetadata,
}

#[derive(Deserialize)]
struct RawChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    metadata: Option<ChatMetadata>,
}

impl From<RawChatResponse> for ChatResponse {
    fn from(raw: RawChatResponse) -> Self {
        Self {
            text: raw.response.or(raw.message).unwrap_or_default(),
            metadata: raw.metadata.unwrap_or_default(),
        }
    }
}

/// `GET /health` payload. Only `status` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl ChatClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("floatcov/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn health(&self) -> Result<Health, ChatError> {
        let url = format!("{}/health", self.api_base);
        let resp = self.get(&url)?;
        resp.json::<Health>().map_err(|e| ChatError::Parse(e.to_string()))
    }

    pub fn query(&self, query: &ChatQuery) -> Result<ChatResponse, ChatError> {
        let url = format!("{}/api/v1/chat/query", self.api_base);
        log::debug!("POST {url} ({})", query.conversation_id);
        let resp = self.post_json(&url, query)?;
        let raw: RawChatResponse = resp.json().map_err(|e| ChatError::Parse(e.to_string()))?;
        Ok(raw.into())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ChatError> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response)
    }

    fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::blocking::Response, ChatError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ChatError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ChatError::Http(status.as_u16(), body));
    }
    Ok(response)
}
