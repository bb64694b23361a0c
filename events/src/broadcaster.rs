//! The realtime transport seam — a trait so `EventBus` never depends on a
//! specific vendor's wire protocol (explicit non-goal: "only its
//! broadcast envelope is specified").

use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct BroadcastError {
    pub transient: bool,
    pub message: String,
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BroadcastError {}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish `envelope` to `topic`. Implementations should classify a
    /// non-2xx response as `transient = true` when it is HTTP 429 or a
    /// connection-level error, matching the broadcaster's retry policy.
    async fn publish(&self, topic: &str, envelope: &serde_json::Value) -> Result<(), BroadcastError>;
}

/// Posts each envelope as a JSON body to `{base_url}/{topic}`.
pub struct HttpBroadcaster {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBroadcaster {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn publish(&self, topic: &str, envelope: &serde_json::Value) -> Result<(), BroadcastError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), topic);
        let response = self
            .client
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| BroadcastError {
                transient: true,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(BroadcastError {
            transient: status.as_u16() == 429 || status.is_server_error(),
            message: format!("broadcast to {url} failed with status {status}"),
        })
    }
}

/// Records every published envelope in memory; stands in for the realtime
/// vendor in tests.
#[derive(Default)]
pub struct InMemoryBroadcaster {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InMemoryBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for InMemoryBroadcaster {
    async fn publish(&self, topic: &str, envelope: &serde_json::Value) -> Result<(), BroadcastError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}
