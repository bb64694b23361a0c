//! The event and broadcast envelope shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{type:"rpc", method, request_id, timestamp}` — injected by the
/// originating endpoint into every event it emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl EventSource {
    pub fn rpc(method: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            kind: "rpc".to_string(),
            method: method.into(),
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The broadcast envelope posted to the realtime transport per topic
/// `{topic, event, payload, __event_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(rename = "__event_id", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
}

pub fn character_topic(character_id: uuid::Uuid) -> String {
    format!("character:{character_id}")
}

pub fn sector_topic(sector_id: i64) -> String {
    format!("sector:{sector_id}")
}

pub const BROADCAST_TOPIC: &str = "broadcast";
