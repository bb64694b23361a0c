//! Request/response envelope shared by every endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sector_mmo_common::ids::RequestId;

/// The fields every endpoint request carries, with method-specific fields
/// folded into `extra` by `serde(flatten)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequest {
    pub character_id: String,
    pub request_id: Option<String>,
    pub actor_character_id: Option<String>,
    #[serde(default)]
    pub admin_override: bool,
    #[serde(default)]
    pub healthcheck: bool,
    #[serde(flatten)]
    pub extra: Value,
}

impl RawRequest {
    /// Caller-supplied `request_id`, or a freshly generated one.
    pub fn request_id(&self) -> RequestId {
        match &self.request_id {
            Some(id) if !id.trim().is_empty() => RequestId(id.clone()),
            _ => RequestId::generate(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
    #[serde(flatten)]
    pub data: Value,
}

impl ApiResponse {
    pub fn ok(request_id: &RequestId, data: Value) -> Self {
        Self {
            success: true,
            error: None,
            request_id: request_id.to_string(),
            data,
        }
    }

    pub fn err(request_id: &RequestId, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            request_id: request_id.to_string(),
            data: Value::Object(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_request_id_is_generated() {
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "character_id": "captain zor",
        }))
        .unwrap();
        assert!(!raw.request_id().0.is_empty());
    }

    #[test]
    fn blank_request_id_is_treated_as_absent() {
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "character_id": "captain zor",
            "request_id": "  ",
        }))
        .unwrap();
        assert_ne!(raw.request_id().0, "  ");
    }
}
