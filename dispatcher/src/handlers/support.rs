//! Field extraction and event-emission helpers shared by every handler.

use serde_json::Value;

use sector_mmo_common::errors::DispatchError;
use sector_mmo_common::ids::{CharacterId, RequestId, SectorId};
use sector_mmo_events::{EventSource, OutboundEvent};

use crate::auth::canonicalize_character_id;
use crate::config::Config;
use crate::state::AppState;

pub fn field_str<'a>(extra: &'a Value, key: &str) -> Result<&'a str, DispatchError> {
    extra
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DispatchError::Validation(format!("missing or empty field '{key}'")))
}

pub fn field_opt_str<'a>(extra: &'a Value, key: &str) -> Option<&'a str> {
    extra.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn field_u64(extra: &Value, key: &str) -> Result<u64, DispatchError> {
    extra
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| DispatchError::Validation(format!("missing or invalid field '{key}'")))
}

pub fn field_i64(extra: &Value, key: &str) -> Result<SectorId, DispatchError> {
    extra
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| DispatchError::Validation(format!("missing or invalid field '{key}'")))
}

pub fn field_opt_u64(extra: &Value, key: &str) -> Option<u64> {
    extra.get(key).and_then(Value::as_u64)
}

pub fn field_opt_i64(extra: &Value, key: &str) -> Option<SectorId> {
    extra.get(key).and_then(Value::as_i64)
}

pub fn field_bool(extra: &Value, key: &str) -> bool {
    extra.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Resolves a request field naming another character (`target_character_id`,
/// `to_character_id`, …) through the same UUID-or-legacy-name path used for
/// the primary `character_id`.
pub fn field_character_id(
    config: &Config,
    extra: &Value,
    key: &str,
) -> Result<CharacterId, DispatchError> {
    canonicalize_character_id(config, field_str(extra, key)?)
}

/// Infallible for the plain-data structs this server serializes; a
/// `GameError::Fatal` here would indicate a genuinely broken model (e.g. a
/// non-finite float), not a request-shaped problem.
pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, sector_mmo_common::errors::GameError> {
    serde_json::to_value(value)
        .map_err(|e| sector_mmo_common::errors::GameError::Fatal(format!("serialization: {e}")))
}

/// Emits `event_type` under `scope`, tagging it with this request's
/// `source`. Swallows the distinction between "no recipients" (broadcast
/// scope) and "delivered" — callers only need the persisted event id, if
/// any.
pub async fn emit(
    state: &AppState,
    method: &str,
    request_id: &RequestId,
    scope: sector_mmo_common::enums::EventScope,
    event_type: &str,
    payload: Value,
    actor: Option<CharacterId>,
    sector_id: Option<SectorId>,
) -> Result<(), sector_mmo_common::errors::EventError> {
    state
        .events
        .emit(OutboundEvent {
            scope,
            event_type: event_type.to_string(),
            payload,
            source: EventSource::rpc(method, request_id.to_string()),
            actor,
            sector_id,
            ship_id: None,
            meta: serde_json::json!({}),
        })
        .await?;
    Ok(())
}
