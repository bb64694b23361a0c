//! `send_message`, `event_query`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use sector_mmo_common::constants::CHAT_MESSAGE_MAX_LEN;
use sector_mmo_common::enums::EventScope;
use sector_mmo_common::errors::{DispatchError, GameError};
use sector_mmo_common::ids::{CharacterId, RequestId};

use crate::handlers::support::{emit, field_character_id, field_opt_str, field_opt_u64, field_str, to_value};
use crate::state::AppState;

pub async fn send_message(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let message_type = field_str(extra, "type")?;
    let body = field_str(extra, "body")?;
    if body.len() > CHAT_MESSAGE_MAX_LEN {
        return Err(DispatchError::Validation(format!(
            "message exceeds {CHAT_MESSAGE_MAX_LEN} characters"
        ))
        .into());
    }

    let character = state.world.get_character(character_id).await?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| DispatchError::Validation("character has no active ship".to_string()))?;
    let ship = state.world.get_ship(ship_id).await?;

    let (scope, sector_id) = match message_type {
        "broadcast" => {
            let sector_id = ship
                .current_sector
                .ok_or_else(|| DispatchError::Validation("ship is not in a sector".to_string()))?;
            (EventScope::Sector { id: sector_id, exclude_actor: false }, Some(sector_id))
        }
        "direct" => {
            let to_character_id = field_character_id(&state.config, extra, "to_character_id")?;
            (EventScope::Character { id: to_character_id }, ship.current_sector)
        }
        other => {
            return Err(DispatchError::Validation(format!("unknown message type '{other}'")).into());
        }
    };

    emit(
        state,
        "send_message",
        request_id,
        scope,
        "chat.message",
        serde_json::json!({
            "type": message_type,
            "from_character_id": character_id,
            "body": body,
        }),
        Some(character_id),
        sector_id,
    )
    .await?;

    Ok(serde_json::json!({"sent": true}))
}

pub async fn event_query(
    state: &Arc<AppState>,
    actor: CharacterId,
    character_id: CharacterId,
    is_admin: bool,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id && !is_admin {
        return Err(DispatchError::AuthForbidden.into());
    }

    let scoped_character = if is_admin { None } else { Some(character_id) };
    let sector_id = field_opt_u64(extra, "sector_id").map(|v| v as i64);
    let corporation_id = match field_opt_str(extra, "corporation_id") {
        Some(raw) => Some(
            uuid::Uuid::parse_str(raw)
                .map_err(|_| DispatchError::Validation("corporation_id is not a valid uuid".to_string()))?,
        ),
        None => None,
    };
    let since = match field_opt_str(extra, "since") {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| DispatchError::Validation("since must be an RFC3339 timestamp".to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    let limit = field_opt_u64(extra, "limit").map(|v| v as u32).unwrap_or(100).min(500);

    let events = state
        .world
        .query_events(scoped_character, sector_id, corporation_id, since, limit)
        .await?;

    Ok(serde_json::json!({"events": to_value(&events)?}))
}
