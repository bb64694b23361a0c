//! `test_reset`, `character_delete` — both admin-only.

use std::sync::Arc;

use serde_json::Value;

use sector_mmo_common::enums::EventScope;
use sector_mmo_common::errors::{DispatchError, GameError};
use sector_mmo_common::ids::RequestId;

use crate::handlers::support::emit;
use crate::state::AppState;

pub async fn test_reset(state: &Arc<AppState>, is_admin: bool, extra: &Value) -> Result<Value, GameError> {
    if !is_admin {
        return Err(DispatchError::AuthForbidden.into());
    }
    let fixtures = extra.get("fixtures").cloned().unwrap_or_else(|| serde_json::json!({}));
    state.world.test_reset(fixtures).await?;
    Ok(serde_json::json!({"reset": true}))
}

/// Deletes the character's current ship and any garrison they hold in that
/// ship's sector, removes them from their corporation's roster, and deletes
/// the character record. The event log (append-only, never pruned) is the
/// audit trail — this handler's own `character.deleted` emission is its
/// only record, there's no separate audit table in the store.
pub async fn character_delete(
    state: &Arc<AppState>,
    request_id: &RequestId,
    is_admin: bool,
    character_id: sector_mmo_common::ids::CharacterId,
) -> Result<Value, GameError> {
    if !is_admin {
        return Err(DispatchError::AuthForbidden.into());
    }
    let character = state.world.get_character(character_id).await?;

    if let Some(ship_id) = character.current_ship_id {
        if let Ok(ship) = state.world.get_ship(ship_id).await {
            if let Some(sector_id) = ship.current_sector {
                let garrisons = state.world.get_garrisons(sector_id).await?;
                if garrisons.iter().any(|g| g.owner_character_id == character_id) {
                    state.world.delete_garrison(sector_id, character_id).await?;
                }
            }
            state.world.delete_ship(ship_id).await?;
        }
    }

    if let Some(corporation_id) = character.corporation_id {
        if let Ok(mut corporation) = state.world.get_corporation(corporation_id).await {
            corporation.member_ids.retain(|id| *id != character_id);
            state.world.put_corporation(corporation).await?;
        }
    }

    state.world.delete_character(character_id).await?;

    emit(
        state,
        "character_delete",
        request_id,
        EventScope::Broadcast,
        "character.deleted",
        serde_json::json!({"character_id": character_id}),
        Some(character_id),
        None,
    )
    .await?;

    Ok(serde_json::json!({"deleted": true}))
}
