//! `combat_initiate`, `combat_action`, `combat_tick`, `combat_leave_fighters`,
//! `combat_set_garrison_mode`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use sector_mmo_common::enums::{ActionKind, EventScope, GarrisonMode};
use sector_mmo_common::errors::{CombatError, DispatchError, GameError};
use sector_mmo_common::ids::{CharacterId, RequestId};

use crate::handlers::support::{
    emit, field_character_id, field_i64, field_opt_i64, field_opt_u64, field_str, to_value,
};
use crate::state::AppState;

async fn actor_sector(state: &Arc<AppState>, character_id: CharacterId) -> Result<sector_mmo_common::ids::SectorId, GameError> {
    let character = state.world.get_character(character_id).await?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| DispatchError::Validation("character has no active ship".to_string()))?;
    let ship = state.world.get_ship(ship_id).await?;
    ship.current_sector
        .ok_or_else(|| DispatchError::ShipInTransit(ship_id).into())
}

pub async fn combat_initiate(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let encounter = sector_mmo_combat::initiate(&state.world, character_id).await?;

    emit(
        state,
        "combat_initiate",
        request_id,
        EventScope::Sector { id: encounter.sector_id, exclude_actor: false },
        "combat.round_waiting",
        serde_json::json!({"combat_id": encounter.combat_id, "round": encounter.round}),
        Some(character_id),
        Some(encounter.sector_id),
    )
    .await?;

    Ok(serde_json::json!({"combat_id": encounter.combat_id, "round": encounter.round}))
}

/// Applies `actor`'s action to the un-ended encounter in their sector, and
/// resolves the round if everyone is ready. Retries once on an optimistic
/// concurrency loss, per the single-retry rule for action/tick races.
pub async fn combat_action(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let action: ActionKind = serde_json::from_value(
        Value::String(field_str(extra, "action")?.to_string()),
    )
    .map_err(|_| DispatchError::Validation("unknown action kind".to_string()))?;
    let commit = field_opt_u64(extra, "commit").unwrap_or(0);
    let target = match extra.get("target_character_id") {
        Some(_) => Some(field_character_id(&state.config, extra, "target_character_id")?),
        None => None,
    };
    let destination = field_opt_i64(extra, "destination_sector_id");

    let sector_id = actor_sector(state, character_id).await?;

    for attempt in 0..2 {
        let mut encounter = state
            .world
            .find_active_combat_in_sector(sector_id)
            .await?
            .ok_or_else(|| DispatchError::Validation("no active encounter in this sector".to_string()))?;
        let expected = encounter.last_updated;

        sector_mmo_combat::submit_action(
            &state.world,
            &mut encounter,
            character_id,
            action,
            commit,
            target,
            destination,
        )
        .await?;

        let ready = sector_mmo_combat::ready_to_resolve(&encounter, Utc::now());
        let outcome = if ready {
            Some(sector_mmo_combat::resolve_round(&state.world, &mut encounter).await?)
        } else {
            None
        };

        if !state
            .world
            .put_combat_encounter_if_unchanged(encounter.clone(), expected)
            .await?
        {
            if attempt == 0 {
                continue;
            }
            return Err(CombatError::StaleWrite(encounter.combat_id).into());
        }

        if let Some(outcome) = outcome {
            let finalization = if encounter.ended {
                Some(sector_mmo_combat::finalize(&state.world, &encounter).await?)
            } else {
                None
            };

            sector_mmo_combat::broadcast_round(
                &state.events,
                "combat_action",
                &request_id.to_string(),
                &encounter,
                &outcome,
                finalization.as_ref(),
            )
            .await?;
        }

        return Ok(serde_json::json!({
            "combat_id": encounter.combat_id,
            "round": encounter.round,
            "ended": encounter.ended,
        }));
    }

    unreachable!("loop returns or errors on every iteration");
}

/// Admin-only: forces one pass of the deadline tick loop instead of waiting
/// for the background task's next interval. Useful for tests that need
/// deterministic resolution timing.
pub async fn combat_tick(state: &Arc<AppState>, is_admin: bool) -> Result<Value, GameError> {
    if !is_admin {
        return Err(DispatchError::AuthForbidden.into());
    }
    sector_mmo_combat::run_due_encounters(&state.world, &state.events).await;
    Ok(serde_json::json!({"ticked": true}))
}

pub async fn combat_leave_fighters(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let count = field_opt_u64(extra, "count")
        .ok_or_else(|| DispatchError::Validation("missing or invalid field 'count'".to_string()))?;
    let garrison = sector_mmo_combat::leave_fighters(state.world.as_ref(), character_id, count).await?;

    emit(
        state,
        "combat_leave_fighters",
        request_id,
        EventScope::Sector { id: garrison.sector_id, exclude_actor: false },
        "garrison.deployed",
        to_value(&garrison)?,
        Some(character_id),
        Some(garrison.sector_id),
    )
    .await?;

    Ok(to_value(&garrison)?)
}

pub async fn combat_set_garrison_mode(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let sector_id = field_i64(extra, "sector_id")?;
    let mode: GarrisonMode = serde_json::from_value(Value::String(field_str(extra, "mode")?.to_string()))
        .map_err(|_| DispatchError::Validation("unknown garrison mode".to_string()))?;
    let toll_amount = field_opt_u64(extra, "toll_amount");

    let garrison = sector_mmo_combat::set_garrison_mode(state.world.as_ref(), character_id, sector_id, mode, toll_amount)
        .await?;

    emit(
        state,
        "combat_set_garrison_mode",
        request_id,
        EventScope::Sector { id: sector_id, exclude_actor: false },
        "garrison.mode_changed",
        to_value(&garrison)?,
        Some(character_id),
        Some(sector_id),
    )
    .await?;

    if mode == GarrisonMode::Offensive {
        if let Some(encounter) =
            sector_mmo_combat::initiate_from_garrison(&state.world, sector_id, character_id).await?
        {
            emit(
                state,
                "combat_set_garrison_mode",
                request_id,
                EventScope::Sector { id: sector_id, exclude_actor: false },
                "combat.round_waiting",
                serde_json::json!({"combat_id": encounter.combat_id, "round": encounter.round}),
                Some(character_id),
                Some(sector_id),
            )
            .await?;
        }
    }

    Ok(to_value(&garrison)?)
}
