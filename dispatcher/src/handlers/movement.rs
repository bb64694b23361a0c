//! `join`, `move`, `my_status`, `list_known_ports`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use sector_mmo_common::commodity::{Commodity, PortCode, PortSide};
use sector_mmo_common::constants::MAX_KNOWN_PORTS_HOPS;
use sector_mmo_common::enums::{EventScope, ShipOwner};
use sector_mmo_common::errors::{DispatchError, GameError};
use sector_mmo_common::ids::{CharacterId, RequestId};
use sector_mmo_sector::{local_map_region, upsert_map_knowledge};
use sector_mmo_world::model::{Character, MapKnowledge, Ship};
use sector_mmo_world::{quote_port_prices, SectorSnapshot};

use crate::handlers::support::{emit, field_i64, field_opt_str, field_opt_u64, to_value};
use crate::state::AppState;

async fn snapshot_and_remember(
    state: &Arc<AppState>,
    character: &mut Character,
    sector_id: sector_mmo_common::ids::SectorId,
) -> Result<(SectorSnapshot, bool), GameError> {
    let snapshot = state.world.sector_snapshot(sector_id, Some(character.id)).await?;
    let first_visit = upsert_map_knowledge(
        &mut character.map_knowledge,
        sector_id,
        snapshot.adjacent_sectors.clone(),
        snapshot.position,
        Utc::now(),
        snapshot.port.as_ref().map(|p| p.port.code.clone()),
    );
    state.world.put_character(character.clone()).await?;
    Ok((snapshot, first_visit))
}

/// Binds a character to a ship and sector: on first contact this creates a
/// fresh pilot and starter ship at the home sector, otherwise it just
/// refreshes `last_active`. Either way, emits a status snapshot and the
/// local map region.
pub async fn join(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }

    let mut character = match state.world.get_character(character_id).await {
        Ok(mut character) => {
            character.last_active = Utc::now();
            character
        }
        Err(sector_mmo_common::errors::WorldError::NotFound(_)) => {
            new_pilot(state, character_id, extra).await?
        }
        Err(e) => return Err(e.into()),
    };
    state.world.put_character(character.clone()).await?;

    let ship_id = character
        .current_ship_id
        .ok_or_else(|| GameError::Fatal("joined character has no ship".to_string()))?;
    let ship = state.world.get_ship(ship_id).await?;
    let sector_id = ship
        .current_sector
        .ok_or_else(|| GameError::Fatal("joined character's ship has no sector".to_string()))?;

    let (_, first_visit) = snapshot_and_remember(state, &mut character, sector_id).await?;
    let status = state.world.status_payload(character_id).await?;
    let region = local_map_region(&character.map_knowledge, sector_id, MAX_KNOWN_PORTS_HOPS, 500);

    emit(
        state,
        "join",
        request_id,
        EventScope::Character { id: character_id },
        "status.snapshot",
        to_value(&status)?,
        Some(character_id),
        Some(sector_id),
    )
    .await?;
    emit(
        state,
        "join",
        request_id,
        EventScope::Character { id: character_id },
        "map.local",
        to_value(&region)?,
        Some(character_id),
        Some(sector_id),
    )
    .await?;

    Ok(serde_json::json!({"status": status, "first_visit": first_visit}))
}

async fn new_pilot(state: &Arc<AppState>, character_id: CharacterId, extra: &Value) -> Result<Character, GameError> {
    let display_name = field_opt_str(extra, "display_name")
        .unwrap_or("pilot")
        .to_string();
    let starter = state
        .world
        .list_ship_definitions()
        .await?
        .into_iter()
        .find(|d| !d.is_escape_pod)
        .ok_or_else(|| GameError::Fatal("no starter ship definition seeded".to_string()))?;

    let ship_id = Uuid::new_v4();
    state
        .world
        .put_ship(Ship {
            id: ship_id,
            definition_id: starter.id,
            display_name: format!("{display_name}'s {}", starter.display_name),
            owner: ShipOwner::Character { id: character_id },
            current_sector: Some(sector_mmo_common::constants::HOME_SECTOR),
            in_transit: false,
            transit_destination: None,
            transit_eta: None,
            credits: 0,
            cargo: Default::default(),
            warp_power: starter.max_warp_power,
            shields: starter.max_shields,
            fighters: 0,
            is_escape_pod: false,
        })
        .await?;

    Ok(Character {
        id: character_id,
        display_name,
        current_ship_id: Some(ship_id),
        bank_balance: 0,
        corporation_id: None,
        map_knowledge: MapKnowledge::default(),
        last_active: Utc::now(),
        is_npc: false,
        metadata: serde_json::json!({}),
    })
}

/// Emits a `status.snapshot` to the caller; no state is mutated.
pub async fn my_status(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let status = state.world.status_payload(character_id).await?;
    emit(
        state,
        "my_status",
        request_id,
        EventScope::Character { id: character_id },
        "status.snapshot",
        to_value(&status)?,
        Some(character_id),
        Some(status.sector.sector_id),
    )
    .await?;
    Ok(to_value(&status)?)
}

/// Requests adjacent-sector transit: deducts warp power immediately and
/// schedules the arrival as a durable continuation — the ship's
/// `in_transit`/`transit_eta` fields are the record of it, not an
/// in-memory timer.
pub async fn request_move(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let destination = field_i64(extra, "destination_sector_id")?;

    let character = state.world.get_character(character_id).await?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| DispatchError::Validation("character has no active ship".to_string()))?;
    let mut ship = state.world.get_ship(ship_id).await?;

    if ship.in_transit {
        return Err(DispatchError::ShipInTransit(ship_id).into());
    }
    let origin = ship
        .current_sector
        .ok_or_else(|| GameError::Fatal("ship has no current sector but isn't in transit".to_string()))?;
    let adjacency = state.world.sector_adjacency(origin).await?;
    if !adjacency.contains(&destination) {
        return Err(DispatchError::Validation(format!(
            "sector {destination} is not adjacent to {origin}"
        ))
        .into());
    }

    let definition = state.world.get_ship_definition(ship.definition_id).await?;
    let warp_cost = definition.warp_cost_per_jump;
    if ship.warp_power < warp_cost {
        return Err(DispatchError::Validation("insufficient warp power".to_string()).into());
    }

    let delay_secs = warp_cost
        .saturating_mul(state.config.move_delay_seconds_per_turn)
        .saturating_mul(state.config.move_delay_scale);
    let eta = Utc::now() + chrono::Duration::seconds(delay_secs as i64);

    ship.warp_power -= warp_cost;
    ship.in_transit = true;
    ship.transit_destination = Some(destination);
    ship.transit_eta = Some(eta);
    state.world.put_ship(ship).await?;

    emit(
        state,
        "move",
        request_id,
        EventScope::Character { id: character_id },
        "movement.start",
        serde_json::json!({"origin": origin, "destination": destination, "eta": eta}),
        Some(character_id),
        Some(origin),
    )
    .await?;
    emit(
        state,
        "move",
        request_id,
        EventScope::Sector { id: origin, exclude_actor: true },
        "character.moved",
        serde_json::json!({"character_id": character_id, "movement": "depart", "destination": destination}),
        Some(character_id),
        Some(origin),
    )
    .await?;

    let spawned_state = state.clone();
    let spawned_request_id = request_id.clone();
    tokio::spawn(async move {
        let wait = (eta - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        if let Err(e) = complete_transit(&spawned_state, &spawned_request_id, ship_id, origin, destination).await {
            log::warn!("scheduled arrival for ship {ship_id} failed: {e}");
        }
    });

    Ok(serde_json::json!({"origin": origin, "destination": destination, "eta": eta}))
}

/// Completes a pending transit if it's still pending at `origin` — shared
/// by the per-request scheduled continuation and the startup resumer that
/// catches transits whose process died mid-flight.
pub async fn complete_transit(
    state: &Arc<AppState>,
    request_id: &RequestId,
    ship_id: sector_mmo_common::ids::ShipId,
    origin: sector_mmo_common::ids::SectorId,
    destination: sector_mmo_common::ids::SectorId,
) -> Result<(), GameError> {
    if !state.world.complete_transit_if_pending(ship_id, origin, destination).await? {
        return Ok(());
    }

    let ship = state.world.get_ship(ship_id).await?;
    let ShipOwner::Character { id: character_id } = ship.owner else {
        return Ok(());
    };
    let mut character = state.world.get_character(character_id).await?;
    let (_, first_visit) = snapshot_and_remember(state, &mut character, destination).await?;
    let region = local_map_region(&character.map_knowledge, destination, MAX_KNOWN_PORTS_HOPS, 500);

    emit(
        state,
        "move",
        request_id,
        EventScope::Character { id: character_id },
        "movement.complete",
        serde_json::json!({"sector_id": destination, "first_visit": first_visit}),
        Some(character_id),
        Some(destination),
    )
    .await?;
    emit(
        state,
        "move",
        request_id,
        EventScope::Character { id: character_id },
        "map.local",
        to_value(&region)?,
        Some(character_id),
        Some(destination),
    )
    .await?;
    emit(
        state,
        "move",
        request_id,
        EventScope::Sector { id: destination, exclude_actor: true },
        "character.moved",
        serde_json::json!({"character_id": character_id, "movement": "arrive"}),
        Some(character_id),
        Some(destination),
    )
    .await?;
    Ok(())
}

/// BFS-bounded known-ports listing: visited sectors within `max_hops`
/// (capped at `MAX_KNOWN_PORTS_HOPS`) whose port still trades the
/// requested commodity/direction, with live prices.
pub async fn list_known_ports(
    state: &Arc<AppState>,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let character = state.world.get_character(character_id).await?;
    let center = character
        .map_knowledge
        .current_sector
        .ok_or_else(|| DispatchError::Validation("character has not visited any sector yet".to_string()))?;
    let max_hops = field_opt_u64(extra, "max_hops")
        .map(|h| h as u32)
        .unwrap_or(MAX_KNOWN_PORTS_HOPS)
        .min(MAX_KNOWN_PORTS_HOPS);
    let commodity_filter = field_opt_str(extra, "commodity").and_then(Commodity::from_code);
    let direction_filter = field_opt_str(extra, "trade_type").map(str::to_string);

    let region = local_map_region(&character.map_knowledge, center, max_hops, 500);
    let mut ports = Vec::new();
    for node in &region.visited {
        let contents = state.world.get_sector_contents(node.sector_id).await?;
        let Some(port_id) = contents.port_id else { continue };
        let port = state.world.get_port(port_id).await?;
        let code = PortCode::parse(&port.code);
        let mut prices = quote_port_prices(&port);
        if let Some(commodity) = commodity_filter {
            prices.retain(|p| p.commodity == commodity);
        }
        if let (Some(direction), Some(code)) = (&direction_filter, code) {
            prices.retain(|p| match direction.as_str() {
                "buy" => code.side(p.commodity) == PortSide::Buy,
                "sell" => code.side(p.commodity) == PortSide::Sell,
                _ => true,
            });
        }
        if prices.is_empty() {
            continue;
        }
        ports.push(serde_json::json!({
            "sector_id": node.sector_id,
            "hops": node.hops,
            "port_code": port.code,
            "prices": prices,
        }));
    }

    Ok(serde_json::json!({"ports": ports}))
}
