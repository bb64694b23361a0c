//! `bank_transfer`, `transfer_credits`, `transfer_warp_power`,
//! `purchase_fighters`, `ship_purchase`, `dump_cargo`, `salvage_collect`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use sector_mmo_common::commodity::{Commodity, CommodityAmounts};
use sector_mmo_common::constants::{
    FIGHTER_TRADE_IN_REFUND_PCT, FIGHTER_UNIT_PRICE_CREDITS, HOME_SECTOR, SALVAGE_EXPIRY_SECS,
};
use sector_mmo_common::enums::{EventScope, ShipOwner};
use sector_mmo_common::errors::{DispatchError, GameError};
use sector_mmo_common::ids::{CharacterId, RequestId};
use sector_mmo_world::model::{Ship, ShipDefinition};

use crate::handlers::support::{emit, field_character_id, field_str, field_u64, to_value};
use crate::state::AppState;

async fn actor_ship(state: &Arc<AppState>, character_id: CharacterId) -> Result<(sector_mmo_world::model::Character, Ship), GameError> {
    let character = state.world.get_character(character_id).await?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| DispatchError::Validation("character has no active ship".to_string()))?;
    let ship = state.world.get_ship(ship_id).await?;
    if ship.in_transit {
        return Err(DispatchError::ShipInTransit(ship_id).into());
    }
    Ok((character, ship))
}

fn require_home_sector(ship: &Ship) -> Result<(), GameError> {
    if ship.current_sector != Some(HOME_SECTOR) {
        return Err(DispatchError::Validation(format!(
            "this operation is only available at sector {HOME_SECTOR}"
        ))
        .into());
    }
    Ok(())
}

pub async fn bank_transfer(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let direction = field_str(extra, "direction")?;
    let amount = field_u64(extra, "amount")?;

    let (mut character, mut ship) = actor_ship(state, character_id).await?;
    require_home_sector(&ship)?;

    match direction {
        "deposit" => {
            if ship.credits < amount {
                return Err(DispatchError::Validation("insufficient ship credits".to_string()).into());
            }
            ship.credits -= amount;
            character.bank_balance += amount;
        }
        "withdraw" => {
            if character.bank_balance < amount {
                return Err(DispatchError::Validation("insufficient bank balance".to_string()).into());
            }
            character.bank_balance -= amount;
            ship.credits += amount;
        }
        other => {
            return Err(DispatchError::Validation(format!("unknown direction '{other}'")).into());
        }
    }

    state.world.put_ship(ship).await?;
    state.world.put_character(character.clone()).await?;
    let status = state.world.status_payload(character_id).await?;

    emit(
        state,
        "bank_transfer",
        request_id,
        EventScope::Character { id: character_id },
        "bank.transaction",
        serde_json::json!({"direction": direction, "amount": amount}),
        Some(character_id),
        Some(HOME_SECTOR),
    )
    .await?;
    emit(
        state,
        "bank_transfer",
        request_id,
        EventScope::Character { id: character_id },
        "status.update",
        to_value(&status)?,
        Some(character_id),
        Some(HOME_SECTOR),
    )
    .await?;

    Ok(serde_json::json!({"bank_balance": character.bank_balance}))
}

async fn same_sector_ships(
    state: &Arc<AppState>,
    actor_character: CharacterId,
    other_character: CharacterId,
) -> Result<(Ship, Ship), GameError> {
    let (_, ship_a) = actor_ship(state, actor_character).await?;
    let (_, ship_b) = actor_ship(state, other_character).await?;
    if ship_a.current_sector.is_none() || ship_a.current_sector != ship_b.current_sector {
        return Err(DispatchError::Validation("both pilots must be in the same sector".to_string()).into());
    }
    Ok((ship_a, ship_b))
}

pub async fn transfer_credits(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let to_character_id = field_character_id(&state.config, extra, "to_character_id")?;
    let amount = field_u64(extra, "amount")?;
    if to_character_id == character_id {
        return Err(DispatchError::Validation("cannot transfer to self".to_string()).into());
    }

    let (mut from_ship, mut to_ship) = same_sector_ships(state, character_id, to_character_id).await?;
    if from_ship.credits < amount {
        return Err(DispatchError::Validation("insufficient credits".to_string()).into());
    }
    from_ship.credits -= amount;
    to_ship.credits += amount;
    state.world.put_ship(from_ship).await?;
    state.world.put_ship(to_ship).await?;

    let payload = serde_json::json!({"from": character_id, "to": to_character_id, "amount": amount});
    emit(
        state,
        "transfer_credits",
        request_id,
        EventScope::Character { id: character_id },
        "credits.transfer",
        payload.clone(),
        Some(character_id),
        None,
    )
    .await?;
    emit(
        state,
        "transfer_credits",
        request_id,
        EventScope::Character { id: to_character_id },
        "credits.transfer",
        payload,
        Some(character_id),
        None,
    )
    .await?;

    Ok(serde_json::json!({"transferred": amount}))
}

pub async fn transfer_warp_power(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let to_character_id = field_character_id(&state.config, extra, "to_character_id")?;
    let amount = field_u64(extra, "amount")?;
    if to_character_id == character_id {
        return Err(DispatchError::Validation("cannot transfer to self".to_string()).into());
    }

    let (mut from_ship, mut to_ship) = same_sector_ships(state, character_id, to_character_id).await?;
    if from_ship.warp_power < amount {
        return Err(DispatchError::Validation("insufficient warp power".to_string()).into());
    }
    let to_definition = state.world.get_ship_definition(to_ship.definition_id).await?;
    if to_ship.warp_power + amount > to_definition.max_warp_power {
        return Err(DispatchError::Validation("would exceed recipient's warp power capacity".to_string()).into());
    }
    from_ship.warp_power -= amount;
    to_ship.warp_power += amount;
    state.world.put_ship(from_ship).await?;
    state.world.put_ship(to_ship).await?;

    let payload = serde_json::json!({"from": character_id, "to": to_character_id, "amount": amount});
    emit(
        state,
        "transfer_warp_power",
        request_id,
        EventScope::Character { id: character_id },
        "warp.transfer",
        payload.clone(),
        Some(character_id),
        None,
    )
    .await?;
    emit(
        state,
        "transfer_warp_power",
        request_id,
        EventScope::Character { id: to_character_id },
        "warp.transfer",
        payload,
        Some(character_id),
        None,
    )
    .await?;

    Ok(serde_json::json!({"transferred": amount}))
}

pub async fn purchase_fighters(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let count = field_u64(extra, "count")?;
    if count == 0 {
        return Err(DispatchError::Validation("count must be positive".to_string()).into());
    }

    let (_, mut ship) = actor_ship(state, character_id).await?;
    require_home_sector(&ship)?;
    let definition = state.world.get_ship_definition(ship.definition_id).await?;

    let cost = count.saturating_mul(FIGHTER_UNIT_PRICE_CREDITS);
    if ship.credits < cost {
        return Err(DispatchError::Validation("insufficient credits".to_string()).into());
    }
    if ship.fighters + count > definition.max_fighters {
        return Err(DispatchError::Validation("would exceed the ship's fighter capacity".to_string()).into());
    }

    ship.credits -= cost;
    ship.fighters += count;
    state.world.put_ship(ship).await?;
    let status = state.world.status_payload(character_id).await?;

    emit(
        state,
        "purchase_fighters",
        request_id,
        EventScope::Character { id: character_id },
        "fighter.purchase",
        serde_json::json!({"count": count, "cost": cost}),
        Some(character_id),
        Some(HOME_SECTOR),
    )
    .await?;
    emit(
        state,
        "purchase_fighters",
        request_id,
        EventScope::Character { id: character_id },
        "status.update",
        to_value(&status)?,
        Some(character_id),
        Some(HOME_SECTOR),
    )
    .await?;

    Ok(serde_json::json!({"fighters": status.ship.fighters, "credits": status.ship.credits}))
}

pub async fn ship_purchase(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let definition_id = Uuid::parse_str(field_str(extra, "ship_definition_id")?)
        .map_err(|_| DispatchError::Validation("ship_definition_id is not a valid uuid".to_string()))?;
    let new_definition: ShipDefinition = state.world.get_ship_definition(definition_id).await?;

    let (mut character, old_ship) = actor_ship(state, character_id).await?;
    require_home_sector(&old_ship)?;
    if old_ship.cargo.total() > new_definition.cargo_holds {
        return Err(DispatchError::Validation(
            "current cargo won't fit the new hull — dump cargo first".to_string(),
        )
        .into());
    }

    let fighter_refund = old_ship
        .fighters
        .saturating_mul(FIGHTER_UNIT_PRICE_CREDITS)
        .saturating_mul(FIGHTER_TRADE_IN_REFUND_PCT)
        / 100;
    let cost = new_definition.purchase_price.saturating_sub(fighter_refund);
    if old_ship.credits < cost {
        return Err(DispatchError::Validation("insufficient credits for trade-in".to_string()).into());
    }

    let owner = match extra.get("corporation_id").and_then(Value::as_str) {
        Some(raw) => {
            let corporation_id = Uuid::parse_str(raw)
                .map_err(|_| DispatchError::Validation("corporation_id is not a valid uuid".to_string()))?;
            if character.corporation_id != Some(corporation_id) {
                return Err(DispatchError::NotCorporationMember(corporation_id).into());
            }
            ShipOwner::Corporation { id: corporation_id }
        }
        None => ShipOwner::Character { id: character_id },
    };

    let new_ship_id = Uuid::new_v4();
    let new_ship = Ship {
        id: new_ship_id,
        definition_id,
        display_name: new_definition.display_name.clone(),
        owner,
        current_sector: old_ship.current_sector,
        in_transit: false,
        transit_destination: None,
        transit_eta: None,
        credits: old_ship.credits - cost,
        cargo: old_ship.cargo,
        warp_power: new_definition.max_warp_power,
        shields: new_definition.max_shields,
        fighters: 0,
        is_escape_pod: new_definition.is_escape_pod,
    };
    state.world.put_ship(new_ship).await?;
    state.world.delete_ship(old_ship.id).await?;

    character.current_ship_id = Some(new_ship_id);
    state.world.put_character(character.clone()).await?;
    let status = state.world.status_payload(character_id).await?;

    emit(
        state,
        "ship_purchase",
        request_id,
        EventScope::Character { id: character_id },
        "ship.purchased",
        serde_json::json!({"ship_definition_id": definition_id, "cost": cost, "fighter_refund": fighter_refund}),
        Some(character_id),
        old_ship.current_sector,
    )
    .await?;
    emit(
        state,
        "ship_purchase",
        request_id,
        EventScope::Character { id: character_id },
        "status.update",
        to_value(&status)?,
        Some(character_id),
        old_ship.current_sector,
    )
    .await?;

    Ok(serde_json::json!({"ship_id": new_ship_id, "cost": cost}))
}

pub async fn dump_cargo(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let commodity = Commodity::from_code(field_str(extra, "commodity")?)
        .ok_or_else(|| DispatchError::Validation("unknown commodity code".to_string()))?;
    let amount = field_u64(extra, "amount")?;

    let (_, mut ship) = actor_ship(state, character_id).await?;
    let sector_id = ship
        .current_sector
        .ok_or_else(|| DispatchError::Validation("ship is not in a sector".to_string()))?;
    let current = ship.cargo.get(commodity);
    if amount == 0 || amount > current {
        return Err(DispatchError::Validation("amount exceeds cargo aboard".to_string()).into());
    }
    ship.cargo.set(commodity, current - amount);
    state.world.put_ship(ship).await?;

    let mut dumped = CommodityAmounts::default();
    dumped.set(commodity, amount);
    let now = Utc::now();
    let salvage = sector_mmo_world::model::SalvageEntry {
        id: Uuid::new_v4(),
        sector_id,
        cargo: dumped,
        scrap: 0,
        credits: 0,
        created_at: now,
        expires_at: now + chrono::Duration::seconds(SALVAGE_EXPIRY_SECS),
        claimed: false,
    };
    state.world.put_salvage(salvage.clone()).await?;
    let mut contents = state.world.get_sector_contents(sector_id).await?;
    contents.salvage.push(salvage.id);
    state.world.put_sector_contents(contents).await?;

    emit(
        state,
        "dump_cargo",
        request_id,
        EventScope::Sector { id: sector_id, exclude_actor: false },
        "sector.update",
        serde_json::json!({"salvage_id": salvage.id, "commodity": commodity.code(), "amount": amount}),
        Some(character_id),
        Some(sector_id),
    )
    .await?;

    Ok(serde_json::json!({"salvage_id": salvage.id}))
}

pub async fn salvage_collect(
    state: &Arc<AppState>,
    request_id: &RequestId,
    actor: CharacterId,
    character_id: CharacterId,
    extra: &Value,
) -> Result<Value, GameError> {
    if actor != character_id {
        return Err(DispatchError::AuthForbidden.into());
    }
    let salvage_id = Uuid::parse_str(field_str(extra, "salvage_id")?)
        .map_err(|_| DispatchError::Validation("salvage_id is not a valid uuid".to_string()))?;

    let (_, mut ship) = actor_ship(state, character_id).await?;
    let sector_id = ship
        .current_sector
        .ok_or_else(|| DispatchError::Validation("ship is not in a sector".to_string()))?;
    let salvage = state.world.get_salvage(salvage_id).await?;
    if salvage.claimed || salvage.expires_at <= Utc::now() || salvage.sector_id != sector_id {
        return Err(DispatchError::SalvageUnavailable(salvage_id).into());
    }
    if ship.cargo.total() + salvage.cargo.total() > cargo_capacity(state, &ship).await? {
        return Err(DispatchError::Validation("insufficient cargo space for salvage".to_string()).into());
    }

    ship.cargo = ship.cargo.saturating_add(&salvage.cargo);
    ship.credits += salvage.credits + salvage.scrap;
    state.world.put_ship(ship).await?;
    state.world.delete_salvage(salvage_id).await?;

    let mut contents = state.world.get_sector_contents(sector_id).await?;
    contents.salvage.retain(|id| *id != salvage_id);
    state.world.put_sector_contents(contents).await?;

    emit(
        state,
        "salvage_collect",
        request_id,
        EventScope::Sector { id: sector_id, exclude_actor: false },
        "sector.update",
        serde_json::json!({"salvage_id": salvage_id, "collected_by": character_id}),
        Some(character_id),
        Some(sector_id),
    )
    .await?;

    Ok(serde_json::json!({"salvage_id": salvage_id}))
}

async fn cargo_capacity(state: &Arc<AppState>, ship: &Ship) -> Result<u64, GameError> {
    Ok(state.world.get_ship_definition(ship.definition_id).await?.cargo_holds)
}
