//! Garrison deployment and mode changes — standing sector garrisons,
//! separate from any active `CombatEncounter`.

use chrono::Utc;

use sector_mmo_common::enums::GarrisonMode;
use sector_mmo_common::errors::{DispatchError, GameError, WorldError};
use sector_mmo_common::ids::{CharacterId, SectorId};
use sector_mmo_world::model::Garrison;
use sector_mmo_world::WorldStore;

fn find_owned<'a>(garrisons: &'a [Garrison], owner: CharacterId) -> Option<&'a Garrison> {
    garrisons.iter().find(|g| g.owner_character_id == owner)
}

/// Moves `count` fighters off the character's current ship into a garrison
/// at the ship's sector, creating the garrison (in defensive mode) if the
/// character doesn't already have one there.
pub async fn leave_fighters(
    world: &dyn WorldStore,
    character_id: CharacterId,
    count: u64,
) -> Result<Garrison, GameError> {
    if count == 0 {
        return Err(DispatchError::Validation("count must be positive".to_string()).into());
    }

    let character = world.get_character(character_id).await?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| DispatchError::Validation("character has no active ship".to_string()))?;
    let mut ship = world.get_ship(ship_id).await?;

    if ship.in_transit {
        return Err(DispatchError::ShipInTransit(ship_id).into());
    }
    let sector_id = ship
        .current_sector
        .ok_or_else(|| DispatchError::Validation("ship is not in a sector".to_string()))?;
    if count > ship.fighters {
        return Err(DispatchError::Validation(format!(
            "only {} fighters aboard, requested {count}",
            ship.fighters
        ))
        .into());
    }

    ship.fighters -= count;
    world.put_ship(ship).await?;

    let garrisons = world.get_garrisons(sector_id).await?;
    let mut garrison = find_owned(&garrisons, character_id).cloned().unwrap_or(Garrison {
        sector_id,
        owner_character_id: character_id,
        fighters: 0,
        mode: GarrisonMode::Defensive,
        toll_amount: 0,
        toll_balance: 0,
        deployed_at: Utc::now(),
    });
    garrison.fighters += count;
    world.put_garrison(garrison.clone()).await?;
    Ok(garrison)
}

/// Changes the mode (and, for toll mode, the toll amount) of the
/// character's garrison in `sector_id`.
pub async fn set_garrison_mode(
    world: &dyn WorldStore,
    character_id: CharacterId,
    sector_id: SectorId,
    mode: GarrisonMode,
    toll_amount: Option<u64>,
) -> Result<Garrison, GameError> {
    let garrisons = world.get_garrisons(sector_id).await?;
    let mut garrison = find_owned(&garrisons, character_id)
        .cloned()
        .ok_or_else(|| {
            WorldError::NotFound(format!(
                "no garrison owned by {character_id} in sector {sector_id}"
            ))
        })?;
    garrison.mode = mode;
    if let Some(amount) = toll_amount {
        garrison.toll_amount = amount;
    }
    world.put_garrison(garrison.clone()).await?;
    Ok(garrison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::enums::ShipOwner;
    use sector_mmo_world::model::{Character, MapKnowledge, Sector, Ship};
    use sector_mmo_world::MemoryWorldStore;
    use uuid::Uuid;

    fn seed_pilot(store: &MemoryWorldStore, fighters: u64) -> CharacterId {
        let character_id = Uuid::new_v4();
        let ship_id = Uuid::new_v4();
        store.seed_character(Character {
            id: character_id,
            display_name: "pilot".into(),
            current_ship_id: Some(ship_id),
            bank_balance: 0,
            corporation_id: None,
            map_knowledge: MapKnowledge::default(),
            last_active: Utc::now(),
            is_npc: false,
            metadata: serde_json::json!({}),
        });
        store.seed_ship(Ship {
            id: ship_id,
            definition_id: Uuid::new_v4(),
            display_name: "Kestrel".into(),
            owner: ShipOwner::Character { id: character_id },
            current_sector: Some(0),
            in_transit: false,
            transit_destination: None,
            transit_eta: None,
            credits: 0,
            cargo: Default::default(),
            warp_power: 100,
            shields: 0,
            fighters,
            is_escape_pod: false,
        });
        character_id
    }

    #[tokio::test]
    async fn leaving_fighters_creates_a_garrison() {
        let store = MemoryWorldStore::new();
        store.seed_sector(Sector { id: 0, x: 0, y: 0, region_tag: "core".into(), edges: vec![] });
        let character_id = seed_pilot(&store, 100);

        let garrison = leave_fighters(&store, character_id, 40).await.unwrap();
        assert_eq!(garrison.fighters, 40);
        let ship_id = store.get_character(character_id).await.unwrap().current_ship_id.unwrap();
        assert_eq!(store.get_ship(ship_id).await.unwrap().fighters, 60);
    }

    #[tokio::test]
    async fn cannot_leave_more_fighters_than_aboard() {
        let store = MemoryWorldStore::new();
        store.seed_sector(Sector { id: 0, x: 0, y: 0, region_tag: "core".into(), edges: vec![] });
        let character_id = seed_pilot(&store, 10);
        assert!(leave_fighters(&store, character_id, 11).await.is_err());
    }

    #[tokio::test]
    async fn set_mode_requires_existing_garrison() {
        let store = MemoryWorldStore::new();
        store.seed_sector(Sector { id: 0, x: 0, y: 0, region_tag: "core".into(), edges: vec![] });
        let character_id = seed_pilot(&store, 10);
        let result = set_garrison_mode(&store, character_id, 0, GarrisonMode::Offensive, None).await;
        assert!(result.is_err());

        leave_fighters(&store, character_id, 5).await.unwrap();
        let garrison = set_garrison_mode(&store, character_id, 0, GarrisonMode::Offensive, None)
            .await
            .unwrap();
        assert_eq!(garrison.mode, GarrisonMode::Offensive);
    }
}
