//! Finalization: once an encounter's `end_state` is non-null, turn the
//! wreckage into salvage and settle ship/character ownership.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use sector_mmo_common::constants::{SALVAGE_CREDITS_PCT, SALVAGE_EXPIRY_SECS};
use sector_mmo_common::enums::CombatantKind;
use sector_mmo_common::errors::CombatError;
use sector_mmo_common::ids::CharacterId;
use sector_mmo_world::catalog;
use sector_mmo_world::model::{CombatEncounter, ParticipantId, SalvageEntry};
use sector_mmo_world::WorldStore;

use crate::model::{CharacterCombatView, FinalizationOutcome};

/// Destroyed (fighters-depleted) character participants, excluding fled or
/// still-alive combatants.
fn destroyed_characters(encounter: &CombatEncounter) -> Vec<CharacterId> {
    encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, CombatantKind::Character))
        .filter(|p| p.removed && p.fighters == 0)
        .filter_map(|p| match p.participant_id {
            ParticipantId::Character(id) => Some(id),
            _ => None,
        })
        .collect()
}

/// Every character participant's ship-local view: destroyed
/// (removed, no fighters left), fled (removed, fighters survived), or
/// simply the survivor's final tallies.
fn character_views(encounter: &CombatEncounter) -> Vec<CharacterCombatView> {
    encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, CombatantKind::Character))
        .filter_map(|p| match p.participant_id {
            ParticipantId::Character(character_id) => Some(CharacterCombatView {
                character_id,
                destroyed: p.removed && p.fighters == 0,
                fled: p.removed && p.fighters > 0,
                fighters_remaining: p.fighters,
                shields_remaining: p.shields,
            }),
            _ => None,
        })
        .collect()
}

/// Applies the consequences of a finished encounter: salvage generation,
/// ship disposition for destroyed characters, and the sector's
/// `active_combat_id` is cleared. Must be called after `encounter.ended` is
/// set and the encounter has already been persisted.
pub async fn finalize(
    world: &Arc<dyn WorldStore>,
    encounter: &CombatEncounter,
) -> Result<FinalizationOutcome, CombatError> {
    let end_state = encounter
        .end_state
        .ok_or_else(|| CombatError::InvalidAction("encounter has no end_state".to_string()))?;

    let destroyed = destroyed_characters(encounter);

    for character_id in &destroyed {
        if let Err(e) = settle_destroyed_character(world, encounter, *character_id).await {
            return Err(CombatError::InvalidAction(e.to_string()));
        }
    }

    let mut contents = world
        .get_sector_contents(encounter.sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
    if contents.active_combat_id == Some(encounter.combat_id) {
        contents.active_combat_id = None;
        world
            .put_sector_contents(contents)
            .await
            .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
    }

    Ok(FinalizationOutcome {
        combat_id: encounter.combat_id,
        sector_id: encounter.sector_id,
        end_state,
        destroyed_characters: destroyed,
        character_views: character_views(encounter),
    })
}

async fn settle_destroyed_character(
    world: &Arc<dyn WorldStore>,
    encounter: &CombatEncounter,
    character_id: CharacterId,
) -> Result<(), sector_mmo_common::errors::WorldError> {
    let mut character = world.get_character(character_id).await?;
    let Some(ship_id) = character.current_ship_id else {
        return Ok(());
    };
    let mut ship = world.get_ship(ship_id).await?;
    let now = Utc::now();

    let scrap = ship.cargo.total();
    let salvage_credits = ship.credits * SALVAGE_CREDITS_PCT / 100;

    if !ship.is_escape_pod {
        let salvage = SalvageEntry {
            id: Uuid::new_v4(),
            sector_id: encounter.sector_id,
            cargo: ship.cargo.clone(),
            scrap,
            credits: salvage_credits,
            created_at: now,
            expires_at: now + Duration::seconds(SALVAGE_EXPIRY_SECS),
            claimed: false,
        };
        world.put_salvage(salvage).await?;

        ship.definition_id = catalog::bare_escape_pod().id;
        ship.cargo = Default::default();
        ship.credits = 0;
        ship.fighters = 0;
        ship.shields = 0;
        ship.is_escape_pod = true;
        ship.current_sector = Some(encounter.sector_id);
        ship.in_transit = false;
        world.put_ship(ship).await?;
    } else {
        let salvage = SalvageEntry {
            id: Uuid::new_v4(),
            sector_id: encounter.sector_id,
            cargo: ship.cargo.clone(),
            scrap,
            credits: salvage_credits,
            created_at: now,
            expires_at: now + Duration::seconds(SALVAGE_EXPIRY_SECS),
            claimed: false,
        };
        world.put_salvage(salvage).await?;
        world.delete_ship(ship.id).await?;

        let new_ship_id = Uuid::new_v4();
        let fresh = sector_mmo_world::model::Ship {
            id: new_ship_id,
            definition_id: catalog::bare_escape_pod().id,
            display_name: "Escape Pod".to_string(),
            owner: sector_mmo_common::enums::ShipOwner::Character { id: character_id },
            current_sector: Some(encounter.sector_id),
            in_transit: false,
            transit_destination: None,
            transit_eta: None,
            credits: 0,
            cargo: Default::default(),
            warp_power: catalog::bare_escape_pod().max_warp_power,
            shields: 0,
            fighters: 0,
            is_escape_pod: true,
        };
        world.put_ship(fresh).await?;
        character.current_ship_id = Some(new_ship_id);
    }

    character.last_active = now;
    world.put_character(character).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::enums::EndState;
    use sector_mmo_world::model::{CombatContext, CombatantState, Character, MapKnowledge, Sector, Ship};
    use sector_mmo_world::MemoryWorldStore;

    fn seed_destroyed_character(store: &MemoryWorldStore) -> CharacterId {
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
            owner: sector_mmo_common::enums::ShipOwner::Character { id: character_id },
            current_sector: Some(0),
            in_transit: false,
            transit_destination: None,
            transit_eta: None,
            credits: 1000,
            cargo: Default::default(),
            warp_power: 100,
            shields: 0,
            fighters: 0,
            is_escape_pod: false,
        });
        character_id
    }

    #[tokio::test]
    async fn destroyed_character_ship_becomes_escape_pod() {
        let memory = MemoryWorldStore::new();
        memory.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        let character_id = seed_destroyed_character(&memory);
        let store: Arc<dyn WorldStore> = Arc::new(memory);
        let mut contents = store.get_sector_contents(0).await.unwrap();
        contents.active_combat_id = Some(Uuid::nil());
        store.put_sector_contents(contents).await.unwrap();

        let now = Utc::now();
        let encounter = CombatEncounter {
            combat_id: Uuid::nil(),
            sector_id: 0,
            round: 3,
            deadline: None,
            base_seed: 1,
            ended: true,
            end_state: Some(EndState::DestroyedAll),
            participants: vec![CombatantState {
                participant_id: ParticipantId::Character(character_id),
                kind: CombatantKind::Character,
                display_name: "pilot".into(),
                corporation_id: None,
                ship_id: None,
                fighters: 0,
                shields: 0,
                is_escape_pod: false,
                removed: true,
                garrison_mode: None,
            }],
            pending_actions: Vec::new(),
            awaiting_resolution: false,
            toll_registry: Vec::new(),
            context: CombatContext {
                initiator: character_id,
                created_at: now,
                garrison_sources: Vec::new(),
            },
            log: Vec::new(),
            last_updated: now,
        };

        let outcome = finalize(&store, &encounter).await.unwrap();
        assert_eq!(outcome.destroyed_characters, vec![character_id]);

        let character = store.get_character(character_id).await.unwrap();
        let ship = store.get_ship(character.current_ship_id.unwrap()).await.unwrap();
        assert!(ship.is_escape_pod);
    }
}
