//! CombatInitiate: find-or-join the sector's encounter, or create one.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use sector_mmo_common::errors::CombatError;
use sector_mmo_common::ids::{CharacterId, SectorId};
use sector_mmo_common::rng::base_seed_from_combat_id;
use sector_mmo_world::model::{
    CombatContext, CombatEncounter, CombatantState, ParticipantId,
};
use sector_mmo_world::WorldStore;

use crate::round_timeout;

fn combatant_from_character(
    character: &sector_mmo_world::model::Character,
    ship: &sector_mmo_world::model::Ship,
) -> CombatantState {
    CombatantState {
        participant_id: ParticipantId::Character(character.id),
        kind: sector_mmo_common::enums::CombatantKind::Character,
        display_name: character.display_name.clone(),
        corporation_id: character.corporation_id,
        ship_id: Some(ship.id),
        fighters: ship.fighters,
        shields: ship.shields,
        is_escape_pod: ship.is_escape_pod,
        removed: false,
        garrison_mode: None,
    }
}

fn combatant_from_garrison(garrison: &sector_mmo_world::model::Garrison) -> CombatantState {
    CombatantState {
        participant_id: ParticipantId::Garrison {
            sector_id: garrison.sector_id,
            owner_character_id: garrison.owner_character_id,
        },
        kind: sector_mmo_common::enums::CombatantKind::Garrison,
        display_name: format!("garrison-{}", garrison.owner_character_id),
        corporation_id: None,
        ship_id: None,
        fighters: garrison.fighters,
        shields: 0,
        is_escape_pod: false,
        removed: false,
        garrison_mode: Some(garrison.mode),
    }
}

/// Gathers every character (not in transit) and garrison present in
/// `sector_id` as combatants, for a brand-new encounter.
async fn gather_participants(
    world: &Arc<dyn WorldStore>,
    sector_id: SectorId,
) -> Result<(Vec<CombatantState>, Vec<ParticipantId>), CombatError> {
    let mut participants = Vec::new();
    for other in world
        .characters_in_sector(sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?
    {
        if let Some(other_ship_id) = other.current_ship_id {
            if let Ok(other_ship) = world.get_ship(other_ship_id).await {
                participants.push(combatant_from_character(&other, &other_ship));
            }
        }
    }
    let mut garrison_sources = Vec::new();
    for garrison in world
        .get_garrisons(sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?
    {
        let participant_id = ParticipantId::Garrison {
            sector_id: garrison.sector_id,
            owner_character_id: garrison.owner_character_id,
        };
        garrison_sources.push(participant_id);
        participants.push(combatant_from_garrison(&garrison));
    }
    Ok((participants, garrison_sources))
}

/// Creates and persists a brand-new encounter in `sector_id`, attributing
/// it to `initiator`. Requires at least two distinct participants
/// (characters not in transit, plus any garrisons).
async fn create_encounter(
    world: &Arc<dyn WorldStore>,
    sector_id: SectorId,
    initiator: CharacterId,
) -> Result<CombatEncounter, CombatError> {
    let (participants, garrison_sources) = gather_participants(world, sector_id).await?;
    if participants.len() < 2 {
        return Err(CombatError::InsufficientParticipants);
    }

    let combat_id = Uuid::new_v4();
    let base_seed = base_seed_from_combat_id(combat_id);
    let now = Utc::now();
    let encounter = CombatEncounter {
        combat_id,
        sector_id,
        round: 1,
        deadline: Some(now + round_timeout()),
        base_seed,
        ended: false,
        end_state: None,
        participants,
        pending_actions: Vec::new(),
        awaiting_resolution: false,
        toll_registry: Vec::new(),
        context: CombatContext {
            initiator,
            created_at: now,
            garrison_sources,
        },
        log: Vec::new(),
        last_updated: now,
    };

    world
        .put_combat_encounter(encounter.clone())
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;

    let mut contents = world
        .get_sector_contents(sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
    contents.active_combat_id = Some(combat_id);
    world
        .put_sector_contents(contents)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;

    Ok(encounter)
}

/// Find-or-create the un-ended encounter in the actor's sector. Requires at
/// least two distinct participants (characters not in transit, plus any
/// garrisons) on first creation.
pub async fn initiate(
    world: &Arc<dyn WorldStore>,
    actor: CharacterId,
) -> Result<CombatEncounter, CombatError> {
    let character = world
        .get_character(actor)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
    let ship_id = character
        .current_ship_id
        .ok_or_else(|| CombatError::InvalidAction("actor has no ship".to_string()))?;
    let ship = world
        .get_ship(ship_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
    let sector_id: SectorId = ship
        .current_sector
        .ok_or_else(|| CombatError::InvalidAction("actor's ship is in transit".to_string()))?;

    if let Some(mut existing) = world
        .find_active_combat_in_sector(sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?
    {
        if existing.participant(ParticipantId::Character(actor)).is_none() {
            existing
                .participants
                .push(combatant_from_character(&character, &ship));
            let expected = existing.last_updated;
            world
                .put_combat_encounter_if_unchanged(existing.clone(), expected)
                .await
                .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
        }
        return Ok(existing);
    }

    create_encounter(world, sector_id, actor).await
}

/// Auto-initiation hook for offensive garrison deployment: attempts to
/// create a new encounter in `sector_id`, attributed to the garrison's
/// owner. Never joins an already-active encounter (the garrison is already
/// one of its participants via `garrison_sources`). Too few participants
/// to fight is not an error here — the garrison simply waits.
pub async fn initiate_from_garrison(
    world: &Arc<dyn WorldStore>,
    sector_id: SectorId,
    owner: CharacterId,
) -> Result<Option<CombatEncounter>, CombatError> {
    if world
        .find_active_combat_in_sector(sector_id)
        .await
        .map_err(|e| CombatError::InvalidAction(e.to_string()))?
        .is_some()
    {
        return Ok(None);
    }

    match create_encounter(world, sector_id, owner).await {
        Ok(encounter) => Ok(Some(encounter)),
        Err(CombatError::InsufficientParticipants) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::enums::ShipOwner;
    use sector_mmo_world::model::{Character, MapKnowledge, Sector, Ship};
    use sector_mmo_world::MemoryWorldStore;

    fn seed_character_with_ship(store: &MemoryWorldStore, fighters: u64) -> CharacterId {
        let character_id = Uuid::new_v4();
        let ship_id = Uuid::new_v4();
        store.seed_character(Character {
            id: character_id,
            display_name: format!("pilot-{character_id}"),
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
    async fn requires_two_participants() {
        let memory = MemoryWorldStore::new();
        memory.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        let actor = seed_character_with_ship(&memory, 10);
        let store: Arc<dyn WorldStore> = Arc::new(memory);
        let result = initiate(&store, actor).await;
        assert!(matches!(result, Err(CombatError::InsufficientParticipants)));
    }

    #[tokio::test]
    async fn creates_new_encounter_with_two_participants() {
        let memory = MemoryWorldStore::new();
        memory.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        let a = seed_character_with_ship(&memory, 10);
        let _b = seed_character_with_ship(&memory, 10);
        let store: Arc<dyn WorldStore> = Arc::new(memory);

        let encounter = initiate(&store, a).await.unwrap();
        assert_eq!(encounter.participants.len(), 2);
        assert_eq!(encounter.round, 1);
    }
}
