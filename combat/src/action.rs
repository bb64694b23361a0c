//! CombatAction: validate and record one participant's submitted action.

use std::sync::Arc;

use chrono::Utc;

use sector_mmo_common::enums::ActionKind;
use sector_mmo_common::errors::CombatError;
use sector_mmo_common::ids::CharacterId;
use sector_mmo_world::model::{CombatEncounter, ParticipantId, PendingAction};
use sector_mmo_world::WorldStore;

/// Validates `action` for `actor` against `encounter`'s current state and,
/// on success, records it in `pending_actions`. Does not persist or
/// trigger resolution — the caller decides when to invoke the resolver.
pub async fn submit_action(
    world: &Arc<dyn WorldStore>,
    encounter: &mut CombatEncounter,
    actor: CharacterId,
    action: ActionKind,
    commit: u64,
    target: Option<CharacterId>,
    destination: Option<sector_mmo_common::ids::SectorId>,
) -> Result<(), CombatError> {
    if encounter.ended {
        return Err(CombatError::AlreadyEnded(encounter.combat_id));
    }
    let participant_id = ParticipantId::Character(actor);
    let combatant = encounter
        .participant(participant_id)
        .ok_or(CombatError::NotParticipant(actor))?;

    let pending = match action {
        ActionKind::Attack => {
            if combatant.fighters == 0 {
                return Err(CombatError::InvalidAction(
                    "attacker has no fighters".to_string(),
                ));
            }
            let target_character = target
                .ok_or_else(|| CombatError::InvalidAction("attack requires a target".to_string()))?;
            if target_character == actor {
                return Err(CombatError::InvalidAction("cannot target self".to_string()));
            }
            let target_id = ParticipantId::Character(target_character);
            if encounter.participant(target_id).is_none() {
                return Err(CombatError::InvalidAction(
                    "target is not a participant".to_string(),
                ));
            }
            if commit == 0 {
                return Err(CombatError::InvalidAction(
                    "commit must be at least 1 fighter".to_string(),
                ));
            }
            let commit = commit.min(combatant.fighters);
            PendingAction {
                action,
                commit,
                target: Some(target_id),
                destination: None,
                timed_out: false,
            }
        }
        ActionKind::Flee => {
            if combatant.is_escape_pod {
                return Err(CombatError::InvalidAction(
                    "escape pods cannot flee".to_string(),
                ));
            }
            let destination_sector = destination.ok_or_else(|| {
                CombatError::InvalidAction("flee requires a destination".to_string())
            })?;
            let adjacent = world
                .sector_adjacency(encounter.sector_id)
                .await
                .map_err(|e| CombatError::InvalidAction(e.to_string()))?;
            if !adjacent.contains(&destination_sector) {
                return Err(CombatError::InvalidAction(
                    "flee destination is not adjacent".to_string(),
                ));
            }
            PendingAction {
                action,
                commit: 0,
                target: None,
                destination: Some(destination_sector),
                timed_out: false,
            }
        }
        ActionKind::Brace | ActionKind::Pay => PendingAction {
            action,
            commit: 0,
            target: None,
            destination: None,
            timed_out: false,
        },
    };

    encounter.set_pending_action(participant_id, pending);
    encounter.awaiting_resolution = true;
    encounter.last_updated = Utc::now();
    Ok(())
}

/// True once every non-garrison participant with fighters has a pending
/// action, or the deadline has passed — either condition should trigger
/// resolution.
pub fn ready_to_resolve(encounter: &CombatEncounter, now: chrono::DateTime<Utc>) -> bool {
    if encounter
        .deadline
        .map(|deadline| now >= deadline)
        .unwrap_or(false)
    {
        return true;
    }
    encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, sector_mmo_common::enums::CombatantKind::Character))
        .filter(|p| p.fighters > 0 && !p.removed)
        .all(|p| encounter.pending_action(p.participant_id).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::enums::CombatantKind;
    use sector_mmo_world::model::{CombatContext, CombatantState, Sector};
    use sector_mmo_world::MemoryWorldStore;

    fn combatant(id: uuid::Uuid, fighters: u64) -> CombatantState {
        CombatantState {
            participant_id: ParticipantId::Character(id),
            kind: CombatantKind::Character,
            display_name: "pilot".into(),
            corporation_id: None,
            ship_id: None,
            fighters,
            shields: 0,
            is_escape_pod: false,
            removed: false,
            garrison_mode: None,
        }
    }

    fn encounter(participants: Vec<CombatantState>) -> CombatEncounter {
        let now = Utc::now();
        CombatEncounter {
            combat_id: uuid::Uuid::new_v4(),
            sector_id: 0,
            round: 1,
            deadline: Some(now + chrono::Duration::seconds(15)),
            base_seed: 1,
            ended: false,
            end_state: None,
            participants,
            pending_actions: Vec::new(),
            awaiting_resolution: false,
            toll_registry: Vec::new(),
            context: CombatContext {
                initiator: uuid::Uuid::new_v4(),
                created_at: now,
                garrison_sources: Vec::new(),
            },
            log: Vec::new(),
            last_updated: now,
        }
    }

    #[tokio::test]
    async fn attack_commit_is_clamped_to_fighters() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let attacker = uuid::Uuid::new_v4();
        let target = uuid::Uuid::new_v4();
        let mut enc = encounter(vec![combatant(attacker, 5), combatant(target, 5)]);

        submit_action(
            &store,
            &mut enc,
            attacker,
            ActionKind::Attack,
            999,
            Some(target),
            None,
        )
        .await
        .unwrap();

        let pending = enc.pending_action(ParticipantId::Character(attacker)).unwrap();
        assert_eq!(pending.commit, 5);
    }

    #[tokio::test]
    async fn attack_commit_of_zero_is_rejected() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let attacker = uuid::Uuid::new_v4();
        let target = uuid::Uuid::new_v4();
        let mut enc = encounter(vec![combatant(attacker, 5), combatant(target, 5)]);

        let result = submit_action(
            &store,
            &mut enc,
            attacker,
            ActionKind::Attack,
            0,
            Some(target),
            None,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn attack_requires_distinct_target() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let attacker = uuid::Uuid::new_v4();
        let mut enc = encounter(vec![combatant(attacker, 5)]);

        let result = submit_action(
            &store,
            &mut enc,
            attacker,
            ActionKind::Attack,
            1,
            Some(attacker),
            None,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn flee_requires_adjacent_destination() {
        let memory = MemoryWorldStore::new();
        memory.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![sector_mmo_world::model::WarpEdge {
                to: 1,
                two_way: true,
                hyperlane: false,
            }],
        });
        let store: Arc<dyn WorldStore> = Arc::new(memory);
        let actor = uuid::Uuid::new_v4();
        let other = uuid::Uuid::new_v4();
        let mut enc = encounter(vec![combatant(actor, 5), combatant(other, 5)]);

        let bad = submit_action(
            &store,
            &mut enc,
            actor,
            ActionKind::Flee,
            0,
            None,
            Some(99),
        )
        .await;
        assert!(bad.is_err());

        submit_action(&store, &mut enc, actor, ActionKind::Flee, 0, None, Some(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ready_to_resolve_once_all_fighters_act() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let mut enc = encounter(vec![combatant(a, 5), combatant(b, 5)]);
        assert!(!ready_to_resolve(&enc, Utc::now()));

        submit_action(&store, &mut enc, a, ActionKind::Brace, 0, None, None)
            .await
            .unwrap();
        assert!(!ready_to_resolve(&enc, Utc::now()));

        submit_action(&store, &mut enc, b, ActionKind::Brace, 0, None, None)
            .await
            .unwrap();
        assert!(ready_to_resolve(&enc, Utc::now()));
    }
}
