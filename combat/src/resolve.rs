//! Round resolution: the inner core of the combat engine. Applies
//! timeout substitution, garrison AI, then resolves every submitted action
//! against the encounter state in place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use sector_mmo_common::constants::{
    BRACE_DAMAGE_REDUCTION_PCT, FLEE_BASE_SUCCESS_PCT, FLEE_MIN_SUCCESS_PCT,
    FLEE_PENALTY_PER_HOSTILE_PCT,
};
use sector_mmo_common::enums::{ActionKind, CombatantKind, EndState};
use sector_mmo_common::errors::CombatError;
use sector_mmo_common::rng::RoundDraw;
use sector_mmo_world::model::{CombatEncounter, CombatLogEntry, ParticipantId, PendingAction};
use sector_mmo_world::WorldStore;

use crate::garrison::derive_garrison_actions;
use crate::model::RoundOutcome;
use crate::round_timeout;

fn rng_key(id: ParticipantId) -> Uuid {
    match id {
        ParticipantId::Character(id) => id,
        ParticipantId::Garrison {
            owner_character_id, ..
        } => owner_character_id,
    }
}

fn substitute_timeouts(encounter: &mut CombatEncounter) {
    let stragglers: Vec<ParticipantId> = encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, CombatantKind::Character))
        .filter(|p| !p.removed && p.fighters > 0)
        .map(|p| p.participant_id)
        .filter(|id| encounter.pending_action(*id).is_none())
        .collect();

    for id in stragglers {
        encounter.set_pending_action(
            id,
            PendingAction {
                action: ActionKind::Brace,
                commit: 0,
                target: None,
                destination: None,
                timed_out: true,
            },
        );
    }
}

/// Resolves the current round of `encounter` in place and returns a summary
/// suitable for driving the `combat.round_resolved`/`combat.ended` broadcasts.
/// Does not invoke finalization or persist — the caller does both once it has
/// decided how to handle the optimistic-concurrency write.
pub async fn resolve_round(
    world: &Arc<dyn WorldStore>,
    encounter: &mut CombatEncounter,
) -> Result<RoundOutcome, CombatError> {
    if encounter.ended {
        return Err(CombatError::AlreadyEnded(encounter.combat_id));
    }

    substitute_timeouts(encounter);
    derive_garrison_actions(encounter);

    let round = encounter.round;
    let base_seed = encounter.base_seed;
    let actions: Vec<(ParticipantId, PendingAction)> = encounter.pending_actions.clone();

    let fleeing: Vec<ParticipantId> = actions
        .iter()
        .filter(|(_, a)| a.action == ActionKind::Flee)
        .map(|(id, _)| *id)
        .collect();

    let mut hits: HashMap<ParticipantId, u64> = HashMap::new();
    let mut offensive_losses: HashMap<ParticipantId, u64> = HashMap::new();
    let mut defensive_losses: HashMap<ParticipantId, u64> = HashMap::new();
    let mut shield_loss: HashMap<ParticipantId, u64> = HashMap::new();
    let mut fled = Vec::new();

    // Flee rolls: hostile count excludes the fleeing party itself.
    for &id in &fleeing {
        let hostiles = encounter
            .participants
            .iter()
            .filter(|p| p.participant_id != id && !p.removed && p.fighters > 0)
            .filter(|p| !fleeing.contains(&p.participant_id))
            .count() as u32;
        let pct = FLEE_BASE_SUCCESS_PCT
            .saturating_sub(hostiles.saturating_mul(FLEE_PENALTY_PER_HOSTILE_PCT))
            .max(FLEE_MIN_SUCCESS_PCT);
        let draw = RoundDraw::new(base_seed, round, rng_key(id), "flee");
        if draw.succeeds_pct(pct) {
            fled.push(id);
            if let Some(p) = encounter.participant_mut(id) {
                p.removed = true;
            }
            let destination = actions
                .iter()
                .find(|(pid, _)| *pid == id)
                .and_then(|(_, a)| a.destination);
            if let (ParticipantId::Character(_), Some(destination)) = (id, destination) {
                if let Some(combatant) = encounter.participants.iter().find(|p| p.participant_id == id) {
                    if let Some(ship_id) = combatant.ship_id {
                        if let Ok(mut ship) = world.get_ship(ship_id).await {
                            ship.current_sector = Some(destination);
                            ship.in_transit = false;
                            let _ = world.put_ship(ship).await;
                        }
                    }
                }
            }
        }
    }

    // Toll payments: a `pay` action settles the most recent unpaid demand
    // targeting this participant.
    for (id, action) in &actions {
        if action.action != ActionKind::Pay {
            continue;
        }
        let garrison_ids: Vec<ParticipantId> = encounter
            .toll_registry
            .iter()
            .filter(|(_, record)| record.target == *id && !record.paid && record.demand_round <= round)
            .map(|(gid, _)| *gid)
            .collect();
        for garrison_id in garrison_ids {
            if let Some(mut record) = encounter.toll_record(garrison_id).cloned() {
                record.paid = true;
                record.paid_round = Some(round);
                encounter.set_toll_record(garrison_id, record);
            }
        }
    }

    // Attacks, in a stable tiebroken order so simultaneous hits on one
    // target apply deterministically.
    let mut attacks: Vec<(ParticipantId, PendingAction)> = actions
        .into_iter()
        .filter(|(id, a)| a.action == ActionKind::Attack && !fled.contains(id))
        .collect();
    attacks.sort_by_key(|(id, _)| rng_key(*id));

    for (attacker_id, action) in attacks {
        let target_id = match action.target {
            Some(t) => t,
            None => continue,
        };
        let (attacker_fighters, attacker_removed) = match encounter.participant(attacker_id) {
            Some(p) => (p.fighters, p.removed),
            None => continue,
        };
        if attacker_removed || attacker_fighters == 0 {
            continue;
        }
        let commit = action.commit.min(attacker_fighters);
        if commit == 0 {
            continue;
        }

        let (target_shields, target_fighters, target_bracing) = match encounter.participant(target_id) {
            Some(p) if !p.removed => (
                p.shields,
                p.fighters,
                encounter
                    .pending_action(target_id)
                    .map(|a| a.action == ActionKind::Brace)
                    .unwrap_or(false),
            ),
            _ => continue,
        };
        if target_fighters == 0 {
            continue;
        }

        let damage_draw = RoundDraw::new(base_seed, round, rng_key(attacker_id), "damage_split");
        let mut base_damage = commit;
        if target_bracing {
            base_damage = base_damage * (100 - BRACE_DAMAGE_REDUCTION_PCT) as u64 / 100;
        }
        let shield_target = damage_draw.fraction_of(base_damage, 0.3, 0.6);
        let fighter_target = base_damage.saturating_sub(shield_target);
        let shields_lost = shield_target.min(target_shields);
        let overflow = shield_target.saturating_sub(target_shields);
        let fighters_lost = (fighter_target + overflow).min(target_fighters);

        let attrition_draw = RoundDraw::new(base_seed, round, rng_key(attacker_id), "attrition");
        let attacker_losses = attrition_draw.fraction_of(commit, 0.0, 0.2).min(attacker_fighters);

        if let Some(target) = encounter.participant_mut(target_id) {
            target.shields -= shields_lost;
            target.fighters -= fighters_lost;
            if target.fighters == 0 {
                target.removed = true;
            }
        }
        if let Some(attacker) = encounter.participant_mut(attacker_id) {
            attacker.fighters -= attacker_losses;
            if attacker.fighters == 0 {
                attacker.removed = true;
            }
        }

        *hits.entry(target_id).or_default() += base_damage;
        *shield_loss.entry(target_id).or_default() += shields_lost;
        *defensive_losses.entry(target_id).or_default() += fighters_lost;
        *offensive_losses.entry(attacker_id).or_default() += attacker_losses;
    }

    // Anyone reduced to zero fighters outside the attack loop above (e.g. a
    // garrison that never got to act) is still marked destroyed here.
    for participant in encounter.participants.iter_mut() {
        if participant.fighters == 0 && !participant.removed {
            participant.removed = true;
        }
    }

    let toll_paid_this_round = encounter
        .toll_registry
        .iter()
        .any(|(_, record)| record.paid_round == Some(round));
    let remaining_characters: Vec<_> = encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, CombatantKind::Character) && !p.removed)
        .collect();
    let all_remaining_braced_or_paid = remaining_characters.iter().all(|p| {
        encounter
            .pending_action(p.participant_id)
            .map(|a| matches!(a.action, ActionKind::Brace | ActionKind::Pay))
            .unwrap_or(false)
    });
    let active_sides = encounter
        .participants
        .iter()
        .filter(|p| !p.removed && p.fighters > 0)
        .count();

    let end_state = if toll_paid_this_round && all_remaining_braced_or_paid {
        Some(EndState::TollSatisfied)
    } else if active_sides <= 1 {
        Some(EndState::DestroyedAll)
    } else if remaining_characters.is_empty() {
        Some(EndState::FledOut)
    } else {
        None
    };

    let now = Utc::now();
    let log_entry = CombatLogEntry {
        round_number: round,
        actions: encounter
            .pending_actions
            .iter()
            .map(|(id, a)| (*id, a.action))
            .collect(),
        hits: hits.iter().map(|(k, v)| (*k, *v)).collect(),
        losses: defensive_losses.iter().map(|(k, v)| (*k, *v)).collect(),
        shield_loss: shield_loss.iter().map(|(k, v)| (*k, *v)).collect(),
        result: end_state,
        timestamp: now,
    };
    encounter.log.push(log_entry);
    encounter.pending_actions.clear();
    encounter.awaiting_resolution = false;

    let outcome = RoundOutcome {
        combat_id: encounter.combat_id,
        round_number: round,
        actions: encounter
            .log
            .last()
            .map(|l| l.actions.clone())
            .unwrap_or_default(),
        hits: hits.into_iter().collect(),
        offensive_losses: offensive_losses.into_iter().collect(),
        defensive_losses: defensive_losses.into_iter().collect(),
        shield_loss: shield_loss.into_iter().collect(),
        fled,
        end_state,
        timestamp: now,
    };

    if let Some(state) = end_state {
        encounter.ended = true;
        encounter.end_state = Some(state);
        encounter.deadline = None;
    } else {
        encounter.round += 1;
        encounter.deadline = Some(now + round_timeout());
    }
    encounter.last_updated = now;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_world::model::{CombatContext, CombatantState};
    use sector_mmo_world::MemoryWorldStore;

    fn character(id: Uuid, fighters: u64, shields: u64) -> CombatantState {
        CombatantState {
            participant_id: ParticipantId::Character(id),
            kind: CombatantKind::Character,
            display_name: "pilot".into(),
            corporation_id: None,
            ship_id: None,
            fighters,
            shields,
            is_escape_pod: false,
            removed: false,
            garrison_mode: None,
        }
    }

    fn base_encounter(participants: Vec<CombatantState>) -> CombatEncounter {
        let now = Utc::now();
        CombatEncounter {
            combat_id: Uuid::new_v4(),
            sector_id: 0,
            round: 1,
            deadline: Some(now + chrono::Duration::seconds(15)),
            base_seed: 7,
            ended: false,
            end_state: None,
            participants,
            pending_actions: Vec::new(),
            awaiting_resolution: false,
            toll_registry: Vec::new(),
            context: CombatContext {
                initiator: Uuid::new_v4(),
                created_at: now,
                garrison_sources: Vec::new(),
            },
            log: Vec::new(),
            last_updated: now,
        }
    }

    #[tokio::test]
    async fn lopsided_fight_destroys_the_weaker_side() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let strong = Uuid::new_v4();
        let weak = Uuid::new_v4();
        let mut enc = base_encounter(vec![character(strong, 500, 0), character(weak, 1, 0)]);
        enc.set_pending_action(
            ParticipantId::Character(strong),
            PendingAction {
                action: ActionKind::Attack,
                commit: 500,
                target: Some(ParticipantId::Character(weak)),
                destination: None,
                timed_out: false,
            },
        );

        let outcome = resolve_round(&store, &mut enc).await.unwrap();
        assert_eq!(outcome.end_state, Some(EndState::DestroyedAll));
        assert!(enc.ended);
    }

    #[tokio::test]
    async fn untouched_brace_continues_to_next_round() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut enc = base_encounter(vec![character(a, 20, 0), character(b, 20, 0)]);
        enc.set_pending_action(
            ParticipantId::Character(a),
            PendingAction {
                action: ActionKind::Brace,
                commit: 0,
                target: None,
                destination: None,
                timed_out: false,
            },
        );
        enc.set_pending_action(
            ParticipantId::Character(b),
            PendingAction {
                action: ActionKind::Brace,
                commit: 0,
                target: None,
                destination: None,
                timed_out: false,
            },
        );

        let outcome = resolve_round(&store, &mut enc).await.unwrap();
        assert!(outcome.end_state.is_none());
        assert_eq!(enc.round, 2);
        assert!(!enc.ended);
    }

    #[tokio::test]
    async fn no_pending_action_is_substituted_with_a_timed_out_brace() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut enc = base_encounter(vec![character(a, 20, 0), character(b, 20, 0)]);

        resolve_round(&store, &mut enc).await.unwrap();
        let entry = enc.log.last().unwrap();
        assert!(entry
            .actions
            .iter()
            .any(|(_, action)| *action == ActionKind::Brace));
    }
}
