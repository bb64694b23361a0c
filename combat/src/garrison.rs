//! Garrison AI: synthesizes a pending action for every garrison participant
//! ahead of round resolution.

use sector_mmo_common::constants::{
    GARRISON_DEFENSIVE_DIVISOR, GARRISON_DEFENSIVE_MODE_BASE, GARRISON_OFFENSIVE_DIVISOR,
    GARRISON_OFFENSIVE_MODE_BASE, GARRISON_TOLL_DIVISOR, GARRISON_TOLL_MODE_BASE,
};
use sector_mmo_common::enums::{ActionKind, GarrisonMode};
use sector_mmo_world::model::{CombatEncounter, CombatantState, ParticipantId, PendingAction, TollRecord};

/// Picks the strongest eligible character not in `garrison_corp`, tiebreak
/// by more fighters, then more shields, then smaller id.
fn strongest_eligible<'a>(
    encounter: &'a CombatEncounter,
    garrison_corp: Option<sector_mmo_common::ids::CorporationId>,
) -> Option<&'a CombatantState> {
    encounter
        .participants
        .iter()
        .filter(|p| {
            matches!(p.kind, sector_mmo_common::enums::CombatantKind::Character)
                && !p.removed
                && p.fighters > 0
                && !p.is_escape_pod
                && p.corporation_id != garrison_corp
        })
        .max_by(|a, b| {
            a.fighters
                .cmp(&b.fighters)
                .then(a.shields.cmp(&b.shields))
                .then(participant_tiebreak(b.participant_id, a.participant_id))
        })
}

fn sort_key(id: ParticipantId) -> uuid::Uuid {
    match id {
        ParticipantId::Character(id) => id,
        ParticipantId::Garrison {
            owner_character_id, ..
        } => owner_character_id,
    }
}

/// `max_by` picks the larger element, but the tiebreak wants the *smaller*
/// id, so this compares `b` against `a` to invert the final choice.
fn participant_tiebreak(a: ParticipantId, b: ParticipantId) -> std::cmp::Ordering {
    sort_key(b).cmp(&sort_key(a))
}

fn garrison_commit(fighters: u64, mode_base: u64, divisor: u64) -> u64 {
    if fighters == 0 {
        return 0;
    }
    let inner = mode_base.max(fighters / divisor.max(1));
    fighters.min(inner).max(1)
}

fn mode_params(mode: GarrisonMode) -> (u64, u64) {
    match mode {
        GarrisonMode::Offensive => (GARRISON_OFFENSIVE_MODE_BASE, GARRISON_OFFENSIVE_DIVISOR),
        GarrisonMode::Defensive => (GARRISON_DEFENSIVE_MODE_BASE, GARRISON_DEFENSIVE_DIVISOR),
        GarrisonMode::Toll => (GARRISON_TOLL_MODE_BASE, GARRISON_TOLL_DIVISOR),
    }
}

/// Derives and records a pending action for every garrison participant with
/// fighters > 0. Mutates `encounter.toll_registry` for toll-mode garrisons.
pub fn derive_garrison_actions(encounter: &mut CombatEncounter) {
    let current_round = encounter.round;
    let garrisons: Vec<ParticipantId> = encounter
        .participants
        .iter()
        .filter(|p| matches!(p.kind, sector_mmo_common::enums::CombatantKind::Garrison))
        .filter(|p| p.fighters > 0 && !p.removed)
        .map(|p| p.participant_id)
        .collect();

    for garrison_id in garrisons {
        let garrison = encounter.participant(garrison_id).cloned().unwrap();
        let (mode, owner_corp) = garrison_mode_and_corp(encounter, garrison_id);

        let action = match mode {
            GarrisonMode::Toll => derive_toll_action(encounter, garrison_id, &garrison, current_round),
            _ => {
                let target = strongest_eligible(encounter, owner_corp).map(|c| c.participant_id);
                match target {
                    Some(target_id) => {
                        let (mode_base, divisor) = mode_params(mode);
                        PendingAction {
                            action: ActionKind::Attack,
                            commit: garrison_commit(garrison.fighters, mode_base, divisor),
                            target: Some(target_id),
                            destination: None,
                            timed_out: false,
                        }
                    }
                    None => PendingAction {
                        action: ActionKind::Brace,
                        commit: 0,
                        target: None,
                        destination: None,
                        timed_out: false,
                    },
                }
            }
        };
        encounter.set_pending_action(garrison_id, action);
    }
}

fn garrison_mode_and_corp(
    encounter: &CombatEncounter,
    garrison_id: ParticipantId,
) -> (GarrisonMode, Option<sector_mmo_common::ids::CorporationId>) {
    let combatant = encounter.participant(garrison_id);
    let mode = combatant
        .and_then(|c| c.garrison_mode)
        .unwrap_or(GarrisonMode::Defensive);
    let owner_corp = if let ParticipantId::Garrison {
        owner_character_id, ..
    } = garrison_id
    {
        encounter
            .participants
            .iter()
            .find(|p| p.participant_id == ParticipantId::Character(owner_character_id))
            .and_then(|p| p.corporation_id)
    } else {
        None
    };
    (mode, owner_corp)
}

fn derive_toll_action(
    encounter: &mut CombatEncounter,
    garrison_id: ParticipantId,
    garrison: &CombatantState,
    current_round: u32,
) -> PendingAction {
    let owner_corp = if let ParticipantId::Garrison {
        owner_character_id, ..
    } = garrison_id
    {
        encounter
            .participants
            .iter()
            .find(|p| p.participant_id == ParticipantId::Character(owner_character_id))
            .and_then(|p| p.corporation_id)
    } else {
        None
    };

    let initiator_id = ParticipantId::Character(encounter.context.initiator);
    let initiator_eligible = encounter
        .participant(initiator_id)
        .filter(|p| !p.removed && p.fighters > 0 && !p.is_escape_pod && p.corporation_id != owner_corp)
        .is_some();

    let existing = encounter.toll_record(garrison_id).cloned();
    let record = match existing {
        Some(record) => record,
        None => {
            let target = if initiator_eligible {
                initiator_id
            } else {
                match strongest_eligible(encounter, owner_corp) {
                    Some(c) => c.participant_id,
                    None => {
                        return PendingAction {
                            action: ActionKind::Brace,
                            commit: 0,
                            target: None,
                            destination: None,
                            timed_out: false,
                        }
                    }
                }
            };
            let record = TollRecord {
                demand_round: current_round,
                target,
                paid: false,
                paid_round: None,
            };
            encounter.set_toll_record(garrison_id, record.clone());
            record
        }
    };

    if record.paid {
        return PendingAction {
            action: ActionKind::Brace,
            commit: 0,
            target: None,
            destination: None,
            timed_out: false,
        };
    }

    if record.demand_round == current_round {
        PendingAction {
            action: ActionKind::Brace,
            commit: 0,
            target: None,
            destination: None,
            timed_out: false,
        }
    } else {
        PendingAction {
            action: ActionKind::Attack,
            commit: garrison.fighters,
            target: Some(record.target),
            destination: None,
            timed_out: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::enums::CombatantKind;
    use sector_mmo_world::model::CombatContext;

    fn character(id: uuid::Uuid, fighters: u64) -> CombatantState {
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

    fn garrison(sector_id: i64, owner: uuid::Uuid, fighters: u64) -> CombatantState {
        CombatantState {
            participant_id: ParticipantId::Garrison {
                sector_id,
                owner_character_id: owner,
            },
            kind: CombatantKind::Garrison,
            display_name: "garrison".into(),
            corporation_id: None,
            ship_id: None,
            fighters,
            shields: 0,
            is_escape_pod: false,
            removed: false,
            garrison_mode: Some(GarrisonMode::Defensive),
        }
    }

    #[test]
    fn garrison_with_no_eligible_target_braces() {
        let owner = uuid::Uuid::new_v4();
        let now = chrono::Utc::now();
        let mut enc = CombatEncounter {
            combat_id: uuid::Uuid::new_v4(),
            sector_id: 0,
            round: 1,
            deadline: None,
            base_seed: 1,
            ended: false,
            end_state: None,
            participants: vec![garrison(0, owner, 50)],
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
        };

        derive_garrison_actions(&mut enc);
        let action = enc
            .pending_action(ParticipantId::Garrison {
                sector_id: 0,
                owner_character_id: owner,
            })
            .unwrap();
        assert_eq!(action.action, ActionKind::Brace);
    }

    #[test]
    fn garrison_targets_strongest_eligible_character() {
        let owner = uuid::Uuid::new_v4();
        let weak = uuid::Uuid::new_v4();
        let strong = uuid::Uuid::new_v4();
        let now = chrono::Utc::now();
        let mut enc = CombatEncounter {
            combat_id: uuid::Uuid::new_v4(),
            sector_id: 0,
            round: 1,
            deadline: None,
            base_seed: 1,
            ended: false,
            end_state: None,
            participants: vec![
                garrison(0, owner, 100),
                character(weak, 5),
                character(strong, 50),
            ],
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
        };

        derive_garrison_actions(&mut enc);
        let action = enc
            .pending_action(ParticipantId::Garrison {
                sector_id: 0,
                owner_character_id: owner,
            })
            .unwrap();
        assert_eq!(action.target, Some(ParticipantId::Character(strong)));
    }
}
