//! Request/outcome types for the combat engine, distinct from the
//! persisted `CombatEncounter` document `world::model` owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sector_mmo_common::enums::{ActionKind, EndState};
use sector_mmo_common::ids::{CharacterId, CombatId, SectorId};
use sector_mmo_world::model::ParticipantId;

/// A validated, not-yet-applied action submission.
#[derive(Debug, Clone)]
pub struct ActionSubmission {
    pub actor: ParticipantId,
    pub action: ActionKind,
    pub commit: u64,
    pub target: Option<ParticipantId>,
    pub destination: Option<SectorId>,
}

/// Per-participant tally produced by one round resolution, used to build
/// the personalized `combat.round_resolved`/`combat.ended` payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub combat_id: CombatId,
    pub round_number: u32,
    pub actions: Vec<(ParticipantId, ActionKind)>,
    pub hits: Vec<(ParticipantId, u64)>,
    pub offensive_losses: Vec<(ParticipantId, u64)>,
    pub defensive_losses: Vec<(ParticipantId, u64)>,
    pub shield_loss: Vec<(ParticipantId, u64)>,
    pub fled: Vec<ParticipantId>,
    pub end_state: Option<EndState>,
    pub timestamp: DateTime<Utc>,
}

/// One character participant's ship-local view of how the encounter ended,
/// used to personalize `combat.ended` instead of broadcasting one
/// identical payload to every recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterCombatView {
    pub character_id: CharacterId,
    pub destroyed: bool,
    pub fled: bool,
    pub fighters_remaining: u64,
    pub shields_remaining: u64,
}

/// Produced once an encounter's `end_state` is non-null; drives salvage
/// generation and ownership transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationOutcome {
    pub combat_id: CombatId,
    pub sector_id: SectorId,
    pub end_state: EndState,
    pub destroyed_characters: Vec<CharacterId>,
    pub character_views: Vec<CharacterCombatView>,
}
