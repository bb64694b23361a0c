//! Durable entities owned exclusively by `WorldStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sector_mmo_common::commodity::CommodityAmounts;
use sector_mmo_common::enums::{ActionKind, CombatantKind, EndState, GarrisonMode, ShipOwner};
use sector_mmo_common::ids::{
    CharacterId, CombatId, CorporationId, PortId, SalvageId, SectorId, ShipDefinitionId, ShipId,
};

/// A directed warp edge; `two_way` mirrors are maintained by `WorldStore`
/// so adjacency queries never need to check both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarpEdge {
    pub to: SectorId,
    pub two_way: bool,
    pub hyperlane: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub x: i64,
    pub y: i64,
    pub region_tag: String,
    pub edges: Vec<WarpEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub sector_id: SectorId,
    pub code: String,
    pub capacity: CommodityAmounts,
    pub stock: CommodityAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SectorContents {
    pub sector_id: SectorId,
    pub port_id: Option<PortId>,
    pub salvage: Vec<SalvageId>,
    pub observer_channels: Vec<String>,
    pub active_combat_id: Option<sector_mmo_common::ids::CombatId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorMemory {
    pub adjacent_sectors: Vec<SectorId>,
    pub position: (i64, i64),
    pub last_visited: DateTime<Utc>,
    pub port_observed: Option<PortObservation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortObservation {
    pub code: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MapKnowledge {
    pub sectors: HashMap<SectorId, SectorMemory>,
    pub current_sector: Option<SectorId>,
    pub total_visited: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub display_name: String,
    pub current_ship_id: Option<ShipId>,
    pub bank_balance: u64,
    pub corporation_id: Option<CorporationId>,
    pub map_knowledge: MapKnowledge,
    pub last_active: DateTime<Utc>,
    pub is_npc: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub definition_id: ShipDefinitionId,
    pub display_name: String,
    pub owner: ShipOwner,
    pub current_sector: Option<SectorId>,
    pub in_transit: bool,
    pub transit_destination: Option<SectorId>,
    pub transit_eta: Option<DateTime<Utc>>,
    pub credits: u64,
    pub cargo: CommodityAmounts,
    pub warp_power: u64,
    pub shields: u64,
    pub fighters: u64,
    pub is_escape_pod: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipDefinition {
    pub id: ShipDefinitionId,
    pub display_name: String,
    pub warp_cost_per_jump: u64,
    pub max_warp_power: u64,
    pub max_shields: u64,
    pub max_fighters: u64,
    pub cargo_holds: u64,
    pub purchase_price: u64,
    pub is_escape_pod: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Garrison {
    pub sector_id: SectorId,
    pub owner_character_id: CharacterId,
    pub fighters: u64,
    pub mode: GarrisonMode,
    pub toll_amount: u64,
    pub toll_balance: u64,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalvageEntry {
    pub id: SalvageId,
    pub sector_id: SectorId,
    pub cargo: CommodityAmounts,
    pub scrap: u64,
    pub credits: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claimed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corporation {
    pub id: CorporationId,
    pub name: String,
    pub member_ids: Vec<CharacterId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: sector_mmo_common::ids::EventId,
    pub direction: sector_mmo_common::enums::EventDirection,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub originator_character_id: Option<CharacterId>,
    pub sector_id: Option<SectorId>,
    pub ship_id: Option<ShipId>,
    pub request_id: String,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecipient {
    pub event_id: sector_mmo_common::ids::EventId,
    pub character_id: CharacterId,
    pub reason: sector_mmo_common::enums::RecipientReason,
}

/// A fixed-window rate-limit counter, keyed `(character_id, method)`. The
/// window resets whenever `window_started_at` is older than the configured
/// window length; approximates a sliding window with bounded error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub character_id: CharacterId,
    pub method: String,
    pub window_started_at: DateTime<Utc>,
    pub count: u32,
}

/// Identifies one side of a combat action: either the controlling
/// character, or a garrison (addressed by its owner, since a garrison is
/// unique per sector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantId {
    Character(CharacterId),
    Garrison {
        sector_id: SectorId,
        owner_character_id: CharacterId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantState {
    pub participant_id: ParticipantId,
    pub kind: CombatantKind,
    pub display_name: String,
    pub corporation_id: Option<CorporationId>,
    pub ship_id: Option<ShipId>,
    pub fighters: u64,
    pub shields: u64,
    pub is_escape_pod: bool,
    pub removed: bool,
    /// Snapshotted at encounter creation; `None` for character participants.
    pub garrison_mode: Option<GarrisonMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub action: ActionKind,
    pub commit: u64,
    pub target: Option<ParticipantId>,
    pub destination: Option<SectorId>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollRecord {
    pub demand_round: u32,
    pub target: ParticipantId,
    pub paid: bool,
    pub paid_round: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatContext {
    pub initiator: CharacterId,
    pub created_at: DateTime<Utc>,
    pub garrison_sources: Vec<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub round_number: u32,
    pub actions: Vec<(ParticipantId, ActionKind)>,
    pub hits: Vec<(ParticipantId, u64)>,
    pub losses: Vec<(ParticipantId, u64)>,
    pub shield_loss: Vec<(ParticipantId, u64)>,
    pub result: Option<EndState>,
    pub timestamp: DateTime<Utc>,
}

/// The full state of one combat encounter (one sector fight), persisted as
/// a single document. Optimistic concurrency is implemented on
/// `last_updated` + `round` by `WorldStore::put_combat_encounter_if_unchanged`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatEncounter {
    pub combat_id: CombatId,
    pub sector_id: SectorId,
    pub round: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub base_seed: u32,
    pub ended: bool,
    pub end_state: Option<EndState>,
    pub participants: Vec<CombatantState>,
    pub pending_actions: Vec<(ParticipantId, PendingAction)>,
    pub awaiting_resolution: bool,
    pub toll_registry: Vec<(ParticipantId, TollRecord)>,
    pub context: CombatContext,
    pub log: Vec<CombatLogEntry>,
    pub last_updated: DateTime<Utc>,
}

impl CombatEncounter {
    pub fn participant(&self, id: ParticipantId) -> Option<&CombatantState> {
        self.participants.iter().find(|p| p.participant_id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut CombatantState> {
        self.participants.iter_mut().find(|p| p.participant_id == id)
    }

    pub fn pending_action(&self, id: ParticipantId) -> Option<&PendingAction> {
        self.pending_actions
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, a)| a)
    }

    pub fn set_pending_action(&mut self, id: ParticipantId, action: PendingAction) {
        if let Some(entry) = self.pending_actions.iter_mut().find(|(pid, _)| *pid == id) {
            entry.1 = action;
        } else {
            self.pending_actions.push((id, action));
        }
    }

    pub fn toll_record(&self, garrison: ParticipantId) -> Option<&TollRecord> {
        self.toll_registry
            .iter()
            .find(|(pid, _)| *pid == garrison)
            .map(|(_, r)| r)
    }

    pub fn set_toll_record(&mut self, garrison: ParticipantId, record: TollRecord) {
        if let Some(entry) = self.toll_registry.iter_mut().find(|(pid, _)| *pid == garrison) {
            entry.1 = record;
        } else {
            self.toll_registry.push((garrison, record));
        }
    }
}
