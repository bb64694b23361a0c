//! Closed tagged variants shared across components.
//!
//! Sum types over string tags, never bare strings; deserializers reject
//! unknown tags by construction (serde's default enum behavior).

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, CorporationId};

/// Who holds a ship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShipOwner {
    Character { id: CharacterId },
    Corporation { id: CorporationId },
    Unowned,
}

/// Kind of participant in a combat encounter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CombatantKind {
    Character,
    Garrison,
}

/// The action a combatant submitted (or was assigned) for a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Brace,
    Flee,
    Pay,
}

/// Terminal classifier for a finished encounter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndState {
    DestroyedAll,
    FledOut,
    TollSatisfied,
}

/// Direction of an `EventRecord`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    EventIn,
    EventOut,
}

/// Garrison behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GarrisonMode {
    Offensive,
    Defensive,
    Toll,
}

/// Why a character is a recipient of a given event, recorded per
/// `event_character_recipients` row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipientReason {
    SelfReason,
    Sender,
    Recipient,
    Sector,
    Corp,
    Observer,
}

/// Scope a published event is computed against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum EventScope {
    Character { id: CharacterId },
    Sector { id: crate::ids::SectorId, exclude_actor: bool },
    Corporation { id: CorporationId },
    Broadcast,
}
