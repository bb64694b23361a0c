//! Error taxonomy for the sector MMO server.
//!
//! One leaf error enum per owning component, composed into `GameError`.
//! Every leaf maps to the HTTP status table via `GameError::status_code`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CharacterId, CombatId, CorporationId, SalvageId, SectorId, ShipId};

/// Errors surfaced by `WorldStore` operations.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum WorldError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("transient store error: {0}")]
    Transient(String),
}

/// Errors surfaced by `SectorGraph`/`VisibilityResolver`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum SectorError {
    #[error("no path between sector {from} and sector {to}")]
    PathNotFound { from: SectorId, to: SectorId },

    #[error("sector {0} not found")]
    SectorNotFound(SectorId),
}

/// Errors surfaced by `CombatCore`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum CombatError {
    #[error("combat encounter {0} not found")]
    EncounterNotFound(CombatId),

    #[error("encounter {0} already ended")]
    AlreadyEnded(CombatId),

    #[error("{0} is not a participant in this encounter")]
    NotParticipant(CharacterId),

    #[error("at least two distinct participants are required to initiate combat")]
    InsufficientParticipants,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("optimistic concurrency conflict on encounter {0}")]
    StaleWrite(CombatId),
}

/// Errors surfaced by `EventBus`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum EventError {
    #[error("broadcast transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by the `Dispatcher`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthMissing,

    #[error("actor is not authorized to act as this character")]
    AuthForbidden,

    #[error("rate limit exceeded for {method}")]
    RateLimited { method: String },

    #[error("corporation {0} membership required")]
    NotCorporationMember(CorporationId),

    #[error("ship {0} is in transit")]
    ShipInTransit(ShipId),

    #[error("salvage {0} already claimed or expired")]
    SalvageUnavailable(SalvageId),
}

/// Combined error type for all game errors, with an HTTP status mapping.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum GameError {
    #[error("world error: {0}")]
    World(#[from] WorldError),

    #[error("sector error: {0}")]
    Sector(#[from] SectorError),

    #[error("combat error: {0}")]
    Combat(#[from] CombatError),

    #[error("event error: {0}")]
    Event(#[from] EventError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

/// Canonical HTTP status code for each error kind.
impl GameError {
    pub fn status_code(&self) -> u16 {
        match self {
            GameError::Dispatch(DispatchError::Validation(_)) => 400,
            GameError::Dispatch(DispatchError::AuthMissing) => 401,
            GameError::Dispatch(DispatchError::AuthForbidden) => 403,
            GameError::Dispatch(DispatchError::NotCorporationMember(_)) => 403,
            GameError::Dispatch(DispatchError::RateLimited { .. }) => 429,
            GameError::Dispatch(DispatchError::ShipInTransit(_)) => 409,
            GameError::Dispatch(DispatchError::SalvageUnavailable(_)) => 409,
            GameError::World(WorldError::NotFound(_)) => 404,
            GameError::World(WorldError::Conflict(_)) => 409,
            GameError::World(WorldError::Constraint(_)) => 400,
            GameError::World(WorldError::Transient(_)) => 500,
            GameError::Sector(SectorError::PathNotFound { .. }) => 400,
            GameError::Sector(SectorError::SectorNotFound(_)) => 404,
            GameError::Combat(CombatError::EncounterNotFound(_)) => 404,
            GameError::Combat(CombatError::AlreadyEnded(_)) => 409,
            GameError::Combat(CombatError::NotParticipant(_)) => 403,
            GameError::Combat(CombatError::InsufficientParticipants) => 400,
            GameError::Combat(CombatError::InvalidAction(_)) => 400,
            GameError::Combat(CombatError::StaleWrite(_)) => 409,
            GameError::Event(EventError::Transport(_)) => 500,
            GameError::Fatal(_) => 500,
        }
    }

    /// Short machine-readable tag for the mirrored `error` event payload.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::World(_) => "world",
            GameError::Sector(_) => "sector",
            GameError::Combat(_) => "combat",
            GameError::Event(_) => "event",
            GameError::Dispatch(_) => "dispatch",
            GameError::Fatal(_) => "fatal",
        }
    }
}
