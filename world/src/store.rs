//! The `WorldStore` trait: durable CRUD plus the two compound reads used
//! ubiquitously by every other component.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sector_mmo_common::commodity::{commodity_price, Commodity, PortCode};
use sector_mmo_common::errors::WorldError;
use sector_mmo_common::ids::{
    CharacterId, CombatId, CorporationId, EventId, PortId, SalvageId, SectorId, ShipDefinitionId,
    ShipId,
};

use crate::model::{
    Character, CombatEncounter, Corporation, EventRecipient, EventRecord, Garrison, MapKnowledge,
    Port, RateLimitCounter, SalvageEntry, Sector, SectorContents, Ship, ShipDefinition,
};

pub type WorldResult<T> = Result<T, WorldError>;

/// A character or unowned ship rendered with a human-readable name, as
/// returned in a `SectorSnapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorOccupant {
    pub character_id: CharacterId,
    pub display_name: String,
    pub ship_display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub commodity: Commodity,
    pub price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortView {
    pub port: Port,
    pub prices: Vec<PriceQuote>,
}

/// Full view of a sector, computed fresh on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorSnapshot {
    pub sector_id: SectorId,
    pub position: (i64, i64),
    pub adjacent_sectors: Vec<SectorId>,
    pub port: Option<PortView>,
    pub occupants: Vec<SectorOccupant>,
    pub garrisons: Vec<Garrison>,
    pub salvage: Vec<SalvageEntry>,
    pub unowned_ships: Vec<Ship>,
    pub active_combat_id: Option<CombatId>,
}

/// The full self-view for a pilot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub character: Character,
    pub ship: Ship,
    pub sector: SectorSnapshot,
    pub map_knowledge_summary: MapKnowledgeSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapKnowledgeSummary {
    pub current_sector: Option<SectorId>,
    pub total_visited: u64,
}

/// Pure port-pricing function, exposed here because it operates on the
/// `Port` type this crate owns; the math itself lives in
/// `sector_mmo_common::commodity` so `common` stays dependency-free.
pub fn quote_port_prices(port: &Port) -> Vec<PriceQuote> {
    let code = match PortCode::parse(&port.code) {
        Some(c) => c,
        None => return Vec::new(),
    };
    Commodity::all()
        .iter()
        .filter_map(|&c| {
            let stock = port.stock.get(c);
            let capacity = port.capacity.get(c);
            commodity_price(code, c, stock, capacity).map(|price| PriceQuote {
                commodity: c,
                price,
            })
        })
        .collect()
}

/// Durable state owner for every entity in the game model.
///
/// Every mutation is transactional; on partial failure a `WorldError`
/// variant is returned (`NotFound`/`Conflict`/`Constraint`/`Transient`).
/// `WorldStore` is the only component permitted to retry the underlying
/// store.
#[async_trait]
pub trait WorldStore: Send + Sync {
    // ----- Sectors -----
    async fn get_sector(&self, id: SectorId) -> WorldResult<Sector>;
    async fn sector_adjacency(&self, id: SectorId) -> WorldResult<Vec<SectorId>>;

    // ----- Characters -----
    async fn get_character(&self, id: CharacterId) -> WorldResult<Character>;
    async fn find_character_by_name(&self, display_name: &str) -> WorldResult<Option<Character>>;
    async fn put_character(&self, character: Character) -> WorldResult<()>;
    async fn delete_character(&self, id: CharacterId) -> WorldResult<()>;
    async fn characters_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Character>>;

    // ----- Ships -----
    async fn get_ship(&self, id: ShipId) -> WorldResult<Ship>;
    async fn put_ship(&self, ship: Ship) -> WorldResult<()>;
    async fn delete_ship(&self, id: ShipId) -> WorldResult<()>;
    async fn ships_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Ship>>;
    /// Conditional transit-arrival update: succeeds only if
    /// the ship is still `in_transit` at `origin`, preventing double
    /// dispatch when the resumer task races a live request.
    async fn complete_transit_if_pending(
        &self,
        ship_id: ShipId,
        origin: SectorId,
        destination: SectorId,
    ) -> WorldResult<bool>;

    // ----- Ship definitions -----
    async fn get_ship_definition(&self, id: ShipDefinitionId) -> WorldResult<ShipDefinition>;
    async fn list_ship_definitions(&self) -> WorldResult<Vec<ShipDefinition>>;

    // ----- Ports -----
    async fn get_port(&self, id: PortId) -> WorldResult<Port>;
    async fn put_port(&self, port: Port) -> WorldResult<()>;

    // ----- Sector contents -----
    async fn get_sector_contents(&self, sector_id: SectorId) -> WorldResult<SectorContents>;
    async fn put_sector_contents(&self, contents: SectorContents) -> WorldResult<()>;

    // ----- Garrisons -----
    async fn get_garrisons(&self, sector_id: SectorId) -> WorldResult<Vec<Garrison>>;
    async fn put_garrison(&self, garrison: Garrison) -> WorldResult<()>;
    async fn delete_garrison(
        &self,
        sector_id: SectorId,
        owner_character_id: CharacterId,
    ) -> WorldResult<()>;

    // ----- Salvage -----
    async fn get_salvage(&self, id: SalvageId) -> WorldResult<SalvageEntry>;
    async fn put_salvage(&self, salvage: SalvageEntry) -> WorldResult<()>;
    async fn delete_salvage(&self, id: SalvageId) -> WorldResult<()>;

    // ----- Corporations -----
    async fn get_corporation(&self, id: CorporationId) -> WorldResult<Corporation>;
    async fn put_corporation(&self, corporation: Corporation) -> WorldResult<()>;

    // ----- Events -----
    async fn append_event(
        &self,
        event: EventRecord,
        recipients: Vec<EventRecipient>,
    ) -> WorldResult<EventId>;
    async fn query_events(
        &self,
        character_id: Option<CharacterId>,
        sector_id: Option<SectorId>,
        corporation_id: Option<CorporationId>,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> WorldResult<Vec<EventRecord>>;

    // ----- Combat encounters -----
    async fn get_combat_encounter(&self, id: CombatId) -> WorldResult<CombatEncounter>;
    async fn find_active_combat_in_sector(
        &self,
        sector_id: SectorId,
    ) -> WorldResult<Option<CombatEncounter>>;
    /// Unconditional create/overwrite, used only at initiation.
    async fn put_combat_encounter(&self, encounter: CombatEncounter) -> WorldResult<()>;
    /// Optimistic-concurrency update: succeeds only if the stored
    /// `last_updated` still equals `expected_last_updated`; the loser of a
    /// race gets `false` back and must re-read before retrying.
    async fn put_combat_encounter_if_unchanged(
        &self,
        encounter: CombatEncounter,
        expected_last_updated: DateTime<Utc>,
    ) -> WorldResult<bool>;
    /// Un-ended encounters whose deadline has passed, oldest first, capped
    /// at `limit` — the tick loop's work queue.
    async fn due_combat_encounters(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> WorldResult<Vec<CombatEncounter>>;

    /// Ships still `in_transit` whose `transit_eta` has already passed —
    /// used by the startup resumer to re-arrive ships left mid-flight by a
    /// process that died before its scheduled continuation ran.
    async fn due_transits(&self, now: DateTime<Utc>, limit: u32) -> WorldResult<Vec<Ship>>;

    // ----- Rate limits -----
    /// Durable fallback for multi-process rate limiting;
    /// increments and returns the post-increment count for the current
    /// window, resetting the window if it has expired.
    async fn increment_rate_limit(
        &self,
        character_id: CharacterId,
        method: &str,
        window: chrono::Duration,
    ) -> WorldResult<RateLimitCounter>;

    // ----- Compound reads -----
    async fn sector_snapshot(
        &self,
        sector_id: SectorId,
        viewer: Option<CharacterId>,
    ) -> WorldResult<SectorSnapshot>;
    async fn status_payload(&self, character_id: CharacterId) -> WorldResult<StatusPayload>;

    // ----- Admin -----
    async fn test_reset(&self, fixtures: serde_json::Value) -> WorldResult<()>;
}
