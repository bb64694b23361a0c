//! In-memory `WorldStore`, used by tests and the `combat`/`sector`/`events`
//! crate test suites in place of `PgWorldStore`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use sector_mmo_common::enums::ShipOwner;
use sector_mmo_common::errors::WorldError;
use sector_mmo_common::ids::{
    CharacterId, CombatId, CorporationId, EventId, PortId, SalvageId, SectorId, ShipDefinitionId,
    ShipId,
};

use crate::model::{
    Character, CombatEncounter, Corporation, EventRecipient, EventRecord, Garrison,
    RateLimitCounter, SalvageEntry, Sector, SectorContents, Ship, ShipDefinition,
};
use crate::store::{
    quote_port_prices, MapKnowledgeSummary, PortView, SectorOccupant, SectorSnapshot,
    StatusPayload, WorldResult, WorldStore,
};

#[derive(Default)]
struct Tables {
    sectors: HashMap<SectorId, Sector>,
    characters: HashMap<CharacterId, Character>,
    ships: HashMap<ShipId, Ship>,
    ship_definitions: HashMap<ShipDefinitionId, ShipDefinition>,
    ports: HashMap<PortId, crate::model::Port>,
    sector_contents: HashMap<SectorId, SectorContents>,
    garrisons: HashMap<(SectorId, CharacterId), Garrison>,
    salvage: HashMap<SalvageId, SalvageEntry>,
    corporations: HashMap<CorporationId, Corporation>,
    events: Vec<EventRecord>,
    recipients: Vec<EventRecipient>,
    next_event_id: EventId,
    rate_limits: HashMap<(CharacterId, String), RateLimitCounter>,
    combat_encounters: HashMap<CombatId, CombatEncounter>,
}

/// Thread-safe in-memory `WorldStore`. Every operation is O(n) over the
/// relevant table; fine for tests and small fixtures, never used in
/// production (see `world::pg::PgWorldStore`).
pub struct MemoryWorldStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryWorldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorldStore {
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for def in crate::catalog::all() {
            tables.ship_definitions.insert(def.id, def);
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Seed a sector directly; used by tests to lay out adjacency without
    /// going through the (not-yet-built) admin seeding endpoint.
    pub fn seed_sector(&self, sector: Sector) {
        let mut t = self.tables.lock().unwrap();
        t.sector_contents
            .entry(sector.id)
            .or_insert_with(|| SectorContents {
                sector_id: sector.id,
                ..Default::default()
            });
        t.sectors.insert(sector.id, sector);
    }

    pub fn seed_character(&self, character: Character) {
        self.tables.lock().unwrap().characters.insert(character.id, character);
    }

    pub fn seed_ship(&self, ship: Ship) {
        self.tables.lock().unwrap().ships.insert(ship.id, ship);
    }

    pub fn seed_port(&self, sector_id: SectorId, port: crate::model::Port) {
        let mut t = self.tables.lock().unwrap();
        let port_id = port.id;
        t.ports.insert(port_id, port);
        let contents = t
            .sector_contents
            .entry(sector_id)
            .or_insert_with(|| SectorContents {
                sector_id,
                ..Default::default()
            });
        contents.port_id = Some(port_id);
    }
}

#[async_trait]
impl WorldStore for MemoryWorldStore {
    async fn get_sector(&self, id: SectorId) -> WorldResult<Sector> {
        self.tables
            .lock()
            .unwrap()
            .sectors
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("sector {id}")))
    }

    async fn sector_adjacency(&self, id: SectorId) -> WorldResult<Vec<SectorId>> {
        Ok(self
            .get_sector(id)
            .await?
            .edges
            .into_iter()
            .map(|e| e.to)
            .collect())
    }

    async fn get_character(&self, id: CharacterId) -> WorldResult<Character> {
        self.tables
            .lock()
            .unwrap()
            .characters
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("character {id}")))
    }

    async fn find_character_by_name(&self, display_name: &str) -> WorldResult<Option<Character>> {
        let needle = display_name.trim().to_lowercase();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .characters
            .values()
            .find(|c| c.display_name.trim().to_lowercase() == needle)
            .cloned())
    }

    async fn put_character(&self, character: Character) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .characters
            .insert(character.id, character);
        Ok(())
    }

    async fn delete_character(&self, id: CharacterId) -> WorldResult<()> {
        let mut t = self.tables.lock().unwrap();
        if t.characters.remove(&id).is_none() {
            return Err(WorldError::NotFound(format!("character {id}")));
        }
        t.garrisons.retain(|(_, owner), _| *owner != id);
        Ok(())
    }

    async fn characters_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Character>> {
        let t = self.tables.lock().unwrap();
        Ok(t.characters
            .values()
            .filter(|c| {
                c.current_ship_id
                    .and_then(|sid| t.ships.get(&sid))
                    .map(|ship| ship.current_sector == Some(sector_id) && !ship.in_transit)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn get_ship(&self, id: ShipId) -> WorldResult<Ship> {
        self.tables
            .lock()
            .unwrap()
            .ships
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("ship {id}")))
    }

    async fn put_ship(&self, ship: Ship) -> WorldResult<()> {
        self.tables.lock().unwrap().ships.insert(ship.id, ship);
        Ok(())
    }

    async fn delete_ship(&self, id: ShipId) -> WorldResult<()> {
        let mut t = self.tables.lock().unwrap();
        if t.ships.remove(&id).is_none() {
            return Err(WorldError::NotFound(format!("ship {id}")));
        }
        Ok(())
    }

    async fn ships_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Ship>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .ships
            .values()
            .filter(|s| s.current_sector == Some(sector_id) && !s.in_transit)
            .cloned()
            .collect())
    }

    async fn complete_transit_if_pending(
        &self,
        ship_id: ShipId,
        origin: SectorId,
        destination: SectorId,
    ) -> WorldResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let ship = t
            .ships
            .get_mut(&ship_id)
            .ok_or_else(|| WorldError::NotFound(format!("ship {ship_id}")))?;
        if !ship.in_transit || ship.current_sector != Some(origin) {
            return Ok(false);
        }
        ship.in_transit = false;
        ship.current_sector = Some(destination);
        ship.transit_destination = None;
        ship.transit_eta = None;
        Ok(true)
    }

    async fn get_ship_definition(&self, id: ShipDefinitionId) -> WorldResult<ShipDefinition> {
        self.tables
            .lock()
            .unwrap()
            .ship_definitions
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("ship definition {id}")))
    }

    async fn list_ship_definitions(&self) -> WorldResult<Vec<ShipDefinition>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .ship_definitions
            .values()
            .cloned()
            .collect())
    }

    async fn get_port(&self, id: PortId) -> WorldResult<crate::model::Port> {
        self.tables
            .lock()
            .unwrap()
            .ports
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("port {id}")))
    }

    async fn put_port(&self, port: crate::model::Port) -> WorldResult<()> {
        self.tables.lock().unwrap().ports.insert(port.id, port);
        Ok(())
    }

    async fn get_sector_contents(&self, sector_id: SectorId) -> WorldResult<SectorContents> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .sector_contents
            .get(&sector_id)
            .cloned()
            .unwrap_or(SectorContents {
                sector_id,
                ..Default::default()
            }))
    }

    async fn put_sector_contents(&self, contents: SectorContents) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .sector_contents
            .insert(contents.sector_id, contents);
        Ok(())
    }

    async fn get_garrisons(&self, sector_id: SectorId) -> WorldResult<Vec<Garrison>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .garrisons
            .values()
            .filter(|g| g.sector_id == sector_id)
            .cloned()
            .collect())
    }

    async fn put_garrison(&self, garrison: Garrison) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .garrisons
            .insert((garrison.sector_id, garrison.owner_character_id), garrison);
        Ok(())
    }

    async fn delete_garrison(
        &self,
        sector_id: SectorId,
        owner_character_id: CharacterId,
    ) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .garrisons
            .remove(&(sector_id, owner_character_id));
        Ok(())
    }

    async fn get_salvage(&self, id: SalvageId) -> WorldResult<SalvageEntry> {
        self.tables
            .lock()
            .unwrap()
            .salvage
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("salvage {id}")))
    }

    async fn put_salvage(&self, salvage: SalvageEntry) -> WorldResult<()> {
        self.tables.lock().unwrap().salvage.insert(salvage.id, salvage);
        Ok(())
    }

    async fn delete_salvage(&self, id: SalvageId) -> WorldResult<()> {
        self.tables.lock().unwrap().salvage.remove(&id);
        Ok(())
    }

    async fn get_corporation(&self, id: CorporationId) -> WorldResult<Corporation> {
        self.tables
            .lock()
            .unwrap()
            .corporations
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("corporation {id}")))
    }

    async fn put_corporation(&self, corporation: Corporation) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .corporations
            .insert(corporation.id, corporation);
        Ok(())
    }

    async fn append_event(
        &self,
        mut event: EventRecord,
        recipients: Vec<EventRecipient>,
    ) -> WorldResult<EventId> {
        let mut t = self.tables.lock().unwrap();
        t.next_event_id += 1;
        let id = t.next_event_id;
        event.id = id;
        let recipients = recipients
            .into_iter()
            .map(|mut r| {
                r.event_id = id;
                r
            })
            .collect::<Vec<_>>();
        t.events.push(event);
        t.recipients.extend(recipients);
        Ok(id)
    }

    async fn query_events(
        &self,
        character_id: Option<CharacterId>,
        sector_id: Option<SectorId>,
        corporation_id: Option<CorporationId>,
        since: Option<chrono::DateTime<Utc>>,
        limit: u32,
    ) -> WorldResult<Vec<EventRecord>> {
        let t = self.tables.lock().unwrap();
        let recipient_ids: Option<Vec<EventId>> = character_id.map(|cid| {
            t.recipients
                .iter()
                .filter(|r| r.character_id == cid)
                .map(|r| r.event_id)
                .collect()
        });
        let corp_member_ids: Option<Vec<CharacterId>> = match corporation_id {
            Some(corp_id) => t.corporations.get(&corp_id).map(|c| c.member_ids.clone()),
            None => None,
        };
        let mut out: Vec<EventRecord> = t
            .events
            .iter()
            .filter(|e| sector_id.map(|s| e.sector_id == Some(s)).unwrap_or(true))
            .filter(|e| since.map(|s| e.timestamp >= s).unwrap_or(true))
            .filter(|e| {
                recipient_ids
                    .as_ref()
                    .map(|ids| ids.contains(&e.id))
                    .unwrap_or(true)
            })
            .filter(|e| {
                corp_member_ids
                    .as_ref()
                    .map(|members| {
                        e.originator_character_id
                            .map(|oc| members.contains(&oc))
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        out.sort_by_key(|e| e.timestamp);
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn get_combat_encounter(&self, id: CombatId) -> WorldResult<CombatEncounter> {
        self.tables
            .lock()
            .unwrap()
            .combat_encounters
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("combat encounter {id}")))
    }

    async fn find_active_combat_in_sector(
        &self,
        sector_id: SectorId,
    ) -> WorldResult<Option<CombatEncounter>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .combat_encounters
            .values()
            .find(|e| e.sector_id == sector_id && !e.ended)
            .cloned())
    }

    async fn put_combat_encounter(&self, encounter: CombatEncounter) -> WorldResult<()> {
        self.tables
            .lock()
            .unwrap()
            .combat_encounters
            .insert(encounter.combat_id, encounter);
        Ok(())
    }

    async fn put_combat_encounter_if_unchanged(
        &self,
        mut encounter: CombatEncounter,
        expected_last_updated: chrono::DateTime<Utc>,
    ) -> WorldResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let current = t
            .combat_encounters
            .get(&encounter.combat_id)
            .ok_or_else(|| WorldError::NotFound(format!("combat encounter {}", encounter.combat_id)))?;
        if current.last_updated != expected_last_updated {
            return Ok(false);
        }
        encounter.last_updated = Utc::now();
        t.combat_encounters.insert(encounter.combat_id, encounter);
        Ok(true)
    }

    async fn due_combat_encounters(
        &self,
        now: chrono::DateTime<Utc>,
        limit: u32,
    ) -> WorldResult<Vec<CombatEncounter>> {
        let t = self.tables.lock().unwrap();
        let mut due: Vec<CombatEncounter> = t
            .combat_encounters
            .values()
            .filter(|e| !e.ended && e.deadline.map(|d| d <= now).unwrap_or(false))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.deadline);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn due_transits(&self, now: chrono::DateTime<Utc>, limit: u32) -> WorldResult<Vec<Ship>> {
        let t = self.tables.lock().unwrap();
        let mut due: Vec<Ship> = t
            .ships
            .values()
            .filter(|s| s.in_transit && s.transit_eta.map(|eta| eta <= now).unwrap_or(false))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.transit_eta);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn increment_rate_limit(
        &self,
        character_id: CharacterId,
        method: &str,
        window: chrono::Duration,
    ) -> WorldResult<RateLimitCounter> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        let key = (character_id, method.to_string());
        let counter = t
            .rate_limits
            .entry(key)
            .or_insert_with(|| RateLimitCounter {
                character_id,
                method: method.to_string(),
                window_started_at: now,
                count: 0,
            });
        if now - counter.window_started_at >= window {
            counter.window_started_at = now;
            counter.count = 0;
        }
        counter.count += 1;
        Ok(counter.clone())
    }

    async fn sector_snapshot(
        &self,
        sector_id: SectorId,
        viewer: Option<CharacterId>,
    ) -> WorldResult<SectorSnapshot> {
        let sector = self.get_sector(sector_id).await?;
        let contents = self.get_sector_contents(sector_id).await?;
        let t = self.tables.lock().unwrap();

        let port = contents.port_id.and_then(|pid| t.ports.get(&pid)).map(|p| PortView {
            port: p.clone(),
            prices: quote_port_prices(p),
        });

        let occupants: Vec<SectorOccupant> = t
            .characters
            .values()
            .filter(|c| Some(c.id) != viewer)
            .filter_map(|c| {
                let ship = c.current_ship_id.and_then(|sid| t.ships.get(&sid))?;
                if ship.current_sector == Some(sector_id) && !ship.in_transit {
                    Some(SectorOccupant {
                        character_id: c.id,
                        display_name: c.display_name.clone(),
                        ship_display_name: ship.display_name.clone(),
                    })
                } else {
                    None
                }
            })
            .collect();

        let garrisons: Vec<Garrison> = t
            .garrisons
            .values()
            .filter(|g| g.sector_id == sector_id)
            .cloned()
            .collect();

        let salvage: Vec<SalvageEntry> = contents
            .salvage
            .iter()
            .filter_map(|sid| t.salvage.get(sid).cloned())
            .collect();

        let unowned_ships: Vec<Ship> = t
            .ships
            .values()
            .filter(|s| {
                s.current_sector == Some(sector_id)
                    && !s.in_transit
                    && matches!(s.owner, ShipOwner::Unowned)
            })
            .cloned()
            .collect();

        Ok(SectorSnapshot {
            sector_id,
            position: (sector.x, sector.y),
            adjacent_sectors: sector.edges.into_iter().map(|e| e.to).collect(),
            port,
            occupants,
            garrisons,
            salvage,
            unowned_ships,
            active_combat_id: contents.active_combat_id,
        })
    }

    async fn status_payload(&self, character_id: CharacterId) -> WorldResult<StatusPayload> {
        let character = self.get_character(character_id).await?;
        let ship_id = character
            .current_ship_id
            .ok_or_else(|| WorldError::Constraint(format!("character {character_id} has no ship")))?;
        let ship = self.get_ship(ship_id).await?;
        let sector_id = ship
            .current_sector
            .ok_or_else(|| WorldError::Constraint(format!("ship {ship_id} has no current sector")))?;
        let sector = self
            .sector_snapshot(sector_id, Some(character_id))
            .await?;
        Ok(StatusPayload {
            map_knowledge_summary: MapKnowledgeSummary {
                current_sector: character.map_knowledge.current_sector,
                total_visited: character.map_knowledge.total_visited,
            },
            character,
            ship,
            sector,
        })
    }

    async fn test_reset(&self, fixtures: serde_json::Value) -> WorldResult<()> {
        let mut t = self.tables.lock().unwrap();
        *t = Tables::default();
        for def in crate::catalog::all() {
            t.ship_definitions.insert(def.id, def);
        }
        if let Some(sectors) = fixtures.get("sectors").and_then(|v| v.as_array()) {
            for raw in sectors {
                if let Ok(sector) = serde_json::from_value::<Sector>(raw.clone()) {
                    t.sector_contents
                        .entry(sector.id)
                        .or_insert_with(|| SectorContents {
                            sector_id: sector.id,
                            ..Default::default()
                        });
                    t.sectors.insert(sector.id, sector);
                }
            }
        }
        if let Some(characters) = fixtures.get("characters").and_then(|v| v.as_array()) {
            for raw in characters {
                if let Ok(character) = serde_json::from_value::<Character>(raw.clone()) {
                    t.characters.insert(character.id, character);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_common::ids::SectorId as Sid;
    use crate::model::WarpEdge;

    fn linear_sector(id: Sid, to: Sid) -> Sector {
        Sector {
            id,
            x: id,
            y: 0,
            region_tag: "core".to_string(),
            edges: vec![WarpEdge {
                to,
                two_way: true,
                hyperlane: false,
            }],
        }
    }

    #[tokio::test]
    async fn sector_adjacency_round_trips() {
        let store = MemoryWorldStore::new();
        store.seed_sector(linear_sector(0, 1));
        assert_eq!(store.sector_adjacency(0).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn rate_limit_resets_after_window() {
        let store = MemoryWorldStore::new();
        let cid = uuid::Uuid::new_v4();
        let window = chrono::Duration::milliseconds(10);
        let first = store.increment_rate_limit(cid, "move", window).await.unwrap();
        assert_eq!(first.count, 1);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = store.increment_rate_limit(cid, "move", window).await.unwrap();
        assert_eq!(second.count, 1);
    }
}
