//! Postgres-backed `WorldStore`.
//!
//! Entities are stored as JSONB documents keyed by id rather than a fully
//! normalized relational schema — only logical entities and their query
//! patterns are fixed, not column names — so the schema here carries the
//! minimum column set and indexes the query patterns actually need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use sector_mmo_common::enums::RecipientReason;
use sector_mmo_common::errors::WorldError;
use sector_mmo_common::ids::{
    CharacterId, CombatId, CorporationId, EventId, PortId, SalvageId, SectorId, ShipDefinitionId,
    ShipId,
};

use crate::model::{
    Character, CombatEncounter, Corporation, EventRecipient, EventRecord, Garrison, Port,
    RateLimitCounter, SalvageEntry, Sector, SectorContents, Ship, ShipDefinition,
};
use crate::store::{SectorSnapshot, StatusPayload, WorldResult, WorldStore};

fn transient(e: sqlx::Error) -> WorldError {
    WorldError::Transient(e.to_string())
}

/// Concrete `WorldStore` backing production deployments.
pub struct PgWorldStore {
    pool: PgPool,
}

impl PgWorldStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        id: impl sqlx::Encode<'_, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send,
        not_found: impl FnOnce() -> WorldError,
    ) -> WorldResult<T> {
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?
            .ok_or_else(not_found)?;
        let raw: serde_json::Value = row.try_get("data").map_err(transient)?;
        serde_json::from_value(raw)
            .map_err(|e| WorldError::Constraint(format!("corrupt row: {e}")))
    }
}

#[async_trait]
impl WorldStore for PgWorldStore {
    async fn get_sector(&self, id: SectorId) -> WorldResult<Sector> {
        self.load_json(
            "SELECT data FROM universe_structure WHERE sector_id = $1",
            id,
            || WorldError::NotFound(format!("sector {id}")),
        )
        .await
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
        self.load_json(
            "SELECT data FROM characters WHERE character_id = $1",
            id,
            || WorldError::NotFound(format!("character {id}")),
        )
        .await
    }

    async fn find_character_by_name(&self, display_name: &str) -> WorldResult<Option<Character>> {
        let row = sqlx::query("SELECT data FROM characters WHERE lower(display_name) = lower($1)")
            .bind(display_name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;
        row.map(|r| {
            let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
            serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
        })
        .transpose()
    }

    async fn put_character(&self, character: Character) -> WorldResult<()> {
        let data = serde_json::to_value(&character)
            .map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO characters (character_id, display_name, data) VALUES ($1, $2, $3)
             ON CONFLICT (character_id) DO UPDATE SET display_name = $2, data = $3",
        )
        .bind(character.id)
        .bind(&character.display_name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn delete_character(&self, id: CharacterId) -> WorldResult<()> {
        let result = sqlx::query("DELETE FROM characters WHERE character_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        if result.rows_affected() == 0 {
            return Err(WorldError::NotFound(format!("character {id}")));
        }
        sqlx::query("DELETE FROM garrisons WHERE owner_character_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn characters_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Character>> {
        let rows = sqlx::query(
            "SELECT c.data FROM characters c
             JOIN ship_instances s ON s.ship_id = (c.data->>'current_ship_id')::uuid
             WHERE s.current_sector = $1 AND (s.data->>'in_transit')::boolean = false",
        )
        .bind(sector_id)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn get_ship(&self, id: ShipId) -> WorldResult<Ship> {
        self.load_json("SELECT data FROM ship_instances WHERE ship_id = $1", id, || {
            WorldError::NotFound(format!("ship {id}"))
        })
        .await
    }

    async fn put_ship(&self, ship: Ship) -> WorldResult<()> {
        let data = serde_json::to_value(&ship).map_err(|e| WorldError::Constraint(e.to_string()))?;
        let owner_character_id = match &ship.owner {
            sector_mmo_common::enums::ShipOwner::Character { id } => Some(*id),
            _ => None,
        };
        sqlx::query(
            "INSERT INTO ship_instances (ship_id, current_sector, owner_character_id, data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (ship_id) DO UPDATE
             SET current_sector = $2, owner_character_id = $3, data = $4",
        )
        .bind(ship.id)
        .bind(ship.current_sector)
        .bind(owner_character_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn delete_ship(&self, id: ShipId) -> WorldResult<()> {
        let result = sqlx::query("DELETE FROM ship_instances WHERE ship_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        if result.rows_affected() == 0 {
            return Err(WorldError::NotFound(format!("ship {id}")));
        }
        Ok(())
    }

    async fn ships_in_sector(&self, sector_id: SectorId) -> WorldResult<Vec<Ship>> {
        let rows = sqlx::query(
            "SELECT data FROM ship_instances
             WHERE current_sector = $1 AND (data->>'in_transit')::boolean = false",
        )
        .bind(sector_id)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn complete_transit_if_pending(
        &self,
        ship_id: ShipId,
        origin: SectorId,
        destination: SectorId,
    ) -> WorldResult<bool> {
        let mut ship = self.get_ship(ship_id).await?;
        if !ship.in_transit || ship.current_sector != Some(origin) {
            return Ok(false);
        }
        ship.in_transit = false;
        ship.current_sector = Some(destination);
        ship.transit_destination = None;
        ship.transit_eta = None;
        let data = serde_json::to_value(&ship).map_err(|e| WorldError::Constraint(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE ship_instances SET current_sector = $2, data = $3
             WHERE ship_id = $1 AND current_sector = $4 AND (data->>'in_transit')::boolean = true",
        )
        .bind(ship_id)
        .bind(destination)
        .bind(data)
        .bind(origin)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_ship_definition(&self, id: ShipDefinitionId) -> WorldResult<ShipDefinition> {
        self.load_json(
            "SELECT data FROM ship_definitions WHERE ship_definition_id = $1",
            id,
            || WorldError::NotFound(format!("ship definition {id}")),
        )
        .await
    }

    async fn list_ship_definitions(&self) -> WorldResult<Vec<ShipDefinition>> {
        let rows = sqlx::query("SELECT data FROM ship_definitions")
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn get_port(&self, id: PortId) -> WorldResult<Port> {
        self.load_json("SELECT data FROM ports WHERE port_id = $1", id, || {
            WorldError::NotFound(format!("port {id}"))
        })
        .await
    }

    async fn put_port(&self, port: Port) -> WorldResult<()> {
        let data = serde_json::to_value(&port).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO ports (port_id, data) VALUES ($1, $2)
             ON CONFLICT (port_id) DO UPDATE SET data = $2",
        )
        .bind(port.id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn get_sector_contents(&self, sector_id: SectorId) -> WorldResult<SectorContents> {
        let row = sqlx::query("SELECT data FROM sector_contents WHERE sector_id = $1")
            .bind(sector_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;
        match row {
            Some(r) => {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            }
            None => Ok(SectorContents {
                sector_id,
                ..Default::default()
            }),
        }
    }

    async fn put_sector_contents(&self, contents: SectorContents) -> WorldResult<()> {
        let data =
            serde_json::to_value(&contents).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO sector_contents (sector_id, data) VALUES ($1, $2)
             ON CONFLICT (sector_id) DO UPDATE SET data = $2",
        )
        .bind(contents.sector_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn get_garrisons(&self, sector_id: SectorId) -> WorldResult<Vec<Garrison>> {
        let rows = sqlx::query("SELECT data FROM garrisons WHERE sector_id = $1")
            .bind(sector_id)
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn put_garrison(&self, garrison: Garrison) -> WorldResult<()> {
        let data =
            serde_json::to_value(&garrison).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO garrisons (sector_id, owner_character_id, data) VALUES ($1, $2, $3)
             ON CONFLICT (sector_id, owner_character_id) DO UPDATE SET data = $3",
        )
        .bind(garrison.sector_id)
        .bind(garrison.owner_character_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn delete_garrison(
        &self,
        sector_id: SectorId,
        owner_character_id: CharacterId,
    ) -> WorldResult<()> {
        sqlx::query("DELETE FROM garrisons WHERE sector_id = $1 AND owner_character_id = $2")
            .bind(sector_id)
            .bind(owner_character_id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn get_salvage(&self, id: SalvageId) -> WorldResult<SalvageEntry> {
        self.load_json("SELECT data FROM salvage WHERE salvage_id = $1", id, || {
            WorldError::NotFound(format!("salvage {id}"))
        })
        .await
    }

    async fn put_salvage(&self, salvage: SalvageEntry) -> WorldResult<()> {
        let data =
            serde_json::to_value(&salvage).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO salvage (salvage_id, sector_id, data) VALUES ($1, $2, $3)
             ON CONFLICT (salvage_id) DO UPDATE SET data = $3",
        )
        .bind(salvage.id)
        .bind(salvage.sector_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn delete_salvage(&self, id: SalvageId) -> WorldResult<()> {
        sqlx::query("DELETE FROM salvage WHERE salvage_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn get_corporation(&self, id: CorporationId) -> WorldResult<Corporation> {
        self.load_json(
            "SELECT data FROM corporations WHERE corporation_id = $1",
            id,
            || WorldError::NotFound(format!("corporation {id}")),
        )
        .await
    }

    async fn put_corporation(&self, corporation: Corporation) -> WorldResult<()> {
        let data = serde_json::to_value(&corporation)
            .map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO corporations (corporation_id, data) VALUES ($1, $2)
             ON CONFLICT (corporation_id) DO UPDATE SET data = $2",
        )
        .bind(corporation.id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn append_event(
        &self,
        mut event: EventRecord,
        recipients: Vec<EventRecipient>,
    ) -> WorldResult<EventId> {
        let mut tx = self.pool.begin().await.map_err(transient)?;
        let data = serde_json::to_value(&event).map_err(|e| WorldError::Constraint(e.to_string()))?;
        let row = sqlx::query(
            "INSERT INTO events (sector_id, timestamp, data) VALUES ($1, $2, $3) RETURNING event_id",
        )
        .bind(event.sector_id)
        .bind(event.timestamp)
        .bind(data)
        .fetch_one(&mut *tx)
        .await
        .map_err(transient)?;
        let id: EventId = row.try_get("event_id").map_err(transient)?;
        event.id = id;

        for recipient in recipients {
            sqlx::query(
                "INSERT INTO event_character_recipients (event_id, character_id, reason)
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(recipient.character_id)
            .bind(reason_tag(recipient.reason))
            .execute(&mut *tx)
            .await
            .map_err(transient)?;
        }
        tx.commit().await.map_err(transient)?;
        Ok(id)
    }

    async fn query_events(
        &self,
        character_id: Option<CharacterId>,
        sector_id: Option<SectorId>,
        corporation_id: Option<CorporationId>,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> WorldResult<Vec<EventRecord>> {
        // Corporation scoping requires membership, resolved by the caller
        // (dispatcher) before this query; here it degrades to "no filter"
        // so a missing membership check never silently widens results.
        let corp_member_ids: Vec<CharacterId> = match corporation_id {
            Some(id) => self.get_corporation(id).await?.member_ids,
            None => Vec::new(),
        };

        let mut sql = String::from("SELECT DISTINCT e.event_id, e.data FROM events e");
        if character_id.is_some() {
            sql.push_str(" JOIN event_character_recipients r ON r.event_id = e.event_id");
        }
        sql.push_str(" WHERE 1=1");
        if character_id.is_some() {
            sql.push_str(" AND r.character_id = $1");
        }
        if sector_id.is_some() {
            sql.push_str(" AND e.sector_id = $2");
        }
        if since.is_some() {
            sql.push_str(" AND e.timestamp >= $3");
        }
        sql.push_str(" ORDER BY e.timestamp ASC LIMIT $4");

        let mut query = sqlx::query(&sql);
        query = query.bind(character_id);
        query = query.bind(sector_id);
        query = query.bind(since);
        query = query.bind(limit as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(transient)?;
        let mut events: Vec<EventRecord> = rows
            .into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect::<WorldResult<Vec<_>>>()?;

        if !corp_member_ids.is_empty() {
            events.retain(|e| {
                e.originator_character_id
                    .map(|oc| corp_member_ids.contains(&oc))
                    .unwrap_or(false)
            });
        }
        Ok(events)
    }

    async fn get_combat_encounter(&self, id: CombatId) -> WorldResult<CombatEncounter> {
        self.load_json("SELECT data FROM combat_encounters WHERE combat_id = $1", id, || {
            WorldError::NotFound(format!("combat encounter {id}"))
        })
        .await
    }

    async fn find_active_combat_in_sector(
        &self,
        sector_id: SectorId,
    ) -> WorldResult<Option<CombatEncounter>> {
        let row = sqlx::query(
            "SELECT data FROM combat_encounters WHERE sector_id = $1 AND NOT ended LIMIT 1",
        )
        .bind(sector_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)?;
        row.map(|r| {
            let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
            serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
        })
        .transpose()
    }

    async fn put_combat_encounter(&self, encounter: CombatEncounter) -> WorldResult<()> {
        let data =
            serde_json::to_value(&encounter).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO combat_encounters
                (combat_id, sector_id, ended, deadline, round, last_updated, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (combat_id) DO UPDATE
             SET sector_id = $2, ended = $3, deadline = $4, round = $5, last_updated = $6, data = $7",
        )
        .bind(encounter.combat_id)
        .bind(encounter.sector_id)
        .bind(encounter.ended)
        .bind(encounter.deadline)
        .bind(encounter.round as i32)
        .bind(encounter.last_updated)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn put_combat_encounter_if_unchanged(
        &self,
        mut encounter: CombatEncounter,
        expected_last_updated: DateTime<Utc>,
    ) -> WorldResult<bool> {
        encounter.last_updated = Utc::now();
        let data =
            serde_json::to_value(&encounter).map_err(|e| WorldError::Constraint(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE combat_encounters
             SET sector_id = $2, ended = $3, deadline = $4, round = $5, last_updated = $6, data = $7
             WHERE combat_id = $1 AND last_updated = $8",
        )
        .bind(encounter.combat_id)
        .bind(encounter.sector_id)
        .bind(encounter.ended)
        .bind(encounter.deadline)
        .bind(encounter.round as i32)
        .bind(encounter.last_updated)
        .bind(data)
        .bind(expected_last_updated)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(result.rows_affected() == 1)
    }

    async fn due_combat_encounters(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> WorldResult<Vec<CombatEncounter>> {
        let rows = sqlx::query(
            "SELECT data FROM combat_encounters
             WHERE NOT ended AND deadline IS NOT NULL AND deadline <= $1
             ORDER BY deadline ASC LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn due_transits(&self, now: DateTime<Utc>, limit: u32) -> WorldResult<Vec<Ship>> {
        let rows = sqlx::query(
            "SELECT data FROM ship_instances
             WHERE (data->>'in_transit')::boolean = true
               AND (data->>'transit_eta') IS NOT NULL
               AND (data->>'transit_eta')::timestamptz <= $1
             ORDER BY (data->>'transit_eta')::timestamptz ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;
        rows.into_iter()
            .map(|r| {
                let raw: serde_json::Value = r.try_get("data").map_err(transient)?;
                serde_json::from_value(raw).map_err(|e| WorldError::Constraint(e.to_string()))
            })
            .collect()
    }

    async fn increment_rate_limit(
        &self,
        character_id: CharacterId,
        method: &str,
        window: chrono::Duration,
    ) -> WorldResult<RateLimitCounter> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(transient)?;
        let row = sqlx::query(
            "SELECT window_started_at, count FROM rate_limits
             WHERE character_id = $1 AND method = $2 FOR UPDATE",
        )
        .bind(character_id.to_string())
        .bind(method)
        .fetch_optional(&mut *tx)
        .await
        .map_err(transient)?;

        let (window_started_at, count) = match row {
            Some(r) => {
                let started: DateTime<Utc> = r.try_get("window_started_at").map_err(transient)?;
                let count: i32 = r.try_get("count").map_err(transient)?;
                if now - started >= window {
                    (now, 0)
                } else {
                    (started, count)
                }
            }
            None => (now, 0),
        };
        let new_count = count + 1;

        sqlx::query(
            "INSERT INTO rate_limits (character_id, method, window_started_at, count)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (character_id, method) DO UPDATE
             SET window_started_at = $3, count = $4",
        )
        .bind(character_id.to_string())
        .bind(method)
        .bind(window_started_at)
        .bind(new_count)
        .execute(&mut *tx)
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)?;

        Ok(RateLimitCounter {
            character_id,
            method: method.to_string(),
            window_started_at,
            count: new_count as u32,
        })
    }

    async fn sector_snapshot(
        &self,
        sector_id: SectorId,
        viewer: Option<CharacterId>,
    ) -> WorldResult<SectorSnapshot> {
        let sector = self.get_sector(sector_id).await?;
        let contents = self.get_sector_contents(sector_id).await?;

        let port = match contents.port_id {
            Some(pid) => {
                let port = self.get_port(pid).await?;
                Some(crate::store::PortView {
                    prices: crate::store::quote_port_prices(&port),
                    port,
                })
            }
            None => None,
        };

        let mut occupants = Vec::new();
        for character in self.characters_in_sector(sector_id).await? {
            if Some(character.id) == viewer {
                continue;
            }
            if let Some(ship_id) = character.current_ship_id {
                if let Ok(ship) = self.get_ship(ship_id).await {
                    occupants.push(crate::store::SectorOccupant {
                        character_id: character.id,
                        display_name: character.display_name,
                        ship_display_name: ship.display_name,
                    });
                }
            }
        }

        let garrisons = self.get_garrisons(sector_id).await?;
        let mut salvage = Vec::new();
        for sid in &contents.salvage {
            if let Ok(entry) = self.get_salvage(*sid).await {
                salvage.push(entry);
            }
        }
        let unowned_ships = self
            .ships_in_sector(sector_id)
            .await?
            .into_iter()
            .filter(|s| matches!(s.owner, sector_mmo_common::enums::ShipOwner::Unowned))
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
        let sector = self.sector_snapshot(sector_id, Some(character_id)).await?;
        Ok(StatusPayload {
            map_knowledge_summary: crate::store::MapKnowledgeSummary {
                current_sector: character.map_knowledge.current_sector,
                total_visited: character.map_knowledge.total_visited,
            },
            character,
            ship,
            sector,
        })
    }

    async fn test_reset(&self, fixtures: serde_json::Value) -> WorldResult<()> {
        let mut tx = self.pool.begin().await.map_err(transient)?;
        for table in [
            "event_character_recipients",
            "events",
            "combat_encounters",
            "salvage",
            "garrisons",
            "sector_contents",
            "ship_instances",
            "ports",
            "characters",
            "corporations",
            "rate_limits",
            "universe_structure",
        ] {
            sqlx::query(&format!("TRUNCATE TABLE {table} CASCADE"))
                .execute(&mut *tx)
                .await
                .map_err(transient)?;
        }
        tx.commit().await.map_err(transient)?;

        if let Some(sectors) = fixtures.get("sectors").and_then(|v| v.as_array()) {
            for raw in sectors {
                if let Ok(sector) = serde_json::from_value::<Sector>(raw.clone()) {
                    self.put_sector_json(&sector).await?;
                }
            }
        }
        if let Some(characters) = fixtures.get("characters").and_then(|v| v.as_array()) {
            for raw in characters {
                if let Ok(character) = serde_json::from_value::<Character>(raw.clone()) {
                    self.put_character(character).await?;
                }
            }
        }
        Ok(())
    }
}

impl PgWorldStore {
    async fn put_sector_json(&self, sector: &Sector) -> WorldResult<()> {
        let data = serde_json::to_value(sector).map_err(|e| WorldError::Constraint(e.to_string()))?;
        sqlx::query(
            "INSERT INTO universe_structure (sector_id, data) VALUES ($1, $2)
             ON CONFLICT (sector_id) DO UPDATE SET data = $2",
        )
        .bind(sector.id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }
}

fn reason_tag(reason: RecipientReason) -> &'static str {
    match reason {
        RecipientReason::SelfReason => "self",
        RecipientReason::Sender => "sender",
        RecipientReason::Recipient => "recipient",
        RecipientReason::Sector => "sector",
        RecipientReason::Corp => "corp",
        RecipientReason::Observer => "observer",
    }
}
