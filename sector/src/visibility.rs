//! `VisibilityResolver`: who receives a given event.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sector_mmo_common::enums::EventScope;
use sector_mmo_common::errors::{SectorError, WorldError};
use sector_mmo_common::ids::{CharacterId, SectorId};
use sector_mmo_world::WorldStore;

/// A recipient with the reason it was selected, mirroring the
/// `event_character_recipients.reason` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedRecipient {
    pub character_id: CharacterId,
    pub reason: sector_mmo_common::enums::RecipientReason,
}

struct CachedChannels {
    channels: Vec<String>,
    fetched_at: Instant,
}

/// Resolves an `EventScope` to the set of characters (and, separately,
/// observer channel topics) that should receive the event. Holds the only
/// mutable, cross-call state in this crate: a short-TTL read-through cache
/// of each sector's observer channel list (default 30s).
pub struct VisibilityResolver {
    world: Arc<dyn WorldStore>,
    ttl: Duration,
    observer_cache: Mutex<HashMap<SectorId, CachedChannels>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedRecipients {
    pub characters: Vec<ScopedRecipient>,
    pub observer_channels: Vec<String>,
}

impl VisibilityResolver {
    pub fn new(world: Arc<dyn WorldStore>, ttl: Duration) -> Self {
        Self {
            world,
            ttl,
            observer_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn observer_channels(&self, sector_id: SectorId) -> Result<Vec<String>, SectorError> {
        {
            let cache = self.observer_cache.lock().unwrap();
            if let Some(entry) = cache.get(&sector_id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.channels.clone());
                }
            }
        }
        let contents = self
            .world
            .get_sector_contents(sector_id)
            .await
            .map_err(|_| SectorError::SectorNotFound(sector_id))?;
        let channels = contents.observer_channels;
        self.observer_cache.lock().unwrap().insert(
            sector_id,
            CachedChannels {
                channels: channels.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(channels)
    }

    /// Computes recipients for `scope`, excluding `exclude_actor` unless it
    /// is explicitly part of the scope (sector scope's `exclude_actor`
    /// flag; character/corp/broadcast scopes never exclude the actor
    /// implicitly).
    pub async fn resolve(
        &self,
        scope: &EventScope,
        actor: Option<CharacterId>,
    ) -> Result<ResolvedRecipients, WorldError> {
        use sector_mmo_common::enums::RecipientReason as Reason;

        match scope {
            EventScope::Character { id } => Ok(ResolvedRecipients {
                characters: vec![ScopedRecipient {
                    character_id: *id,
                    reason: Reason::Recipient,
                }],
                observer_channels: Vec::new(),
            }),

            EventScope::Sector { id, exclude_actor } => {
                let mut seen: HashSet<CharacterId> = HashSet::new();
                let mut recipients = Vec::new();

                for character in self.world.characters_in_sector(*id).await? {
                    if *exclude_actor && Some(character.id) == actor {
                        continue;
                    }
                    if seen.insert(character.id) {
                        let reason = if Some(character.id) == actor {
                            Reason::SelfReason
                        } else {
                            Reason::Sector
                        };
                        recipients.push(ScopedRecipient {
                            character_id: character.id,
                            reason,
                        });
                    }
                }

                for garrison in self
                    .world
                    .get_garrisons(*id)
                    .await
                    .unwrap_or_default()
                {
                    let owner = match self.world.get_character(garrison.owner_character_id).await {
                        Ok(c) => c,
                        Err(_) => continue,
                    };
                    let Some(corp_id) = owner.corporation_id else {
                        if seen.insert(owner.id) {
                            recipients.push(ScopedRecipient {
                                character_id: owner.id,
                                reason: Reason::Corp,
                            });
                        }
                        continue;
                    };
                    if let Ok(corp) = self.world.get_corporation(corp_id).await {
                        for member_id in corp.member_ids {
                            if seen.insert(member_id) {
                                recipients.push(ScopedRecipient {
                                    character_id: member_id,
                                    reason: Reason::Corp,
                                });
                            }
                        }
                    }
                }

                let observer_channels = self
                    .observer_channels(*id)
                    .await
                    .map_err(|e| WorldError::Transient(e.to_string()))?;

                Ok(ResolvedRecipients {
                    characters: recipients,
                    observer_channels,
                })
            }

            EventScope::Corporation { id } => {
                let corp = self.world.get_corporation(*id).await?;
                Ok(ResolvedRecipients {
                    characters: corp
                        .member_ids
                        .into_iter()
                        .map(|character_id| ScopedRecipient {
                            character_id,
                            reason: Reason::Corp,
                        })
                        .collect(),
                    observer_channels: Vec::new(),
                })
            }

            EventScope::Broadcast => Ok(ResolvedRecipients::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_world::model::{Character, MapKnowledge, Sector};
    use sector_mmo_world::MemoryWorldStore;

    fn character(id: CharacterId) -> Character {
        Character {
            id,
            display_name: format!("char-{id}"),
            current_ship_id: None,
            bank_balance: 0,
            corporation_id: None,
            map_knowledge: MapKnowledge::default(),
            last_active: chrono::Utc::now(),
            is_npc: false,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn character_scope_targets_exactly_one_recipient() {
        let store = Arc::new(MemoryWorldStore::new());
        let resolver = VisibilityResolver::new(store, Duration::from_secs(30));
        let id = uuid::Uuid::new_v4();
        let resolved = resolver
            .resolve(&EventScope::Character { id }, None)
            .await
            .unwrap();
        assert_eq!(resolved.characters.len(), 1);
        assert_eq!(resolved.characters[0].character_id, id);
    }

    #[tokio::test]
    async fn broadcast_scope_has_no_persisted_recipients() {
        let store = Arc::new(MemoryWorldStore::new());
        let resolver = VisibilityResolver::new(store, Duration::from_secs(30));
        let resolved = resolver.resolve(&EventScope::Broadcast, None).await.unwrap();
        assert!(resolved.characters.is_empty());
    }

    #[tokio::test]
    async fn sector_scope_excludes_actor_when_requested() {
        let store = Arc::new(MemoryWorldStore::new());
        store.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        let actor_id = uuid::Uuid::new_v4();
        let mut actor = character(actor_id);
        let ship_id = uuid::Uuid::new_v4();
        actor.current_ship_id = Some(ship_id);
        store.seed_character(actor);
        store.seed_ship(sector_mmo_world::model::Ship {
            id: ship_id,
            definition_id: uuid::Uuid::new_v4(),
            display_name: "Kestrel".into(),
            owner: sector_mmo_common::enums::ShipOwner::Character { id: actor_id },
            current_sector: Some(0),
            in_transit: false,
            transit_destination: None,
            transit_eta: None,
            credits: 0,
            cargo: Default::default(),
            warp_power: 100,
            shields: 0,
            fighters: 0,
            is_escape_pod: false,
        });

        let resolver = VisibilityResolver::new(store, Duration::from_secs(30));
        let resolved = resolver
            .resolve(
                &EventScope::Sector {
                    id: 0,
                    exclude_actor: true,
                },
                Some(actor_id),
            )
            .await
            .unwrap();
        assert!(resolved.characters.is_empty());
    }
}
