//! `EventBus`: append, recipient scoping, publish with retry.

use std::sync::Arc;

use log::warn;
use serde::Serialize;

use sector_mmo_common::constants::{MAX_BROADCAST_ATTEMPTS, RETRY_DELAY_MS};
use sector_mmo_common::enums::{EventDirection, EventScope};
use sector_mmo_common::errors::{EventError, WorldError};
use sector_mmo_common::ids::{CharacterId, EventId, SectorId, ShipId};
use sector_mmo_sector::VisibilityResolver;
use sector_mmo_world::model::{EventRecipient, EventRecord};
use sector_mmo_world::WorldStore;

use crate::broadcaster::Broadcaster;
use crate::envelope::{character_topic, sector_topic, BroadcastEnvelope, EventSource, BROADCAST_TOPIC};

/// A fully-formed outbound event, prior to recipient computation.
pub struct OutboundEvent<T: Serialize> {
    pub scope: EventScope,
    pub event_type: String,
    pub payload: T,
    pub source: EventSource,
    pub actor: Option<CharacterId>,
    pub sector_id: Option<SectorId>,
    pub ship_id: Option<ShipId>,
    pub meta: serde_json::Value,
}

pub struct EventBus {
    world: Arc<dyn WorldStore>,
    visibility: Arc<VisibilityResolver>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl EventBus {
    pub fn new(
        world: Arc<dyn WorldStore>,
        visibility: Arc<VisibilityResolver>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            world,
            visibility,
            broadcaster,
        }
    }

    /// Append `event` to the log (persistence precedes publication — the
    /// log is the replay source of truth) then publish to every topic its
    /// recipient set implies. Broadcast-scope events skip persistence
    /// entirely — there is no per-character persistence row for it.
    pub async fn emit<T: Serialize>(&self, event: OutboundEvent<T>) -> Result<Option<EventId>, EventError> {
        let payload = serde_json::to_value(&event.payload)
            .map_err(|e| EventError::Transport(format!("payload serialization: {e}")))?;

        if matches!(event.scope, EventScope::Broadcast) {
            let envelope = BroadcastEnvelope {
                topic: BROADCAST_TOPIC.to_string(),
                event: event.event_type.clone(),
                payload,
                event_id: None,
            };
            self.publish_with_retry(BROADCAST_TOPIC, &envelope).await?;
            return Ok(None);
        }

        let resolved = self
            .visibility
            .resolve(&event.scope, event.actor)
            .await
            .map_err(|e| EventError::Transport(e.to_string()))?;

        let recipients: Vec<EventRecipient> = resolved
            .characters
            .iter()
            .map(|r| EventRecipient {
                event_id: 0,
                character_id: r.character_id,
                reason: r.reason,
            })
            .collect();

        let record = EventRecord {
            id: 0,
            direction: EventDirection::EventOut,
            event_type: event.event_type.clone(),
            payload: payload.clone(),
            timestamp: event.source.timestamp,
            originator_character_id: event.actor,
            sector_id: event.sector_id,
            ship_id: event.ship_id,
            request_id: event.source.request_id.clone(),
            meta: event.meta,
        };

        let event_id = self
            .world
            .append_event(record, recipients)
            .await
            .map_err(|e: WorldError| EventError::Transport(e.to_string()))?;

        let mut character_ids: Vec<CharacterId> =
            resolved.characters.iter().map(|r| r.character_id).collect();
        character_ids.sort_unstable();
        character_ids.dedup();

        for character_id in character_ids {
            let envelope = BroadcastEnvelope {
                topic: character_topic(character_id),
                event: event.event_type.clone(),
                payload: payload.clone(),
                event_id: Some(event_id),
            };
            self.publish_with_retry(&character_topic(character_id), &envelope)
                .await?;
        }

        if let EventScope::Sector { id, .. } = event.scope {
            let envelope = BroadcastEnvelope {
                topic: sector_topic(id),
                event: event.event_type.clone(),
                payload: payload.clone(),
                event_id: Some(event_id),
            };
            self.publish_with_retry(&sector_topic(id), &envelope).await?;

            for channel in resolved.observer_channels {
                let envelope = BroadcastEnvelope {
                    topic: channel.clone(),
                    event: event.event_type.clone(),
                    payload: payload.clone(),
                    event_id: Some(event_id),
                };
                self.publish_with_retry(&channel, &envelope).await?;
            }
        }

        Ok(Some(event_id))
    }

    /// Linear back-off retry: `RETRY_DELAY_MS * attempt` between attempts,
    /// up to `MAX_ATTEMPTS`. The persisted log row is never rolled back on
    /// exhaustion — delivery is at-least-once, not exactly-once.
    async fn publish_with_retry(
        &self,
        topic: &str,
        envelope: &BroadcastEnvelope,
    ) -> Result<(), EventError> {
        let payload = serde_json::to_value(envelope)
            .map_err(|e| EventError::Transport(format!("envelope serialization: {e}")))?;

        let mut last_error = None;
        for attempt in 1..=MAX_BROADCAST_ATTEMPTS {
            match self.broadcaster.publish(topic, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) if e.transient && attempt < MAX_BROADCAST_ATTEMPTS => {
                    warn!(
                        "broadcast to {topic} failed on attempt {attempt}/{MAX_BROADCAST_ATTEMPTS}: {e}"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        RETRY_DELAY_MS * attempt as u64,
                    ))
                    .await;
                    last_error = Some(e);
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }
        Err(EventError::Transport(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("broadcast to {topic} failed")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::InMemoryBroadcaster;
    use sector_mmo_world::MemoryWorldStore;
    use std::time::Duration;

    #[tokio::test]
    async fn character_scope_publishes_single_topic() {
        let world = Arc::new(MemoryWorldStore::new());
        let visibility = Arc::new(VisibilityResolver::new(world.clone(), Duration::from_secs(30)));
        let broadcaster = Arc::new(InMemoryBroadcaster::new());
        let bus = EventBus::new(world, visibility, broadcaster.clone());

        let character_id = uuid::Uuid::new_v4();
        let event_id = bus
            .emit(OutboundEvent {
                scope: EventScope::Character { id: character_id },
                event_type: "status.update".to_string(),
                payload: serde_json::json!({"ok": true}),
                source: EventSource::rpc("my_status", "req-1"),
                actor: Some(character_id),
                sector_id: None,
                ship_id: None,
                meta: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert!(event_id.is_some());
        let published = broadcaster.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, character_topic(character_id));
    }

    #[tokio::test]
    async fn broadcast_scope_skips_persistence() {
        let world = Arc::new(MemoryWorldStore::new());
        let visibility = Arc::new(VisibilityResolver::new(world.clone(), Duration::from_secs(30)));
        let broadcaster = Arc::new(InMemoryBroadcaster::new());
        let bus = EventBus::new(world, visibility, broadcaster.clone());

        let event_id = bus
            .emit(OutboundEvent {
                scope: EventScope::Broadcast,
                event_type: "chat.message".to_string(),
                payload: serde_json::json!({"content": "hi all"}),
                source: EventSource::rpc("send_message", "req-2"),
                actor: None,
                sector_id: None,
                ship_id: None,
                meta: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert!(event_id.is_none());
        assert_eq!(broadcaster.published().len(), 1);
    }
}
