//! Round/finalization broadcasting shared by the synchronous action
//! handler and the background deadline tick, so a deadline-driven
//! resolution is exactly as visible to players as a player-driven one.

use sector_mmo_common::enums::EventScope;
use sector_mmo_common::errors::EventError;
use sector_mmo_events::{EventBus, EventSource, OutboundEvent};
use sector_mmo_world::model::CombatEncounter;

use crate::model::{FinalizationOutcome, RoundOutcome};

/// Emits `combat.round_resolved` unconditionally for the just-resolved
/// round, then either a personalized `combat.ended` per character
/// participant plus a sector-wide `sector.update` (encounter ended), or
/// `combat.round_waiting` for the now-open round (encounter continues).
pub async fn broadcast_round(
    events: &EventBus,
    method: &str,
    request_id: &str,
    encounter: &CombatEncounter,
    outcome: &RoundOutcome,
    finalization: Option<&FinalizationOutcome>,
) -> Result<(), EventError> {
    let sector_id = encounter.sector_id;

    events
        .emit(OutboundEvent {
            scope: EventScope::Sector { id: sector_id, exclude_actor: false },
            event_type: "combat.round_resolved".to_string(),
            payload: outcome.clone(),
            source: EventSource::rpc(method, request_id),
            actor: None,
            sector_id: Some(sector_id),
            ship_id: None,
            meta: serde_json::json!({}),
        })
        .await?;

    match finalization {
        Some(finalization) => {
            for view in &finalization.character_views {
                events
                    .emit(OutboundEvent {
                        scope: EventScope::Character { id: view.character_id },
                        event_type: "combat.ended".to_string(),
                        payload: view.clone(),
                        source: EventSource::rpc(method, request_id),
                        actor: Some(view.character_id),
                        sector_id: Some(sector_id),
                        ship_id: None,
                        meta: serde_json::json!({}),
                    })
                    .await?;
            }

            events
                .emit(OutboundEvent {
                    scope: EventScope::Sector { id: sector_id, exclude_actor: false },
                    event_type: "sector.update".to_string(),
                    payload: serde_json::json!({
                        "combat_id": finalization.combat_id,
                        "end_state": finalization.end_state,
                    }),
                    source: EventSource::rpc(method, request_id),
                    actor: None,
                    sector_id: Some(sector_id),
                    ship_id: None,
                    meta: serde_json::json!({}),
                })
                .await?;
        }
        None => {
            events
                .emit(OutboundEvent {
                    scope: EventScope::Sector { id: sector_id, exclude_actor: false },
                    event_type: "combat.round_waiting".to_string(),
                    payload: serde_json::json!({
                        "combat_id": encounter.combat_id,
                        "round": encounter.round,
                    }),
                    source: EventSource::rpc(method, request_id),
                    actor: None,
                    sector_id: Some(sector_id),
                    ship_id: None,
                    meta: serde_json::json!({}),
                })
                .await?;
        }
    }

    Ok(())
}
