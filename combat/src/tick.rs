//! Background deadline tick: resolves every encounter whose deadline has
//! passed, independent of any client request.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use log::{error, info, warn};

use sector_mmo_common::constants::{TICK_BATCH_SIZE, TICK_INTERVAL_SECS};
use sector_mmo_common::ids::RequestId;
use sector_mmo_events::EventBus;
use sector_mmo_world::WorldStore;

use crate::broadcast::broadcast_round;
use crate::finalize::finalize;
use crate::resolve::resolve_round;

const TICK_SOURCE_METHOD: &str = "combat_tick";

/// Resolves one batch of due encounters. Idempotent with respect to the
/// current round: a race with a concurrent action handler is resolved by
/// `put_combat_encounter_if_unchanged` — the loser here simply drops its
/// work rather than retrying, since the tick will pick the encounter back
/// up on its next pass if it is still due.
pub async fn run_due_encounters(world: &Arc<dyn WorldStore>, events: &Arc<EventBus>) {
    let now = Utc::now();
    let due = match world.due_combat_encounters(now, TICK_BATCH_SIZE as u32).await {
        Ok(encounters) => encounters,
        Err(e) => {
            error!("failed to load due combat encounters: {e}");
            return;
        }
    };

    for mut encounter in due {
        let expected = encounter.last_updated;
        let combat_id = encounter.combat_id;
        let outcome = match resolve_round(world, &mut encounter).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("tick failed to resolve encounter {combat_id}: {e}");
                continue;
            }
        };

        match world
            .put_combat_encounter_if_unchanged(encounter.clone(), expected)
            .await
        {
            Ok(true) => {
                let request_id = RequestId::generate().to_string();
                let finalization = if encounter.ended {
                    match finalize(world, &encounter).await {
                        Ok(finalization) => {
                            info!("combat encounter {combat_id} ended via deadline tick");
                            Some(finalization)
                        }
                        Err(e) => {
                            error!("finalization failed for encounter {combat_id}: {e}");
                            None
                        }
                    }
                } else {
                    None
                };

                if let Err(e) = broadcast_round(
                    events,
                    TICK_SOURCE_METHOD,
                    &request_id,
                    &encounter,
                    &outcome,
                    finalization.as_ref(),
                )
                .await
                {
                    error!("failed to broadcast tick-resolved encounter {combat_id}: {e}");
                }
            }
            Ok(false) => {
                // A concurrent action handler already advanced this
                // encounter's round; our resolution is stale, drop it.
            }
            Err(e) => error!("failed to persist resolved encounter {combat_id}: {e}"),
        }
    }
}

/// Spawns the tick loop as a detached task, firing every `TICK_INTERVAL_SECS`.
pub fn spawn_tick_loop(world: Arc<dyn WorldStore>, events: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(TICK_INTERVAL_SECS));
        loop {
            interval.tick().await;
            run_due_encounters(&world, &events).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_events::InMemoryBroadcaster;
    use sector_mmo_sector::VisibilityResolver;
    use sector_mmo_world::MemoryWorldStore;
    use std::time::Duration;

    fn test_bus(world: Arc<dyn WorldStore>) -> Arc<EventBus> {
        let visibility = Arc::new(VisibilityResolver::new(world.clone(), Duration::from_secs(30)));
        Arc::new(EventBus::new(world, visibility, Arc::new(InMemoryBroadcaster::new())))
    }

    #[tokio::test]
    async fn empty_store_runs_without_error() {
        let store: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let events = test_bus(store.clone());
        run_due_encounters(&store, &events).await;
    }
}
