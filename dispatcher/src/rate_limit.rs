//! Per-endpoint rate limiting: an in-process `governor` limiter as a fast
//! reject path, backed by `WorldStore::increment_rate_limit` as the
//! cross-process source of truth.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};

use sector_mmo_common::errors::{DispatchError, GameError};
use sector_mmo_common::ids::CharacterId;
use sector_mmo_world::WorldStore;

type KeyedLimiter =
    RateLimiter<CharacterId, DefaultKeyedStateStore<CharacterId>, governor::clock::DefaultClock>;

struct MethodLimit {
    max: u32,
    window_secs: i64,
}

/// `{max, window}` per endpoint. Methods not listed here carry no limit.
fn limit_table() -> &'static [(&'static str, MethodLimit)] {
    &[
        ("join", MethodLimit { max: 5, window_secs: 60 }),
        ("move", MethodLimit { max: 20, window_secs: 60 }),
        ("my_status", MethodLimit { max: 60, window_secs: 60 }),
        ("list_known_ports", MethodLimit { max: 30, window_secs: 60 }),
        ("bank_transfer", MethodLimit { max: 20, window_secs: 60 }),
        ("transfer_credits", MethodLimit { max: 20, window_secs: 60 }),
        ("transfer_warp_power", MethodLimit { max: 20, window_secs: 60 }),
        ("purchase_fighters", MethodLimit { max: 20, window_secs: 60 }),
        ("ship_purchase", MethodLimit { max: 10, window_secs: 60 }),
        ("dump_cargo", MethodLimit { max: 30, window_secs: 60 }),
        ("salvage_collect", MethodLimit { max: 30, window_secs: 60 }),
        ("send_message", MethodLimit { max: 30, window_secs: 10 }),
        ("combat_initiate", MethodLimit { max: 10, window_secs: 60 }),
        ("combat_action", MethodLimit { max: 60, window_secs: 60 }),
        ("combat_leave_fighters", MethodLimit { max: 10, window_secs: 60 }),
        ("combat_set_garrison_mode", MethodLimit { max: 10, window_secs: 60 }),
        ("event_query", MethodLimit { max: 60, window_secs: 60 }),
    ]
}

fn method_limit(method: &str) -> Option<&'static MethodLimit> {
    limit_table().iter().find(|(name, _)| *name == method).map(|(_, limit)| limit)
}

pub struct RateLimiters {
    limiters: HashMap<&'static str, KeyedLimiter>,
}

impl RateLimiters {
    pub fn new() -> Self {
        let mut limiters = HashMap::new();
        for (method, limit) in limit_table() {
            let quota = Quota::with_period(Duration::from_secs(limit.window_secs.max(1) as u64))
                .expect("nonzero window")
                .allow_burst(NonZeroU32::new(limit.max.max(1)).expect("nonzero burst"));
            limiters.insert(*method, RateLimiter::keyed(quota));
        }
        Self { limiters }
    }

    fn check_in_process(&self, method: &str, character_id: CharacterId) -> bool {
        match self.limiters.get(method) {
            Some(limiter) => limiter.check_key(&character_id).is_ok(),
            None => true,
        }
    }

    /// Rejects fast via the in-process limiter, then confirms against the
    /// durable counter so multiple uncoordinated processes still enforce a
    /// shared limit.
    pub async fn enforce(
        &self,
        world: &Arc<dyn WorldStore>,
        method: &str,
        character_id: CharacterId,
    ) -> Result<(), GameError> {
        let Some(limit) = method_limit(method) else {
            return Ok(());
        };

        if !self.check_in_process(method, character_id) {
            return Err(DispatchError::RateLimited {
                method: method.to_string(),
            }
            .into());
        }

        let counter = world
            .increment_rate_limit(
                character_id,
                method,
                chrono::Duration::seconds(limit.window_secs),
            )
            .await?;

        if counter.count > limit.max {
            return Err(DispatchError::RateLimited {
                method: method.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_world::MemoryWorldStore;

    #[tokio::test]
    async fn unthrottled_method_always_passes() {
        let world: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let limiters = RateLimiters::new();
        let character_id = uuid::Uuid::new_v4();
        for _ in 0..100 {
            limiters
                .enforce(&world, "not_a_real_method", character_id)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn in_process_burst_rejects_once_exhausted() {
        let world: Arc<dyn WorldStore> = Arc::new(MemoryWorldStore::new());
        let limiters = RateLimiters::new();
        let character_id = uuid::Uuid::new_v4();
        for _ in 0..5 {
            limiters.enforce(&world, "join", character_id).await.unwrap();
        }
        assert!(limiters.enforce(&world, "join", character_id).await.is_err());
    }
}
