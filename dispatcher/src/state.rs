//! Shared handler state: the concrete component wiring every endpoint
//! operates against.

use std::sync::Arc;

use sector_mmo_events::EventBus;
use sector_mmo_sector::{SectorGraph, VisibilityResolver};
use sector_mmo_world::WorldStore;

use crate::config::Config;
use crate::rate_limit::RateLimiters;

pub struct AppState {
    pub world: Arc<dyn WorldStore>,
    pub graph: Arc<SectorGraph>,
    pub visibility: Arc<VisibilityResolver>,
    pub events: Arc<EventBus>,
    pub config: Arc<Config>,
    pub rate_limiters: Arc<RateLimiters>,
}

impl AppState {
    pub fn new(
        world: Arc<dyn WorldStore>,
        broadcaster: Arc<dyn sector_mmo_events::Broadcaster>,
        config: Arc<Config>,
    ) -> Self {
        let visibility = Arc::new(VisibilityResolver::new(
            world.clone(),
            std::time::Duration::from_millis(config.observer_cache_ttl_ms),
        ));
        let graph = Arc::new(SectorGraph::new(world.clone()));
        let events = Arc::new(EventBus::new(world.clone(), visibility.clone(), broadcaster));
        Self {
            world,
            graph,
            visibility,
            events,
            config,
            rate_limiters: Arc::new(RateLimiters::new()),
        }
    }
}
