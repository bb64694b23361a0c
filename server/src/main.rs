//! Process entry point: loads configuration, constructs the concrete
//! `WorldStore`/`Broadcaster`, spawns the combat tick loop and the overdue-
//! transit resumer as background tasks, and serves the `axum` router.

use std::sync::Arc;

use serde::Deserialize;

use sector_mmo_dispatcher::{router, AppState, Config};
use sector_mmo_events::{Broadcaster, HttpBroadcaster, InMemoryBroadcaster};
use sector_mmo_world::{MemoryWorldStore, PgWorldStore, WorldStore};

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Process-level settings that sit outside `dispatcher::Config` — which
/// components to wire up, not how they behave once wired.
#[derive(Debug, Deserialize)]
struct ServerConfig {
    database_url: Option<String>,
    edge_broadcast_base_url: Option<String>,
    #[serde(default = "default_addr")]
    server_addr: String,
    #[serde(default = "default_port")]
    server_port: u16,
}

/// Re-arrives any ship left `in_transit` past its `transit_eta` by a process
/// that died before its scheduled continuation ran. Best-effort: a single
/// pass at startup, not a recurring task — `move`'s own scheduled
/// continuation is the steady-state path.
async fn resume_overdue_transits(state: &Arc<AppState>) {
    let now = chrono::Utc::now();
    let due = match state.world.due_transits(now, 100).await {
        Ok(ships) => ships,
        Err(e) => {
            log::error!("failed to load overdue transits: {e}");
            return;
        }
    };
    log::info!("resuming {} overdue transit(s)", due.len());
    for ship in due {
        let (Some(origin), Some(destination)) = (ship.current_sector, ship.transit_destination)
        else {
            continue;
        };
        let request_id = sector_mmo_common::ids::RequestId::generate();
        if let Err(e) = sector_mmo_dispatcher::handlers::movement::complete_transit(
            state,
            &request_id,
            ship.id,
            origin,
            destination,
        )
        .await
        {
            log::warn!("failed to resume transit for ship {}: {e}", ship.id);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenvy::dotenv().ok();

    let server_config: ServerConfig = envy::from_env()
        .unwrap_or_else(|e| panic!("failed to load server configuration from environment: {e}"));
    let config = Arc::new(Config::from_env());

    let world: Arc<dyn WorldStore> = match &server_config.database_url {
        Some(url) => {
            log::info!("connecting to Postgres world store");
            let store = PgWorldStore::connect(url)
                .await
                .unwrap_or_else(|e| panic!("failed to connect to DATABASE_URL: {e}"));
            store
                .migrate()
                .await
                .unwrap_or_else(|e| panic!("failed to run world store migrations: {e}"));
            Arc::new(store)
        }
        None => {
            log::warn!("DATABASE_URL not set, falling back to an in-memory world store");
            Arc::new(MemoryWorldStore::new())
        }
    };

    let broadcaster: Arc<dyn Broadcaster> = match &server_config.edge_broadcast_base_url {
        Some(base_url) => {
            log::info!("broadcasting realtime events to {base_url}");
            Arc::new(HttpBroadcaster::new(base_url.clone()))
        }
        None => {
            log::warn!("EDGE_BROADCAST_BASE_URL not set, broadcasting to an in-memory sink only");
            Arc::new(InMemoryBroadcaster::new())
        }
    };

    let state = Arc::new(AppState::new(world, broadcaster, config));

    sector_mmo_combat::spawn_tick_loop(state.world.clone(), state.events.clone());
    resume_overdue_transits(&state).await;

    let addr = format!("{}:{}", server_config.server_addr, server_config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    log::info!("sector-mmo-server listening on {addr}");

    axum::serve(listener, router::build(state))
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
