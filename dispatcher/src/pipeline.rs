//! Common request preparation shared by every endpoint: token check,
//! id canonicalization, actor authorization, admin detection, and rate
//! limiting, in that order.

use sector_mmo_common::errors::GameError;
use sector_mmo_common::ids::{CharacterId, RequestId};

use crate::auth::{authorize_actor, canonicalize_character_id, check_api_token};
use crate::envelope::RawRequest;
use crate::state::AppState;

/// The outcome of preparing a raw request: who is acting, as whom, and
/// whether they presented valid admin credentials for this call.
pub struct PreparedRequest {
    pub actor: CharacterId,
    pub character_id: CharacterId,
    pub request_id: RequestId,
    pub is_admin: bool,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Whether this specific request presented admin credentials, distinct
/// from whether `authorize_actor` let a cross-actor call through — a
/// cross-actor call can only succeed via admin credentials, but a
/// same-actor call passes `authorize_actor` without them.
fn is_admin_request(state: &AppState, raw: &RawRequest) -> bool {
    if !raw.admin_override {
        return false;
    }
    let supplied = raw
        .extra
        .get("admin_password_hash")
        .and_then(serde_json::Value::as_str);
    match (&state.config.admin_password_hash, supplied) {
        (Some(configured), Some(supplied)) => {
            constant_time_eq(configured.as_bytes(), supplied.as_bytes())
        }
        _ => false,
    }
}

/// Runs every endpoint's shared preamble: verifies the API token, resolves
/// `character_id`/`actor_character_id` to canonical ids, checks that the
/// actor may act as the target character, determines admin status, and
/// enforces the per-method rate limit. `method` names the endpoint being
/// dispatched, used both for the rate-limit table lookup and for tagging
/// the eventual response's `source`.
pub async fn prepare(
    state: &AppState,
    token: Option<&str>,
    method: &str,
    raw: &RawRequest,
) -> Result<PreparedRequest, GameError> {
    check_api_token(&state.config, token)?;

    let character_id = canonicalize_character_id(&state.config, &raw.character_id)?;
    let actor = match &raw.actor_character_id {
        Some(raw_actor) if !raw_actor.trim().is_empty() => {
            canonicalize_character_id(&state.config, raw_actor)?
        }
        _ => character_id,
    };

    let admin_password_hash = raw
        .extra
        .get("admin_password_hash")
        .and_then(serde_json::Value::as_str);
    authorize_actor(
        &state.config,
        actor,
        character_id,
        raw.admin_override,
        admin_password_hash,
    )?;

    let is_admin = is_admin_request(state, raw);
    let request_id = raw.request_id();

    state
        .rate_limiters
        .enforce(&state.world, method, character_id)
        .await?;

    Ok(PreparedRequest {
        actor,
        character_id,
        request_id,
        is_admin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_events::EventBus;
    use sector_mmo_sector::VisibilityResolver;
    use sector_mmo_world::MemoryWorldStore;
    use std::sync::Arc;

    fn test_state() -> Arc<AppState> {
        let world: Arc<dyn sector_mmo_world::WorldStore> = Arc::new(MemoryWorldStore::new());
        let broadcaster: Arc<dyn sector_mmo_events::Broadcaster> =
            Arc::new(sector_mmo_events::InMemoryBroadcaster::new());
        Arc::new(AppState::new(world, broadcaster, Arc::new(Config::from_env())))
    }

    use crate::config::Config;

    #[tokio::test]
    async fn self_action_prepares_without_admin() {
        let state = test_state();
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "character_id": "captain zor",
        }))
        .unwrap();
        let prepared = prepare(&state, None, "my_status", &raw).await.unwrap();
        assert_eq!(prepared.actor, prepared.character_id);
        assert!(!prepared.is_admin);
    }

    #[tokio::test]
    async fn cross_actor_without_admin_override_is_rejected() {
        let state = test_state();
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "character_id": "captain zor",
            "actor_character_id": "someone else",
        }))
        .unwrap();
        assert!(prepare(&state, None, "my_status", &raw).await.is_err());
    }

    #[tokio::test]
    async fn admin_override_without_configured_password_is_never_admin() {
        let state = test_state();
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "character_id": "captain zor",
            "admin_override": true,
            "admin_password_hash": "anything",
        }))
        .unwrap();
        // authorize_actor passes (self-action), but is_admin stays false since
        // no admin password is configured in this environment.
        let prepared = prepare(&state, None, "my_status", &raw).await.unwrap();
        assert!(!prepared.is_admin);
    }
}
