//! `axum` wiring: one route per endpoint in §6.2, a shared dispatch
//! wrapper that runs `pipeline::prepare()`, and the error-mirroring
//! contract — every caught error is returned as HTTP+JSON *and*
//! mirrored into the acting character's event stream, best-effort.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

use sector_mmo_common::enums::EventScope;
use sector_mmo_common::errors::GameError;
use sector_mmo_common::ids::RequestId;

use crate::envelope::{ApiResponse, RawRequest};
use crate::handlers::{admin, combat, economy, movement, social};
use crate::pipeline::{self, PreparedRequest};
use crate::state::AppState;

fn status_for(error: &GameError) -> StatusCode {
    StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Mirrors a failed call into the acting character's event stream as
/// `error{endpoint, error, status}`. Failure to mirror is logged and
/// otherwise swallowed — it must never upgrade or replace the primary
/// error response.
async fn mirror_error(
    state: &AppState,
    method: &str,
    request_id: &RequestId,
    character_id: Option<sector_mmo_common::ids::CharacterId>,
    error: &GameError,
) {
    let Some(character_id) = character_id else {
        return;
    };
    let payload = serde_json::json!({
        "endpoint": method,
        "error": error.to_string(),
        "status": error.status_code(),
    });
    if let Err(e) = crate::handlers::support::emit(
        state,
        method,
        request_id,
        EventScope::Character { id: character_id },
        "error",
        payload,
        Some(character_id),
        None,
    )
    .await
    {
        log::warn!("failed to mirror error for {method}: {e}");
    }
}

/// Runs `pipeline::prepare()` for `method`, logging the request boundary
/// and mirroring any failure into the caller's event stream before it's
/// returned as the raw `GameError` for the route handler to map to HTTP.
async fn prepare_or_mirror(
    state: &AppState,
    token: Option<&str>,
    method: &str,
    raw: &RawRequest,
) -> Result<PreparedRequest, GameError> {
    match pipeline::prepare(state, token, method, raw).await {
        Ok(prepared) => Ok(prepared),
        Err(e) => {
            let character_id =
                crate::auth::canonicalize_character_id(&state.config, &raw.character_id).ok();
            mirror_error(state, method, &raw.request_id(), character_id, &e).await;
            Err(e)
        }
    }
}

fn respond(method: &str, request_id: &RequestId, result: Result<serde_json::Value, GameError>) -> impl IntoResponse {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(request_id, data))),
        Err(e) => {
            log::warn!("{method} failed for request {request_id}: {e}");
            (status_for(&e), Json(ApiResponse::err(request_id, e.to_string())))
        }
    }
}

fn token_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-token").and_then(|v| v.to_str().ok())
}

macro_rules! endpoint {
    ($name:ident, $method:literal, |$state:ident, $prepared:ident, $raw:ident| $body:expr) => {
        async fn $name(
            State($state): State<Arc<AppState>>,
            headers: HeaderMap,
            Json($raw): Json<RawRequest>,
        ) -> impl IntoResponse {
            let request_id = $raw.request_id();
            if $raw.healthcheck {
                return (
                    StatusCode::OK,
                    Json(ApiResponse::ok(&request_id, serde_json::json!({"healthy": true}))),
                )
                    .into_response();
            }
            let token = token_header(&headers);
            let prepared = match prepare_or_mirror(&$state, token, $method, &$raw).await {
                Ok(prepared) => prepared,
                Err(e) => return respond($method, &request_id, Err(e)).into_response(),
            };
            let $prepared = prepared;
            let result = $body.await;
            if let Err(ref e) = result {
                mirror_error(&$state, $method, &request_id, Some($prepared.character_id), e).await;
            }
            respond($method, &request_id, result).into_response()
        }
    };
}

endpoint!(join, "join", |state, p, raw| movement::join(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(move_ship, "move", |state, p, raw| movement::request_move(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(my_status, "my_status", |state, p, _raw| movement::my_status(
    &state,
    &p.request_id,
    p.actor,
    p.character_id
));

endpoint!(list_known_ports, "list_known_ports", |state, p, raw| {
    movement::list_known_ports(&state, p.actor, p.character_id, &raw.extra)
});

endpoint!(bank_transfer, "bank_transfer", |state, p, raw| economy::bank_transfer(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(transfer_credits, "transfer_credits", |state, p, raw| {
    economy::transfer_credits(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(transfer_warp_power, "transfer_warp_power", |state, p, raw| {
    economy::transfer_warp_power(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(purchase_fighters, "purchase_fighters", |state, p, raw| {
    economy::purchase_fighters(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(ship_purchase, "ship_purchase", |state, p, raw| economy::ship_purchase(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(dump_cargo, "dump_cargo", |state, p, raw| economy::dump_cargo(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(salvage_collect, "salvage_collect", |state, p, raw| {
    economy::salvage_collect(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(send_message, "send_message", |state, p, raw| social::send_message(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(event_query, "event_query", |state, p, raw| social::event_query(
    &state,
    p.actor,
    p.character_id,
    p.is_admin,
    &raw.extra
));

endpoint!(combat_initiate, "combat_initiate", |state, p, _raw| {
    combat::combat_initiate(&state, &p.request_id, p.actor, p.character_id)
});

endpoint!(combat_action, "combat_action", |state, p, raw| combat::combat_action(
    &state,
    &p.request_id,
    p.actor,
    p.character_id,
    &raw.extra
));

endpoint!(combat_tick, "combat_tick", |state, p, _raw| combat::combat_tick(&state, p.is_admin));

endpoint!(combat_leave_fighters, "combat_leave_fighters", |state, p, raw| {
    combat::combat_leave_fighters(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(combat_set_garrison_mode, "combat_set_garrison_mode", |state, p, raw| {
    combat::combat_set_garrison_mode(&state, &p.request_id, p.actor, p.character_id, &raw.extra)
});

endpoint!(test_reset, "test_reset", |state, p, raw| admin::test_reset(
    &state,
    p.is_admin,
    &raw.extra
));

endpoint!(character_delete, "character_delete", |state, p, _raw| {
    admin::character_delete(&state, &p.request_id, p.is_admin, p.character_id)
});

/// Catches any method name not bound to a route above. A `healthcheck`
/// request still short-circuits here, so pinging an unrecognized path with
/// `healthcheck: true` is a valid liveness probe.
async fn dispatch(
    State(_state): State<Arc<AppState>>,
    Path(method): Path<String>,
    Json(raw): Json<RawRequest>,
) -> impl IntoResponse {
    let request_id = raw.request_id();
    if raw.healthcheck {
        return (
            StatusCode::OK,
            Json(ApiResponse::ok(&request_id, serde_json::json!({"healthy": true}))),
        )
            .into_response();
    }
    let unknown = GameError::Dispatch(sector_mmo_common::errors::DispatchError::Validation(format!(
        "unknown method '{method}'"
    )));
    respond(&method, &request_id, Err(unknown)).into_response()
}

pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/join", post(join))
        .route("/move", post(move_ship))
        .route("/my_status", post(my_status))
        .route("/list_known_ports", post(list_known_ports))
        .route("/bank_transfer", post(bank_transfer))
        .route("/transfer_credits", post(transfer_credits))
        .route("/transfer_warp_power", post(transfer_warp_power))
        .route("/purchase_fighters", post(purchase_fighters))
        .route("/ship_purchase", post(ship_purchase))
        .route("/dump_cargo", post(dump_cargo))
        .route("/salvage_collect", post(salvage_collect))
        .route("/send_message", post(send_message))
        .route("/event_query", post(event_query))
        .route("/combat_initiate", post(combat_initiate))
        .route("/combat_action", post(combat_action))
        .route("/combat_tick", post(combat_tick))
        .route("/combat_leave_fighters", post(combat_leave_fighters))
        .route("/combat_set_garrison_mode", post(combat_set_garrison_mode))
        .route("/test_reset", post(test_reset))
        .route("/character_delete", post(character_delete))
        .route("/:method", post(dispatch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
