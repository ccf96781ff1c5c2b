//! Route handlers for the agent's HTTP control plane.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::errors::AgentError;

fn internal_error(err: AgentError) -> Response {
    error!("request failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": err.to_string()}))).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"status": message}))).into_response()
}

fn ok() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct MakeLeaderBody {
    failover: Option<bool>,
}

pub async fn make_leader(
    State(state): State<AppState>,
    body: Option<Json<MakeLeaderBody>>,
) -> Response {
    let Some(Json(body)) = body else {
        return bad_request("failover must be specified");
    };
    let Some(failover) = body.failover else {
        return bad_request("failover must be specified");
    };

    if let Err(e) = state.agent.check_if_promotable().await {
        return internal_error(e);
    }
    if let Err(e) = state.agent.make_leader(failover).await {
        return internal_error(e);
    }
    if let Err(e) = state.agent.toggle_heartbeats().await {
        return internal_error(e);
    }
    ok()
}

pub async fn make_follower(State(state): State<AppState>) -> Response {
    match state.agent.make_follower().await {
        Ok(()) => ok(),
        Err(e) => internal_error(e),
    }
}

pub async fn make_read_only(State(state): State<AppState>) -> Response {
    match state.agent.make_read_only().await {
        Ok(()) => ok(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    peer_gtid_executed: Option<String>,
}

pub async fn sync(State(state): State<AppState>, body: Option<Json<SyncBody>>) -> Response {
    let Some(Json(body)) = body else {
        return bad_request("peer gtid executed not provided");
    };
    let Some(peer_gtid) = body.peer_gtid_executed else {
        return bad_request("peer gtid executed not provided");
    };

    match state.agent.sync(&peer_gtid).await {
        Ok(()) => ok(),
        Err(e) => internal_error(e),
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    match state.agent.mysql_status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => internal_error(e),
    }
}
