use super::ApiState;
use crate::payloads::{ChatPayload, Relay};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Events from HTTP plugins. The sender must be a server connected over HTTP at the
/// address it claims.
pub async fn chat(State(state): State<ApiState>, Json(payload): Json<ChatPayload>) -> impl IntoResponse {
    let server = payload
        .address()
        .and_then(|(ip, port)| state.storage.servers.find_http(payload.id, ip, port));

    let Some(server) = server else {
        tracing::debug!("Rejected chat from unknown server {:?}", payload.ip);
        return StatusCode::FORBIDDEN.into_response();
    };

    if let Err(err) = state.relay.broadcast(Relay { server, payload }).await {
        tracing::error!("Could not relay chat: {err}");
    }

    (StatusCode::OK, Json(json!({}))).into_response()
}
