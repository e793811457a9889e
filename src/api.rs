//! The HTTP server plugins and users talk to
//!
//! - `POST /chat`: events from HTTP plugins
//! - `GET /ws`: the WebSocket plugin connection
//! - `GET /linked-role`, `GET /linked-role/callback`: the linked role OAuth flow

mod chat;
mod linked_role;
mod socket;

use crate::{
    config, oauth::OAuth, payloads::Relay, protocol::Protocols, storage::Storage, Error,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Everything the handlers share
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<Storage>,
    pub protocols: Arc<Protocols>,
    pub oauth: Arc<OAuth>,
    /// Plugin events, picked up by the Discord side
    pub relay: async_broadcast::Sender<Relay>,
}

pub fn router(state: ApiState) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(5)));

    Router::new()
        .route("/", get(website))
        .route("/version", get(version))
        .route("/chat", post(chat::chat))
        .route("/ws", get(socket::upgrade))
        .route("/linked-role", get(linked_role::login))
        .route("/linked-role/callback", get(linked_role::callback))
        .layer(sessions)
        .with_state(state)
}

/// Serves the API on `BOT_PORT` until the listener fails
pub async fn serve(state: ApiState) -> crate::Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], config().bot_port));
    let listener = tokio::net::TcpListener::bind(address).await?;

    tracing::info!("API listening on {address}");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn website() -> Redirect {
    Redirect::temporary(&config().website_url)
}

async fn version() -> &'static str {
    &config().plugin_version
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!("API request failed: {self}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::{config::testing::init_test_config, storage::testing::temp_dir};
    use twilight_model::id::Id;

    /// State backed by an empty temp directory, and the receiving end of its relay
    pub async fn state() -> (ApiState, async_broadcast::Receiver<Relay>) {
        init_test_config();

        let (relay, rx) = async_broadcast::broadcast(16);
        let oauth = OAuth::new(
            Id::new(1),
            "secret",
            "http://localhost:3100/linked-role/callback",
        )
        .unwrap();

        let state = ApiState {
            storage: Arc::new(Storage::open(temp_dir()).await.unwrap()),
            protocols: Arc::new(Protocols::new()),
            oauth: Arc::new(oauth),
            relay,
        };

        (state, rx)
    }
}
