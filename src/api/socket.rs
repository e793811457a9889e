use super::ApiState;
use crate::{
    payloads::{ChatPayload, Relay},
    protocol::{Frame, Handshake, SocketHandle, Verified},
    storage::{hash_token, ServerConnection},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use twilight_model::id::{marker::GuildMarker, Id};

/// Why a socket is let in
#[derive(Debug)]
enum Accepted {
    /// A plugin answering a `/connect websocket` in progress
    Verification { guild: Id<GuildMarker>, code: String },
    /// A plugin that verified before, presenting its token
    Server(ServerConnection),
}

fn accept(state: &ApiState, handshake: &Handshake) -> Option<Accepted> {
    if let Some((guild, code)) = handshake.verification() {
        return state
            .protocols
            .sockets
            .is_awaiting(guild, code)
            .then(|| Accepted::Verification {
                guild,
                code: code.to_string(),
            });
    }

    let hash = hash_token(handshake.token.as_deref()?);
    state.storage.servers.find_websocket(&hash).map(Accepted::Server)
}

pub async fn upgrade(
    State(state): State<ApiState>,
    Query(handshake): Query<Handshake>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(accepted) = accept(&state, &handshake) else {
        tracing::debug!("Rejected socket from {:?}", handshake.ip);
        return StatusCode::FORBIDDEN.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let (handle, outgoing) = SocketHandle::new();

        let peer = match accepted {
            Accepted::Verification { guild, code } => {
                let verified = Verified {
                    socket: handle.clone(),
                    handshake,
                };
                if state
                    .protocols
                    .sockets
                    .complete_verification(guild, &code, verified)
                    .is_err()
                {
                    tracing::debug!("Verification of {guild} expired before the socket opened");
                    return;
                }
                Peer { guild, hash: None }
            }
            Accepted::Server(server) => {
                if let Err(err) = handle.emit("auth-success", json!({})) {
                    tracing::warn!("Could not greet socket of {}: {err}", server.id);
                }
                state.protocols.sockets.register(server.id, handle.clone());
                Peer {
                    guild: server.id,
                    hash: server.protocol.hash().map(str::to_string),
                }
            }
        };
        let guild = peer.guild;

        tracing::info!("Plugin socket of {guild} connected");
        pump(&state, peer, socket, &handle, outgoing).await;
        state.protocols.sockets.unregister(guild, &handle);
        tracing::info!("Plugin socket of {guild} disconnected");
    })
}

/// The server a socket speaks for
#[derive(Debug)]
struct Peer {
    guild: Id<GuildMarker>,
    /// Token hash the server was stored with. Unknown for a verification socket until
    /// its first event, as the token is only handed out once the socket is open.
    hash: Option<String>,
}

/// Moves frames both ways until either side closes
async fn pump(
    state: &ApiState,
    mut peer: Peer,
    socket: WebSocket,
    handle: &SocketHandle,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(frame) = frame else { break };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!("Could not serialise frame: {err}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if receive(state, &mut peer, handle, text.as_str()).await.is_break() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!("Socket of {} errored: {err}", peer.guild);
                    break;
                }
            },
            () = handle.closed() => break,
        }
    }

    // The plugin may already be gone
    let _ = sink.send(Message::Close(None)).await;
}

/// Handles one frame from the plugin, breaking if the socket should be closed
async fn receive(
    state: &ApiState,
    peer: &mut Peer,
    handle: &SocketHandle,
    text: &str,
) -> ControlFlow<()> {
    let guild = peer.guild;
    let frame = match serde_json::from_str::<Frame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!("Invalid frame from {guild}: {err}");
            return ControlFlow::Continue(());
        }
    };

    match frame {
        Frame::Reply { id, status, data } => {
            handle.resolve(id, status, data);
        }
        Frame::Event { event, data } if event == "chat" => return relay_chat(state, peer, data).await,
        Frame::Event { event, .. } | Frame::Request { event, .. } => {
            tracing::debug!("Ignoring {event} from {guild}");
        }
    }

    ControlFlow::Continue(())
}

/// The stored server the socket still speaks for, if its token wasn't replaced or the
/// server disconnected
fn current_server(state: &ApiState, peer: &mut Peer) -> Option<ServerConnection> {
    let servers = &state.storage.servers;
    let server = match &peer.hash {
        Some(hash) => servers.find_websocket(hash),
        None => servers.get(peer.guild).filter(|server| server.protocol.is_websocket()),
    }
    .filter(|server| server.id == peer.guild)?;

    if peer.hash.is_none() {
        peer.hash = server.protocol.hash().map(str::to_string);
    }

    Some(server)
}

/// Socket events always belong to the guild the socket was accepted for
async fn relay_chat(state: &ApiState, peer: &mut Peer, data: Value) -> ControlFlow<()> {
    let guild = peer.guild;
    let Some(server) = current_server(state, peer) else {
        tracing::info!("Closing socket of {guild}, the server was disconnected or reconnected");
        return ControlFlow::Break(());
    };

    // Some plugin versions send the payload as a JSON string
    let mut data = match data {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!("Invalid chat from {guild}: {err}");
                return ControlFlow::Continue(());
            }
        },
        data => data,
    };

    if let Value::Object(map) = &mut data {
        map.insert("id".to_string(), json!(guild.to_string()));
    }

    match serde_json::from_value::<ChatPayload>(data) {
        Ok(payload) => {
            if let Err(err) = state.relay.broadcast(Relay { server, payload }).await {
                tracing::error!("Could not relay chat: {err}");
            }
        }
        Err(err) => tracing::debug!("Invalid chat from {guild}: {err}"),
    }

    ControlFlow::Continue(())
}
