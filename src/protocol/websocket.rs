use super::{ProtocolError, ProtocolResult, TIMEOUT};
use crate::payloads::PluginResponse;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot, Notify};
use twilight_model::id::{marker::GuildMarker, Id};

/// A JSON text frame on a plugin socket
///
/// Requests carry an `id` the plugin echoes in its reply. Events are fire and forget,
/// in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Request {
        id: u64,
        event: String,
        #[serde(default)]
        data: Value,
    },
    Reply {
        id: u64,
        #[serde(default = "ok")]
        status: u16,
        #[serde(default)]
        data: Value,
    },
    Event {
        event: String,
        #[serde(default)]
        data: Value,
    },
}

fn ok() -> u16 {
    200
}

/// Query string of the `/ws` upgrade request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Handshake {
    /// `<guild id>:<verification code>`, only while connecting
    pub code: Option<String>,
    /// The token handed out on a successful verification
    pub token: Option<String>,
    /// `ip:port` of the server
    pub ip: Option<String>,
    pub path: Option<String>,
    pub version: Option<String>,
}

impl Handshake {
    /// The guild and code of a verification attempt
    pub fn verification(&self) -> Option<(Id<GuildMarker>, &str)> {
        let (guild, code) = self.code.as_deref()?.split_once(':')?;
        Some((guild.parse().ok()?, code))
    }
}

/// The bot's end of a live plugin socket
#[derive(Clone)]
pub struct SocketHandle(Arc<SocketInner>);

struct SocketInner {
    outgoing: mpsc::UnboundedSender<Frame>,
    pending: DashMap<u64, oneshot::Sender<PluginResponse>>,
    next_id: AtomicU64,
    closed: Notify,
}

impl SocketHandle {
    /// Returns the handle and the frames to write to the socket
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (outgoing, rx) = mpsc::unbounded_channel();

        let handle = Self(Arc::new(SocketInner {
            outgoing,
            pending: DashMap::new(),
            next_id: AtomicU64::new(0),
            closed: Notify::new(),
        }));

        (handle, rx)
    }

    /// Sends a request and waits for the matching reply
    pub async fn request(&self, event: &str, data: Value) -> ProtocolResult<PluginResponse> {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.0.pending.insert(id, tx);

        let frame = Frame::Request {
            id,
            event: event.to_string(),
            data,
        };

        if self.0.outgoing.send(frame).is_err() {
            self.0.pending.remove(&id);
            return Err(ProtocolError::NotConnected);
        }

        let response = tokio::select! {
            biased;
            response = rx => response.map_err(|_| ProtocolError::Closed)?,
            _ = tokio::time::sleep(TIMEOUT) => {
                self.0.pending.remove(&id);
                return Err(ProtocolError::Timeout);
            }
        };

        if !(200..300).contains(&response.status) {
            return Err(ProtocolError::Status {
                status: response.status,
                message: response.message().map(str::to_string),
            });
        }

        Ok(response)
    }

    /// Sends an event that gets no reply
    pub fn emit(&self, event: &str, data: Value) -> ProtocolResult<()> {
        self.0
            .outgoing
            .send(Frame::Event {
                event: event.to_string(),
                data,
            })
            .map_err(|_| ProtocolError::NotConnected)
    }

    /// Hands a reply to the request waiting for it. Returns `false` for unknown ids.
    pub fn resolve(&self, id: u64, status: u16, data: Value) -> bool {
        match self.0.pending.remove(&id) {
            Some((_, tx)) => tx.send(PluginResponse::new(status, data)).is_ok(),
            None => {
                tracing::debug!("Reply to unknown request {id}");
                false
            }
        }
    }

    /// Fails every request still waiting for a reply and tells the connection to shut
    pub fn close(&self) {
        self.0.pending.clear();
        self.0.closed.notify_one();
    }

    /// Resolves once [`Self::close`] was called
    pub async fn closed(&self) {
        self.0.closed.notified().await;
    }

    pub fn is_same(&self, other: &SocketHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A socket that presented the right verification code
pub struct Verified {
    pub socket: SocketHandle,
    pub handshake: Handshake,
}

struct PendingVerification {
    code: String,
    tx: oneshot::Sender<Verified>,
}

/// Live plugin sockets and `/connect websocket` attempts, per guild
#[derive(Default)]
pub struct Sockets {
    live: DashMap<Id<GuildMarker>, SocketHandle>,
    verifications: DashMap<Id<GuildMarker>, PendingVerification>,
}

impl Sockets {
    pub fn get(&self, guild: Id<GuildMarker>) -> Option<SocketHandle> {
        self.live.get(&guild).map(|socket| socket.clone())
    }

    /// Makes `socket` the one requests for `guild` go to
    pub fn register(&self, guild: Id<GuildMarker>, socket: SocketHandle) {
        if let Some(old) = self.live.insert(guild, socket) {
            old.close();
        }
    }

    /// Forgets the guild's socket, unless it has already been replaced by a newer one
    pub fn unregister(&self, guild: Id<GuildMarker>, socket: &SocketHandle) {
        if let Some((_, removed)) = self
            .live
            .remove_if(&guild, |_, registered| registered.is_same(socket))
        {
            removed.close();
        }
    }

    /// Waits for a plugin to connect with `code`, replacing any earlier attempt
    pub fn await_verification(
        &self,
        guild: Id<GuildMarker>,
        code: String,
    ) -> oneshot::Receiver<Verified> {
        let (tx, rx) = oneshot::channel();
        self.verifications
            .insert(guild, PendingVerification { code, tx });

        rx
    }

    pub fn is_awaiting(&self, guild: Id<GuildMarker>, code: &str) -> bool {
        self.verifications
            .get(&guild)
            .is_some_and(|pending| pending.code == code)
    }

    /// Passes the socket on to the waiting `/connect`, giving it back if nobody waits
    pub fn complete_verification(
        &self,
        guild: Id<GuildMarker>,
        code: &str,
        verified: Verified,
    ) -> Result<(), Verified> {
        match self
            .verifications
            .remove_if(&guild, |_, pending| pending.code == code)
        {
            Some((_, pending)) => pending.tx.send(verified),
            None => Err(verified),
        }
    }

    pub fn cancel_verification(&self, guild: Id<GuildMarker>) {
        self.verifications.remove(&guild);
    }
}

/// Requests go to whichever socket the plugin currently has open
pub struct WebSocketProtocol {
    socket: Option<SocketHandle>,
}

impl WebSocketProtocol {
    pub fn new(socket: Option<SocketHandle>) -> Self {
        Self { socket }
    }

    fn socket(&self) -> ProtocolResult<&SocketHandle> {
        self.socket.as_ref().ok_or(ProtocolError::NotConnected)
    }

    pub(super) async fn request(&self, event: &str, data: Value) -> ProtocolResult<PluginResponse> {
        self.socket()?.request(event, data).await
    }

    /// The plugin replies with the file content as a string
    pub(super) async fn get_file(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        let response = self
            .socket()?
            .request("get-file", json!({ "path": remote_path }))
            .await?;

        match response.data {
            Value::String(content) => Ok(content.into_bytes()),
            _ => Err(ProtocolError::Status {
                status: 404,
                message: None,
            }),
        }
    }

    pub(super) async fn disconnect(&self) -> ProtocolResult<()> {
        let socket = self.socket()?;
        let result = socket.request("disconnect", Value::Null).await.map(|_| ());
        socket.close();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(json!({ "id": 1, "event": "command", "data": { "cmd": "say hi" } }), Frame::Request { id: 1, event: "command".to_string(), data: json!({ "cmd": "say hi" }) } ; "Request")]
    #[test_case(json!({ "id": 1, "status": 206, "data": { "message": "warn" } }), Frame::Reply { id: 1, status: 206, data: json!({ "message": "warn" }) } ; "Reply")]
    #[test_case(json!({ "id": 3 }), Frame::Reply { id: 3, status: 200, data: Value::Null } ; "Bare reply")]
    #[test_case(json!({ "event": "chat", "data": {} }), Frame::Event { event: "chat".to_string(), data: json!({}) } ; "Event")]
    fn parses_frames(json: Value, expected: Frame) {
        assert_eq!(serde_json::from_value::<Frame>(json).unwrap(), expected);
    }

    #[test_case(Some("844156404477853716:123456"), Some((844156404477853716, "123456")) ; "Valid")]
    #[test_case(Some("123456"), None ; "Missing guild")]
    #[test_case(Some("guild:123456"), None ; "Invalid guild")]
    #[test_case(None, None ; "No code")]
    fn verification_code(code: Option<&str>, expected: Option<(u64, &str)>) {
        let handshake = Handshake {
            code: code.map(str::to_string),
            ..Default::default()
        };

        assert_eq!(
            handshake.verification(),
            expected.map(|(guild, code)| (Id::new(guild), code))
        );
    }

    #[tokio::test]
    async fn replies_resolve_their_request() {
        let (socket, mut outgoing) = SocketHandle::new();

        let plugin = {
            let socket = socket.clone();
            tokio::spawn(async move {
                let Some(Frame::Request { id, event, .. }) = outgoing.recv().await else {
                    panic!("Expected a request");
                };
                assert_eq!(event, "command");
                assert!(!socket.resolve(id + 1, 200, Value::Null));
                assert!(socket.resolve(id, 206, json!({ "message": "careful" })));
            })
        };

        let response = socket
            .request("command", json!({ "cmd": "op Steve" }))
            .await
            .unwrap();
        plugin.await.unwrap();

        assert!(response.is_warning());
        assert_eq!(response.message(), Some("careful"));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_requests_time_out() {
        let (socket, _outgoing) = SocketHandle::new();

        let err = socket.request("command", Value::Null).await.unwrap_err();

        assert!(matches!(err, ProtocolError::Timeout));
    }

    #[tokio::test]
    async fn closed_sockets_are_not_connected() {
        let (socket, outgoing) = SocketHandle::new();
        drop(outgoing);

        let err = socket.request("command", Value::Null).await.unwrap_err();

        assert!(matches!(err, ProtocolError::NotConnected));
    }

    #[tokio::test]
    async fn closing_wakes_the_connection() {
        let (socket, _outgoing) = SocketHandle::new();

        socket.clone().close();

        tokio::time::timeout(std::time::Duration::from_secs(1), socket.closed())
            .await
            .unwrap();
    }

    #[test]
    fn unregister_keeps_newer_sockets() {
        let sockets = Sockets::default();
        let guild = Id::new(1);
        let (old, _old_rx) = SocketHandle::new();
        let (new, _new_rx) = SocketHandle::new();

        sockets.register(guild, old.clone());
        sockets.register(guild, new.clone());
        sockets.unregister(guild, &old);

        assert!(sockets.get(guild).is_some_and(|socket| socket.is_same(&new)));

        sockets.unregister(guild, &new);
        assert!(sockets.get(guild).is_none());
    }

    #[tokio::test]
    async fn verification_needs_the_right_code() {
        let sockets = Sockets::default();
        let guild = Id::new(1);
        let rx = sockets.await_verification(guild, "123456".to_string());

        assert!(!sockets.is_awaiting(guild, "654321"));
        assert!(sockets.is_awaiting(guild, "123456"));

        let (socket, _outgoing) = SocketHandle::new();
        let wrong = Verified {
            socket: socket.clone(),
            handshake: Handshake::default(),
        };
        assert!(sockets.complete_verification(guild, "654321", wrong).is_err());

        let right = Verified {
            socket,
            handshake: Handshake::default(),
        };
        assert!(sockets.complete_verification(guild, "123456", right).is_ok());
        assert!(rx.await.is_ok());
        assert!(!sockets.is_awaiting(guild, "123456"));
    }
}
