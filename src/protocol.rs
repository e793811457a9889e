//! Talking to a connected Minecraft server
//!
//! Servers with the plugin installed are reached over its REST API ([`HttpProtocol`]) or
//! over the socket the plugin keeps open to the bot ([`WebSocketProtocol`]). Servers
//! without the plugin only give file access ([`FtpProtocol`]).

mod ftp;
mod http;
mod websocket;

pub use ftp::FtpProtocol;
pub use http::HttpProtocol;
pub use websocket::{Frame, Handshake, SocketHandle, Sockets, Verified, WebSocketProtocol};

use crate::{
    payloads::{ChatChannel, ChatMessage, PluginResponse},
    storage::{ServerConnection, ServerProtocol},
};
use serde_json::json;
use std::time::Duration;
use twilight_model::id::{marker::ChannelMarker, Id};

/// How long a request to the plugin may take
pub const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("No plugin socket is connected for this server")]
    NotConnected,

    #[error("The plugin did not respond within {TIMEOUT:?}")]
    Timeout,

    #[error("{0} is not supported without the plugin")]
    Unsupported(&'static str),

    #[error("Could not reach the server: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("The plugin responded with status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Invalid response from the plugin: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("The plugin socket closed")]
    Closed,

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("SFTP error: {0}")]
    Sftp(#[from] ssh2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File transfer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ProtocolError {
    /// A description of the failure fit for a Discord reply
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::NotConnected => {
                "The server is not connected right now. Make sure it's online and the plugin is loaded.".to_string()
            }
            ProtocolError::Timeout => "The server did not respond in time.".to_string(),
            ProtocolError::Unsupported(operation) => format!(
                "{operation} needs the plugin. Connect with `/connect http` or `/connect websocket`."
            ),
            ProtocolError::Unreachable(_) => {
                "Could not reach the server. Make sure it's online and the plugin is loaded.".to_string()
            }
            ProtocolError::Status { status: 401, .. } => {
                "The server rejected the bot. Try reconnecting with `/connect`.".to_string()
            }
            ProtocolError::Status { status: 404, message } => message
                .clone()
                .unwrap_or_else(|| "The server could not find the requested resource.".to_string()),
            ProtocolError::Status { status, message } => match message {
                Some(message) => format!("The server returned an error ({status}): {message}"),
                None => format!("The server returned an error ({status})."),
            },
            ProtocolError::InvalidResponse(_) | ProtocolError::Closed => {
                "The server sent an invalid response.".to_string()
            }
            ProtocolError::Ftp(_) | ProtocolError::Sftp(_) | ProtocolError::Io(_) => {
                "Could not download the file. Either the player never joined the server or the world path is wrong.".to_string()
            }
            ProtocolError::Join(_) => "An unknown error occurred.".to_string(),
        }
    }
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Where plugin requests go for each server
#[derive(Default)]
pub struct Protocols {
    client: reqwest::Client,
    pub sockets: Sockets,
}

impl Protocols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn for_server(&self, server: &ServerConnection) -> Protocol {
        match &server.protocol {
            ServerProtocol::Http { token, .. } => Protocol::Http(HttpProtocol::new(
                self.client.clone(),
                &server.ip,
                server.port,
                token,
            )),
            ServerProtocol::WebSocket { .. } => {
                Protocol::WebSocket(WebSocketProtocol::new(self.sockets.get(server.id)))
            }
            ServerProtocol::Ftp(credentials) => Protocol::Ftp(FtpProtocol::ftp(
                &server.ip,
                server.port,
                credentials.clone(),
            )),
            ServerProtocol::Sftp(credentials) => Protocol::Ftp(FtpProtocol::sftp(
                &server.ip,
                server.port,
                credentials.clone(),
            )),
        }
    }
}

pub enum Protocol {
    Http(HttpProtocol),
    WebSocket(WebSocketProtocol),
    Ftp(FtpProtocol),
}

impl Protocol {
    /// Runs a console command, the plugin's answer is in [`PluginResponse::message`]
    pub async fn execute_command(&self, cmd: &str) -> ProtocolResult<PluginResponse> {
        self.request("command", json!({ "cmd": cmd })).await
    }

    /// Relays a Discord message into the game
    pub async fn chat(&self, message: &ChatMessage) -> ProtocolResult<PluginResponse> {
        self.request("chat", serde_json::to_value(message)?).await
    }

    /// Registers a chat channel with the plugin, returning every registered channel
    pub async fn add_chat_channel(
        &self,
        channel: &ChatChannel,
    ) -> ProtocolResult<Vec<ChatChannel>> {
        let response = self
            .request("add-channel", serde_json::to_value(channel)?)
            .await?;
        channels_of(response)
    }

    pub async fn remove_chat_channel(
        &self,
        id: Id<ChannelMarker>,
    ) -> ProtocolResult<Vec<ChatChannel>> {
        let response = self.request("remove-channel", json!({ "id": id })).await?;
        channels_of(response)
    }

    /// Downloads a file, `remote_path` is relative to the server root
    pub async fn get_file(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        match self {
            Protocol::Http(http) => http.get_file(remote_path).await,
            Protocol::WebSocket(socket) => socket.get_file(remote_path).await,
            Protocol::Ftp(ftp) => ftp.get_file(remote_path).await,
        }
    }

    /// Tells the plugin to forget the bot
    pub async fn disconnect(&self) -> ProtocolResult<()> {
        match self {
            Protocol::Http(http) => http.disconnect().await,
            Protocol::WebSocket(socket) => socket.disconnect().await,
            Protocol::Ftp(_) => Ok(()),
        }
    }

    async fn request(
        &self,
        event: &str,
        data: serde_json::Value,
    ) -> ProtocolResult<PluginResponse> {
        match self {
            Protocol::Http(http) => http.request(event, data).await,
            Protocol::WebSocket(socket) => socket.request(event, data).await,
            Protocol::Ftp(_) => Err(ProtocolError::Unsupported(operation_name(event))),
        }
    }

    /// Logs in once to check that the FTP/SFTP credentials work
    pub async fn test_ftp(ftp: &FtpProtocol) -> ProtocolResult<()> {
        ftp.test().await
    }
}

fn operation_name(event: &str) -> &'static str {
    match event {
        "command" => "Executing commands",
        "chat" => "Chatting",
        "add-channel" | "remove-channel" => "Chat channels",
        _ => "This",
    }
}

fn channels_of(response: PluginResponse) -> ProtocolResult<Vec<ChatChannel>> {
    let channels = response
        .data
        .get("channels")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(vec![]));

    Ok(serde_json::from_value(channels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FtpCredentials;
    use test_case::test_case;

    #[test]
    fn reads_channels_from_response() {
        let response = PluginResponse::new(
            200,
            json!({ "channels": [{ "id": "5", "types": ["chat"], "webhook": "6" }] }),
        );

        let channels = channels_of(response).unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].webhook, Some(Id::new(6)));
    }

    #[test]
    fn missing_channels_are_empty() {
        assert!(channels_of(PluginResponse::new(200, json!({})))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn ftp_cannot_run_commands() {
        let protocol = Protocol::Ftp(FtpProtocol::ftp(
            "127.0.0.1",
            21,
            FtpCredentials {
                user: "user".to_string(),
                password: "pass".to_string(),
            },
        ));

        let err = protocol.execute_command("say hi").await.unwrap_err();

        assert!(matches!(err, ProtocolError::Unsupported("Executing commands")));
    }

    #[tokio::test]
    async fn websocket_without_socket_is_not_connected() {
        let protocol = Protocol::WebSocket(WebSocketProtocol::new(None));

        let err = protocol.execute_command("say hi").await.unwrap_err();

        assert!(matches!(err, ProtocolError::NotConnected));
    }

    #[test_case(ProtocolError::Timeout, "did not respond" ; "Timeout")]
    #[test_case(ProtocolError::Status { status: 401, message: None }, "rejected" ; "Unauthorized")]
    #[test_case(ProtocolError::Status { status: 500, message: Some("boom".to_string()) }, "boom" ; "Status with message")]
    #[test_case(ProtocolError::Unsupported("Chatting"), "Chatting needs the plugin" ; "Unsupported")]
    fn user_messages(err: ProtocolError, expected: &str) {
        assert!(err.user_message().contains(expected), "{}", err.user_message());
    }
}
