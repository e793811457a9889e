use super::{Record, Records};
use crate::payloads::ChatChannel;
use serde::{Deserialize, Serialize};
use twilight_model::id::{
    marker::{ChannelMarker, GuildMarker},
    Id,
};

/// The Minecraft server a guild is connected to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConnection {
    pub id: Id<GuildMarker>,
    pub ip: String,
    pub port: u16,
    /// Minor version, `19` for `1.19.2`
    pub version: u8,
    /// World folder, relative to the server root
    pub path: String,
    pub protocol: ServerProtocol,
    #[serde(default)]
    pub channels: Vec<ChatChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerProtocol {
    /// The plugin's REST API
    Http { token: String, hash: String },
    /// The plugin keeps a socket open to the bot
    #[serde(rename = "websocket")]
    WebSocket { hash: String },
    /// File access only
    Ftp(FtpCredentials),
    /// File access only
    Sftp(FtpCredentials),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpCredentials {
    pub user: String,
    pub password: String,
}

impl ServerProtocol {
    pub fn is_http(&self) -> bool {
        matches!(self, ServerProtocol::Http { .. })
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, ServerProtocol::WebSocket { .. })
    }

    /// Whether the plugin is installed, as opposed to plain file access
    pub fn has_plugin(&self) -> bool {
        self.is_http() || self.is_websocket()
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            ServerProtocol::Http { hash, .. } | ServerProtocol::WebSocket { hash } => Some(hash),
            ServerProtocol::Ftp(_) | ServerProtocol::Sftp(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerProtocol::Http { .. } => "HTTP",
            ServerProtocol::WebSocket { .. } => "WebSocket",
            ServerProtocol::Ftp(_) => "FTP",
            ServerProtocol::Sftp(_) => "SFTP",
        }
    }
}

impl ServerConnection {
    /// The registered channel with this id
    pub fn channel(&self, id: Id<ChannelMarker>) -> Option<&ChatChannel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    /// The registered records of `requested` channels, skipping unregistered ones
    pub fn target_channels(&self, requested: &[ChatChannel]) -> Vec<ChatChannel> {
        requested
            .iter()
            .filter_map(|channel| self.channel(channel.id).cloned())
            .collect()
    }
}

impl Record for ServerConnection {
    type Marker = GuildMarker;

    const FILE_NAME: &'static str = "connection.json";

    fn id(&self) -> Id<GuildMarker> {
        self.id
    }
}

impl Records<ServerConnection> {
    /// The HTTP server of `guild` listening on `ip:port`
    pub fn find_http(
        &self,
        guild: Id<GuildMarker>,
        ip: &str,
        port: u16,
    ) -> Option<ServerConnection> {
        self.find(|server| {
            server.id == guild
                && server.ip == ip
                && server.port == port
                && server.protocol.is_http()
        })
    }

    /// The WebSocket server whose token hashes to `hash`
    pub fn find_websocket(&self, hash: &str) -> Option<ServerConnection> {
        self.find(|server| {
            matches!(&server.protocol, ServerProtocol::WebSocket { hash: stored } if stored == hash)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        payloads::ChatType,
        storage::{hash_token, testing::temp_dir, Storage},
    };
    use test_case::test_case;

    fn server(id: u64, protocol: ServerProtocol) -> ServerConnection {
        ServerConnection {
            id: Id::new(id),
            ip: "10.0.0.1".to_string(),
            port: 11111,
            version: 19,
            path: "./world".to_string(),
            protocol,
            channels: vec![
                ChatChannel {
                    id: Id::new(100),
                    types: vec![ChatType::Chat],
                    webhook: Some(Id::new(200)),
                },
                ChatChannel {
                    id: Id::new(101),
                    types: vec![ChatType::Join],
                    webhook: None,
                },
            ],
        }
    }

    fn http() -> ServerProtocol {
        ServerProtocol::Http {
            token: "token".to_string(),
            hash: hash_token("token"),
        }
    }

    #[test_case(1, "10.0.0.1", 11111, true ; "Exact match")]
    #[test_case(2, "10.0.0.1", 11111, false ; "Other guild")]
    #[test_case(1, "10.0.0.2", 11111, false ; "Other ip")]
    #[test_case(1, "10.0.0.1", 11112, false ; "Other port")]
    #[tokio::test]
    async fn find_http(guild: u64, ip: &str, port: u16, found: bool) {
        let storage = Storage::open(temp_dir()).await.unwrap();
        storage.servers.connect(server(1, http())).await.unwrap();

        assert_eq!(storage.servers.find_http(Id::new(guild), ip, port).is_some(), found);
    }

    #[tokio::test]
    async fn find_http_ignores_other_protocols() {
        let storage = Storage::open(temp_dir()).await.unwrap();
        storage
            .servers
            .connect(server(1, ServerProtocol::WebSocket { hash: hash_token("token") }))
            .await
            .unwrap();

        assert!(storage.servers.find_http(Id::new(1), "10.0.0.1", 11111).is_none());
        assert!(storage.servers.find_websocket(&hash_token("token")).is_some());
        assert!(storage.servers.find_websocket(&hash_token("other")).is_none());
    }

    #[test]
    fn target_channels_keep_the_registered_record() {
        let server = server(1, http());
        let requested = vec![
            ChatChannel {
                id: Id::new(100),
                types: vec![],
                webhook: None,
            },
            ChatChannel {
                id: Id::new(999),
                types: vec![ChatType::Chat],
                webhook: None,
            },
        ];

        let targets = server.target_channels(&requested);

        assert_eq!(targets, vec![server.channels[0].clone()]);
    }

    #[test]
    fn protocol_serialises_with_a_type_tag() {
        let json = serde_json::to_value(ServerProtocol::Sftp(FtpCredentials {
            user: "user".to_string(),
            password: "pass".to_string(),
        }))
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "type": "sftp", "user": "user", "password": "pass" })
        );
    }
}
