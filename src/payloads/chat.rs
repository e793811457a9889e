use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use twilight_model::id::{
    marker::{ChannelMarker, GuildMarker, WebhookMarker},
    Id,
};

/// The kind of event the plugin relays
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatType {
    Chat,
    Join,
    Quit,
    Advancement,
    Death,
    PlayerCommand,
    ConsoleCommand,
    BlockCommand,
    Start,
    Close,
}

impl ChatType {
    pub fn is_command(self) -> bool {
        matches!(
            self,
            ChatType::PlayerCommand | ChatType::ConsoleCommand | ChatType::BlockCommand
        )
    }

    /// Types a chat channel relays when none are picked explicitly
    pub fn defaults() -> Vec<ChatType> {
        vec![
            ChatType::Chat,
            ChatType::Join,
            ChatType::Quit,
            ChatType::Advancement,
            ChatType::Death,
            ChatType::Start,
            ChatType::Close,
        ]
    }
}

/// A Discord channel registered to receive events from the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChannel {
    pub id: Id<ChannelMarker>,
    #[serde(default)]
    pub types: Vec<ChatType>,
    /// Chat messages are sent through this webhook, everything else as embeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Id<WebhookMarker>>,
}

/// An event sent by the plugin, over `POST /chat` or the `chat` socket event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// The guild the sending server is connected to
    pub id: Id<GuildMarker>,
    /// `ip:port` of the server, only sent over HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub player: String,
    pub message: String,
    #[serde(default)]
    pub channels: Vec<ChatChannel>,
}

impl ChatPayload {
    /// Splits [`Self::ip`] into host and port
    pub fn address(&self) -> Option<(&str, u16)> {
        let (ip, port) = self.ip.as_deref()?.rsplit_once(':')?;
        Some((ip, port.parse().ok()?))
    }

    /// The name of the executed command, for command events
    pub fn command_name(&self) -> &str {
        self.message
            .strip_prefix('/')
            .unwrap_or(&self.message)
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn payload(json: serde_json::Value) -> ChatPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn deserialises_http_payload() {
        let payload = payload(serde_json::json!({
            "id": "844156404477853716",
            "ip": "127.0.0.1:25565",
            "type": "player_command",
            "player": "Steve",
            "message": "/gamemode creative",
            "channels": [{ "id": "844156404477853717", "types": ["chat", "player_command"], "webhook": "844156404477853718" }]
        }));

        assert_eq!(payload.id, Id::new(844156404477853716));
        assert_eq!(payload.kind, ChatType::PlayerCommand);
        assert_eq!(payload.address(), Some(("127.0.0.1", 25565)));
        assert_eq!(payload.channels[0].webhook, Some(Id::new(844156404477853718)));
        assert!(payload.kind.is_command());
    }

    #[test]
    fn websocket_payload_has_no_address() {
        let payload = payload(serde_json::json!({
            "id": "1",
            "type": "join",
            "player": "Alex",
            "message": "Alex joined the game",
        }));

        assert_eq!(payload.address(), None);
        assert!(payload.channels.is_empty());
    }

    #[test_case("/gamemode creative", "gamemode" ; "Leading slash")]
    #[test_case("say hello", "say" ; "No slash")]
    #[test_case("/tp   Steve Alex", "tp" ; "Extra whitespace")]
    #[test_case("", "" ; "Empty")]
    fn command_name(message: &str, expected: &str) {
        let payload = payload(serde_json::json!({
            "id": "1",
            "type": "console_command",
            "message": message,
        }));

        assert_eq!(payload.command_name(), expected);
    }

    #[test]
    fn chat_type_round_trips_through_its_name() {
        use std::str::FromStr;

        assert_eq!(ChatType::PlayerCommand.to_string(), "player_command");
        assert_eq!(ChatType::from_str("block_command"), Ok(ChatType::BlockCommand));
    }
}
