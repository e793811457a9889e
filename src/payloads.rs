//! Types exchanged with the Minecraft plugin

mod chat;
mod plugin;

pub use chat::{ChatChannel, ChatPayload, ChatType};
pub use plugin::{ChatMessage, PluginResponse, ServerInfo};

use crate::storage::ServerConnection;

/// A plugin event, together with the server it was matched to
#[derive(Debug, Clone)]
pub struct Relay {
    pub server: ServerConnection,
    pub payload: ChatPayload,
}
