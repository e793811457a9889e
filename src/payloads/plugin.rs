use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The answer to a request sent to the plugin
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    pub status: u16,
    pub data: Value,
}

impl PluginResponse {
    /// Status the plugin uses for "executed, but with warnings"
    pub const WARNING: u16 = 206;

    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    pub fn is_warning(&self) -> bool {
        self.status == Self::WARNING
    }

    /// The message the command printed, if any
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}

/// A Discord message relayed into the Minecraft chat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub msg: String,
    pub username: String,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// What the plugin reports about its server once connected
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    /// Path of the world folder, relative to the server root
    pub path: String,
    /// Full version, `1.19.2`
    pub version: String,
}
