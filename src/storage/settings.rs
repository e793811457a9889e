use super::{Record, Records};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use twilight_interactions::command::{CommandOption, CreateOption};
use twilight_model::id::{marker::GuildMarker, Id};

/// The kinds of things a guild can switch off
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    CommandOption,
    CreateOption,
)]
#[strum(serialize_all = "snake_case")]
pub enum DisableKind {
    #[option(name = "Commands", value = "commands")]
    Commands,
    #[option(name = "Chat Commands", value = "chat_commands")]
    ChatCommands,
    #[option(name = "Stats", value = "stats")]
    Stats,
    #[option(name = "Advancements", value = "advancements")]
    Advancements,
}

/// Disabled names, lowercased, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disabled {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default, rename = "chat-commands")]
    pub chat_commands: Vec<String>,
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default)]
    pub advancements: Vec<String>,
}

impl Disabled {
    fn list(&self, kind: DisableKind) -> &Vec<String> {
        match kind {
            DisableKind::Commands => &self.commands,
            DisableKind::ChatCommands => &self.chat_commands,
            DisableKind::Stats => &self.stats,
            DisableKind::Advancements => &self.advancements,
        }
    }

    fn list_mut(&mut self, kind: DisableKind) -> &mut Vec<String> {
        match kind {
            DisableKind::Commands => &mut self.commands,
            DisableKind::ChatCommands => &mut self.chat_commands,
            DisableKind::Stats => &mut self.stats,
            DisableKind::Advancements => &mut self.advancements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub id: Id<GuildMarker>,
    #[serde(default)]
    pub disabled: Disabled,
}

impl ServerSettings {
    pub fn new(id: Id<GuildMarker>) -> Self {
        Self {
            id,
            disabled: Disabled::default(),
        }
    }

    pub fn is_disabled(&self, kind: DisableKind, name: &str) -> bool {
        let name = name.to_lowercase();
        self.disabled.list(kind).contains(&name)
    }

    /// Returns `false` if `name` was already disabled
    pub fn disable(&mut self, kind: DisableKind, name: &str) -> bool {
        if self.is_disabled(kind, name) {
            return false;
        }

        self.disabled.list_mut(kind).push(name.to_lowercase());
        true
    }

    /// Returns `false` if `name` wasn't disabled
    pub fn enable(&mut self, kind: DisableKind, name: &str) -> bool {
        let name = name.to_lowercase();
        let list = self.disabled.list_mut(kind);
        let before = list.len();

        list.retain(|disabled| *disabled != name);
        list.len() != before
    }

    pub fn disabled(&self, kind: DisableKind) -> &[String] {
        self.disabled.list(kind)
    }
}

impl Record for ServerSettings {
    type Marker = GuildMarker;

    const FILE_NAME: &'static str = "settings.json";

    fn id(&self) -> Id<GuildMarker> {
        self.id
    }
}

impl Records<ServerSettings> {
    /// The stored settings, or the defaults if the guild never changed any
    pub fn get_or_default(&self, id: Id<GuildMarker>) -> ServerSettings {
        self.get(id).unwrap_or_else(|| ServerSettings::new(id))
    }

    pub fn is_disabled(&self, id: Id<GuildMarker>, kind: DisableKind, name: &str) -> bool {
        self.get(id)
            .is_some_and(|settings| settings.is_disabled(kind, name))
    }

    /// Applies `f` to the guild's settings, creating them first if needed, and persists
    /// the result. Returns what `f` returned.
    pub async fn update<R>(
        &self,
        id: Id<GuildMarker>,
        f: impl FnOnce(&mut ServerSettings) -> R,
    ) -> crate::Result<R> {
        let mut settings = self.get_or_default(id);
        let result = f(&mut settings);
        self.connect(settings).await?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DisableKind::Commands ; "Commands")]
    #[test_case(DisableKind::ChatCommands ; "Chat commands")]
    #[test_case(DisableKind::Stats ; "Stats")]
    #[test_case(DisableKind::Advancements ; "Advancements")]
    fn disable_then_enable(kind: DisableKind) {
        let mut settings = ServerSettings::new(Id::new(1));

        assert!(settings.disable(kind, "Gamemode"));
        assert!(!settings.disable(kind, "gamemode"));
        assert!(settings.is_disabled(kind, "GAMEMODE"));

        assert!(settings.enable(kind, "gameMode"));
        assert!(!settings.enable(kind, "gamemode"));
        assert!(!settings.is_disabled(kind, "gamemode"));
    }

    #[test]
    fn kinds_are_independent() {
        let mut settings = ServerSettings::new(Id::new(1));
        settings.disable(DisableKind::Stats, "mined");

        assert!(settings.is_disabled(DisableKind::Stats, "mined"));
        assert!(!settings.is_disabled(DisableKind::Advancements, "mined"));
        assert_eq!(settings.disabled(DisableKind::Stats), ["mined".to_string()]);
    }

    #[test]
    fn reads_older_files_without_every_list() {
        let settings: ServerSettings = serde_json::from_value(serde_json::json!({
            "id": "1",
            "disabled": { "chat-commands": ["tp"] }
        }))
        .unwrap();

        assert!(settings.is_disabled(DisableKind::ChatCommands, "tp"));
        assert!(settings.disabled.commands.is_empty());
    }

    #[tokio::test]
    async fn update_creates_missing_settings() {
        let storage = crate::storage::Storage::open(crate::storage::testing::temp_dir())
            .await
            .unwrap();

        let changed = storage
            .server_settings
            .update(Id::new(1), |settings| settings.disable(DisableKind::Commands, "op"))
            .await
            .unwrap();

        assert!(changed);
        assert!(storage
            .server_settings
            .is_disabled(Id::new(1), DisableKind::Commands, "op"));
    }
}
