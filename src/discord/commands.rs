mod account;
mod advancements;
mod chatchannel;
mod command;
mod connect;
mod disable;
mod disconnect;
mod help;
mod message;
mod op;
mod stats;

use super::{buttons::Toggle, colours, Discord};
use crate::{
    minecraft::{self, Profile},
    protocol::{Protocol, ProtocolError},
    sanitizer::ValidIGN,
    storage::ServerConnection,
    Result,
};
use async_trait::async_trait;
use lazy_regex::regex_captures;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    application::{command::Command, interaction::application_command::CommandData},
    channel::message::{Component, Embed},
    id::{
        marker::{GuildMarker, UserMarker},
        Id,
    },
    user::User,
};
use twilight_util::builder::embed::EmbedBuilder;

macro_rules! commands {
    ($($module:ident::$command:ident),* $(,)?) => {
        /// Every slash command, ready to be registered
        pub fn all() -> Vec<Command> {
            vec![$($module::$command::create_command().into()),*]
        }

        /// Whether `name` is one of the bot's commands
        pub fn exists(name: &str) -> bool {
            [$($module::$command::NAME),*].contains(&name)
        }

        /// Parses and runs the command in `data`
        pub async fn run(data: CommandData, ctx: &CommandContext<'_>) -> Result<CommandResponse> {
            let result = match data.name.as_str() {
                $($module::$command::NAME => {
                    $module::$command::from_interaction(data.into())?.run(ctx).await
                })*
                _ => return Err(anyhow::anyhow!("Unknown command /{}", data.name).into()),
            };

            Ok(result.unwrap_or_else(|response| response))
        }
    };
}

commands! {
    help::HelpCommand,
    connect::ConnectCommand,
    disconnect::DisconnectCommand,
    chatchannel::ChatChannelCommand,
    account::AccountCommand,
    command::CommandCommand,
    op::OpCommand,
    op::DeopCommand,
    message::MessageCommand,
    stats::StatsCommand,
    advancements::AdvancementsCommand,
    disable::DisableCommand,
    disable::EnableCommand,
}

/// Commands which can't be turned off with `/disable commands`
pub const ALWAYS_ENABLED: [&str; 3] = ["help", "enable", "disable"];

/// Commands whose reply only the user who ran them sees
pub fn is_ephemeral(name: &str) -> bool {
    name == message::MessageCommand::NAME
}

/// An early return carries the reply as well, so commands can use `?` on anything that
/// converts into a [`CommandResponse`]
pub type CommandResult = std::result::Result<CommandResponse, CommandResponse>;

#[async_trait]
pub trait RunCommand: CommandModel {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult;
}

#[derive(Debug)]
pub enum CommandResponse {
    Success(String),
    Warning(String),
    Failure(String),
    Embed(Box<Embed>),
    /// An embed with buttons below it
    Buttons(Box<Embed>, Vec<Component>),
}

impl CommandResponse {
    pub fn into_parts(self) -> (Embed, Vec<Component>) {
        let (description, colour) = match self {
            CommandResponse::Success(description) => (description, colours::GREEN),
            CommandResponse::Warning(description) => (description, colours::YELLOW),
            CommandResponse::Failure(description) => (description, colours::RED),
            CommandResponse::Embed(embed) => return (*embed, Vec::new()),
            CommandResponse::Buttons(embed, components) => return (*embed, components),
        };

        let embed = EmbedBuilder::new()
            .description(description)
            .color(colour)
            .build();

        (embed, Vec::new())
    }

    /// A success or failure with a button to undo it
    pub fn toggled(description: String, undo: Toggle) -> Self {
        let embed = EmbedBuilder::new()
            .description(description)
            .color(colours::GREEN)
            .build();

        CommandResponse::Buttons(Box::new(embed), vec![undo.action_row()])
    }
}

impl From<ProtocolError> for CommandResponse {
    fn from(error: ProtocolError) -> Self {
        tracing::debug!("Plugin request failed: {error}");
        CommandResponse::Failure(format!(":warning: {}", error.user_message()))
    }
}

impl From<crate::Error> for CommandResponse {
    fn from(error: crate::Error) -> Self {
        tracing::error!("Command failed: {error}");
        CommandResponse::Failure(":warning: An unknown error occurred.".to_string())
    }
}

/// Everything a command may need about where it was run
pub struct CommandContext<'a> {
    pub discord: &'a Discord,
    pub guild_id: Id<GuildMarker>,
    pub user: &'a User,
    pub token: &'a str,
}

/// A player a command is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub uuid: String,
    pub name: String,
}

impl From<Profile> for Player {
    fn from(profile: Profile) -> Self {
        Self {
            uuid: profile.uuid,
            name: profile.name,
        }
    }
}

impl CommandContext<'_> {
    /// Replaces the deferred reply while the command keeps running
    pub async fn update(&self, response: CommandResponse) -> Result<()> {
        let (embed, components) = response.into_parts();

        self.discord
            .http
            .interaction(self.discord.application_id)
            .update_response(self.token)
            .embeds(Some(&[embed]))?
            .components(Some(&components))?
            .await?;

        Ok(())
    }

    /// The server the guild is connected to
    pub fn server(&self) -> std::result::Result<(ServerConnection, Protocol), CommandResponse> {
        self.discord.server(self.guild_id).ok_or_else(|| {
            CommandResponse::Failure(
                ":warning: This server isn't connected to a Minecraft server. Use `/connect` first."
                    .to_string(),
            )
        })
    }

    /// Resolves a `<player>` option, either a mention of a user with a connected account
    /// or a Minecraft username
    pub async fn player(&self, input: &str) -> std::result::Result<Player, CommandResponse> {
        if let Some(user_id) = mentioned_user(input) {
            return match self.discord.storage.users.get(user_id) {
                Some(user) => Ok(Player {
                    uuid: user.uuid,
                    name: user.username,
                }),
                None => Err(CommandResponse::Failure(format!(
                    ":warning: <@{user_id}> hasn't connected their Minecraft account. They can do so with `/account connect`."
                ))),
            };
        }

        let ign = ValidIGN::try_from(input).map_err(|err| {
            CommandResponse::Failure(format!(
                ":warning: `{input}` is not a valid Minecraft username, {err}"
            ))
        })?;

        Ok(lookup_profile(self.discord.protocols.client(), &ign).await?.into())
    }
}

/// Finds the Java profile of `ign`. Bedrock players joining through Floodgate have none.
async fn lookup_profile(
    client: &reqwest::Client,
    ign: &ValidIGN,
) -> std::result::Result<Profile, CommandResponse> {
    if ign.is_bedrock() {
        return Err(CommandResponse::Failure(format!(
            ":warning: **{ign}** is a Bedrock player, only Java accounts can be looked up"
        )));
    }

    match minecraft::fetch_profile(client, ign).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(CommandResponse::Failure(format!(
            ":warning: Player **{ign}** does not exist"
        ))),
        Err(err) => {
            tracing::warn!("Mojang lookup of {ign} failed: {err}");
            Err(CommandResponse::Failure(
                ":warning: Could not look up the player, try again later.".to_string(),
            ))
        }
    }
}

fn mentioned_user(input: &str) -> Option<Id<UserMarker>> {
    let (_, id) = regex_captures!(r"^<@!?(\d+)>$", input.trim())?;
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("<@844156404477853716>", Some(844156404477853716) ; "Mention")]
    #[test_case("<@!844156404477853716>", Some(844156404477853716) ; "Nickname mention")]
    #[test_case(" <@844156404477853716> ", Some(844156404477853716) ; "Padded")]
    #[test_case("<@&844156404477853716>", None ; "Role mention")]
    #[test_case("Notch", None ; "Username")]
    fn parses_mentions(input: &str, expected: Option<u64>) {
        assert_eq!(mentioned_user(input), expected.map(Id::new));
    }

    #[tokio::test]
    async fn bedrock_players_skip_the_mojang_lookup() {
        let ign = ValidIGN::try_from(".BedrockSteve").unwrap();

        assert!(matches!(
            lookup_profile(&reqwest::Client::new(), &ign).await,
            Err(CommandResponse::Failure(message)) if message.contains("Bedrock player")
        ));
    }

    #[test]
    fn registers_every_command() {
        let commands = all();

        assert_eq!(commands.len(), 13);
        for name in ALWAYS_ENABLED {
            assert!(exists(name), "{name}");
        }
        assert!(!exists("kick"));
    }

    #[test_case(CommandResponse::Success("ok".to_string()), colours::GREEN ; "Success")]
    #[test_case(CommandResponse::Warning("hm".to_string()), colours::YELLOW ; "Warning")]
    #[test_case(CommandResponse::Failure("no".to_string()), colours::RED ; "Failure")]
    fn response_colours(response: CommandResponse, colour: u32) {
        let (embed, components) = response.into_parts();

        assert_eq!(embed.color, Some(colour));
        assert!(components.is_empty());
    }

    #[test]
    fn protocol_errors_fail() {
        let response = CommandResponse::from(ProtocolError::NotConnected);

        assert!(matches!(response, CommandResponse::Failure(_)));
    }
}
