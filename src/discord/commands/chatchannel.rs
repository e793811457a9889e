use super::{CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::{
    discord::colours,
    payloads::{ChatChannel, ChatType},
};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    channel::message::embed::EmbedField,
    guild::Permissions,
    id::{marker::ChannelMarker, Id},
};
use twilight_util::builder::embed::EmbedBuilder;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "chatchannel",
    desc = "Manage the channels the server's chat is relayed to",
    default_permissions = "permissions",
    dm_permission = false
)]
pub enum ChatChannelCommand {
    #[command(name = "add")]
    Add(AddChatChannel),
    #[command(name = "remove")]
    Remove(RemoveChatChannel),
    #[command(name = "list")]
    List(ListChatChannels),
}

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "add", desc = "Relay the server's chat to a channel")]
pub struct AddChatChannel {
    /// The channel to relay to
    #[command(channel_types = "guild_text guild_announcement public_thread private_thread")]
    channel: Id<ChannelMarker>,
    /// Relay chat messages (default true)
    chat: Option<bool>,
    /// Relay joins (default true)
    join: Option<bool>,
    /// Relay leaves (default true)
    quit: Option<bool>,
    /// Relay advancements (default true)
    advancement: Option<bool>,
    /// Relay deaths (default true)
    death: Option<bool>,
    /// Relay commands run by players (default false)
    player_commands: Option<bool>,
    /// Relay commands run in the console (default false)
    console_commands: Option<bool>,
    /// Relay commands run by command blocks (default false)
    block_commands: Option<bool>,
    /// Relay server starts (default true)
    start: Option<bool>,
    /// Relay server stops (default true)
    close: Option<bool>,
    /// Send chat messages through a webhook with the player's name and head (default true)
    webhooks: Option<bool>,
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "remove", desc = "Stop relaying the server's chat to a channel")]
pub struct RemoveChatChannel {
    /// The channel to stop relaying to
    #[command(channel_types = "guild_text guild_announcement public_thread private_thread")]
    channel: Id<ChannelMarker>,
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "list", desc = "List the channels the server's chat is relayed to")]
pub struct ListChatChannels;

#[async_trait]
impl RunCommand for ChatChannelCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        match self {
            ChatChannelCommand::Add(command) => command.run(ctx).await,
            ChatChannelCommand::Remove(command) => command.run(ctx).await,
            ChatChannelCommand::List(_) => list(ctx),
        }
    }
}

impl AddChatChannel {
    /// The chosen types, starting from the defaults
    fn types(&self) -> Vec<ChatType> {
        let mut types = ChatType::defaults();
        let choices = [
            (ChatType::Chat, self.chat),
            (ChatType::Join, self.join),
            (ChatType::Quit, self.quit),
            (ChatType::Advancement, self.advancement),
            (ChatType::Death, self.death),
            (ChatType::PlayerCommand, self.player_commands),
            (ChatType::ConsoleCommand, self.console_commands),
            (ChatType::BlockCommand, self.block_commands),
            (ChatType::Start, self.start),
            (ChatType::Close, self.close),
        ];

        for (kind, choice) in choices {
            match choice {
                Some(true) if !types.contains(&kind) => types.push(kind),
                Some(false) => types.retain(|existing| *existing != kind),
                _ => {}
            }
        }

        types
    }

    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let (server, protocol) = ctx.server()?;
        let types = self.types();

        if types.is_empty() {
            return Err(CommandResponse::Failure(
                ":warning: Choose at least one type of message to relay.".to_string(),
            ));
        }

        let discord = ctx.discord;
        let existing = server.channel(self.channel).and_then(|channel| channel.webhook);

        let webhook = match (self.webhooks.unwrap_or(true), existing) {
            (false, _) => None,
            (true, Some(webhook)) => Some(webhook),
            (true, None) if types.contains(&ChatType::Chat) => {
                let channel = discord.channel(self.channel).await?;
                Some(discord.create_webhook(&channel, "MC Linker").await?.id)
            }
            (true, None) => None,
        };

        let channel = ChatChannel {
            id: self.channel,
            types,
            webhook,
        };

        let channels = match protocol.add_chat_channel(&channel).await {
            Ok(channels) => channels,
            Err(err) => {
                if let Some(webhook) = webhook.filter(|webhook| existing != Some(*webhook)) {
                    if let Err(err) = discord.webhook_cache.delete(&discord.http, webhook).await {
                        tracing::warn!("Could not delete unused webhook {webhook}: {err}");
                    }
                }

                return Err(err.into());
            }
        };

        discord
            .storage
            .servers
            .edit(ctx.guild_id, |server| server.channels = channels)
            .await?;

        Ok(CommandResponse::Success(format!(
            ":white_check_mark: Now relaying {} to <#{}>.",
            describe_types(&channel.types),
            channel.id
        )))
    }
}

impl RemoveChatChannel {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let (server, protocol) = ctx.server()?;

        let Some(removed) = server.channel(self.channel).cloned() else {
            return Err(CommandResponse::Failure(format!(
                ":warning: <#{}> is not a chat channel.",
                self.channel
            )));
        };

        let channels = protocol.remove_chat_channel(self.channel).await?;
        let discord = ctx.discord;

        // Channels of a thread's parent share its webhook
        if let Some(webhook) = removed.webhook {
            if !channels.iter().any(|channel| channel.webhook == Some(webhook)) {
                if let Err(err) = discord.webhook_cache.delete(&discord.http, webhook).await {
                    tracing::debug!("Could not delete webhook {webhook}: {err}");
                }
            }
        }

        discord
            .storage
            .servers
            .edit(ctx.guild_id, |server| server.channels = channels)
            .await?;

        Ok(CommandResponse::Success(format!(
            ":white_check_mark: Stopped relaying to <#{}>.",
            self.channel
        )))
    }
}

fn list(ctx: &CommandContext<'_>) -> CommandResult {
    let (server, _) = ctx.server()?;

    if server.channels.is_empty() {
        return Err(CommandResponse::Warning(
            ":warning: No chat channels yet. Add one with `/chatchannel add`.".to_string(),
        ));
    }

    let mut embed = EmbedBuilder::new()
        .title("Chat Channels")
        .color(colours::GREEN);

    for channel in &server.channels {
        embed = embed.field(EmbedField {
            name: format!(
                "{} {}",
                channel_name(ctx, channel.id),
                if channel.webhook.is_some() { "(webhook)" } else { "" }
            )
            .trim()
            .to_string(),
            value: describe_types(&channel.types),
            inline: false,
        });
    }

    Ok(CommandResponse::Embed(Box::new(embed.build())))
}

/// Field names can't contain mentions
fn channel_name(ctx: &CommandContext<'_>, id: Id<ChannelMarker>) -> String {
    ctx.discord
        .cache
        .channel(id)
        .and_then(|channel| channel.name.clone())
        .map_or_else(|| id.to_string(), |name| format!("#{name}"))
}

fn describe_types(types: &[ChatType]) -> String {
    types
        .iter()
        .map(|kind| format!("`{kind}`"))
        .collect::<Vec<_>>()
        .join(", ")
}
