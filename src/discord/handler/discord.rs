use super::MessageExt;
use crate::{
    config,
    discord::{
        autocomplete, buttons, colours,
        commands::{self, CommandContext},
        reactions, Discord,
    },
    payloads::{ChatMessage, ChatType},
    sanitizer::CleanString,
    storage::DisableKind,
    Result,
};
use std::{ops::Deref, sync::Arc};
use twilight_gateway::Event;
use twilight_model::{
    application::interaction::{
        application_command::CommandData, Interaction, InteractionData, InteractionType,
    },
    channel::message::MessageFlags,
    gateway::payload::incoming::{GuildDelete, MessageCreate},
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    id::{marker::GuildMarker, Id},
};
use twilight_util::builder::{embed::EmbedBuilder, InteractionResponseDataBuilder};
use twilight_webhook::cache::PermissionsSource;

/// Longest message the plugin relays into the game
const MAX_MESSAGE_LENGTH: usize = 256;

pub struct DiscordHandler(Arc<Discord>);

impl Deref for DiscordHandler {
    type Target = Discord;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DiscordHandler {
    pub fn new(discord: Arc<Discord>) -> Self {
        Self(discord)
    }

    pub async fn handle_discord_event(&self, event: Event) {
        tracing::trace!("{event:?}");
        self.cache.update(&event);

        if let Err(err) = self
            .webhook_cache
            .update(
                &event,
                &self.http,
                // Only `WebhooksUpdate` needs permissions, rare enough to ask the API
                PermissionsSource::Request,
            )
            .await
        {
            tracing::warn!("Error updating webhook cache: {err}");
        }

        match event {
            Event::Ready(ready) => {
                tracing::info!(
                    "{} is connected to {} guilds!",
                    ready.user.name,
                    ready.guilds.len()
                );
            }
            Event::GuildCreate(guild) => {
                tracing::info!("Joined guild {} ({})", guild.name, guild.id);
            }
            Event::GuildDelete(guild) => self.handle_guild_delete(guild).await,
            Event::MessageCreate(message) => self.handle_message_create(*message).await,
            Event::InteractionCreate(interaction) => {
                if let Err(err) = self.handle_interaction(interaction.0).await {
                    tracing::error!("Failed to handle interaction: {err}");
                }
            }
            _ => {}
        }
    }

    /// The bot was kicked or the guild was deleted, not just an outage
    async fn handle_guild_delete(&self, guild: GuildDelete) {
        if guild.unavailable {
            return;
        }

        tracing::info!("Left guild {}", guild.id);

        if let Some((_, protocol)) = self.server(guild.id) {
            if let Err(err) = protocol.disconnect().await {
                tracing::debug!("Plugin of {} did not acknowledge the disconnect: {err}", guild.id);
            }
        }

        if let Some(socket) = self.protocols.sockets.get(guild.id) {
            self.protocols.sockets.unregister(guild.id, &socket);
        }

        if let Err(err) = self.storage.disconnect_server(guild.id).await {
            tracing::error!("Could not delete the data of guild {}: {err}", guild.id);
        }
    }

    async fn handle_message_create(&self, message: MessageCreate) {
        if message.author.bot {
            return;
        }

        let Some(guild_id) = message.guild_id else {
            return;
        };

        let current_user = self.cache.current_user().map(|user| user.id);
        if current_user.is_some_and(|id| is_bare_mention(&message.content, id.get())) {
            self.reply_to_mention(&message).await;
            return;
        }

        if message.content.starts_with(&config().prefix) {
            return;
        }

        let Some((server, protocol)) = self.server(guild_id) else {
            return;
        };

        if !server
            .channel(message.channel_id)
            .is_some_and(|channel| channel.types.contains(&ChatType::Chat))
        {
            return;
        }

        tracing::debug!(
            "Discord Message: {} - {} (#{})",
            message.author.name,
            message.content,
            message.channel_id
        );

        let (author, author_cleaned) = CleanString::new(match &message.referenced_message {
            Some(reply) => format!(
                "{author} ≫ {replying_to}",
                author = message.get_author_display_name(),
                replying_to = reply.get_author_display_name()
            ),
            None => message.get_author_display_name().to_string(),
        });
        let (mut content, content_cleaned) = CleanString::new(message.content_clean(&self.cache));

        if author.is_empty() || content.is_empty() {
            message.react(self.http.clone(), &reactions::EMPTY_FIELD);
            return;
        }

        if author_cleaned || content_cleaned {
            message.react(self.http.clone(), &reactions::ILLEGAL_CHARACTERS);
        }

        if content.truncate_chars(MAX_MESSAGE_LENGTH) {
            message.react(self.http.clone(), &reactions::TOO_LONG);
        }

        let chat = ChatMessage {
            msg: content.into_inner(),
            username: author.into_inner(),
            private: false,
            target: None,
        };

        if let Err(err) = protocol.chat(&chat).await {
            tracing::warn!("Could not relay message to the server of {guild_id}: {err}");
            message.react(self.http.clone(), &reactions::NOT_DELIVERED);
        }
    }

    async fn reply_to_mention(&self, message: &MessageCreate) {
        let embed = EmbedBuilder::new()
            .description(":wave: I use slash commands. Type `/help` to see a list of commands.")
            .color(colours::GREEN)
            .build();

        let result = match self
            .http
            .create_message(message.channel_id)
            .reply(message.id)
            .embeds(&[embed])
        {
            Ok(request) => request.await.map(|_| ()).map_err(crate::Error::from),
            Err(err) => Err(err.into()),
        };

        if let Err(err) = result {
            tracing::warn!("Failed to reply to mention: {err}");
        }
    }

    async fn handle_interaction(&self, mut interaction: Interaction) -> Result<()> {
        let Some(guild_id) = interaction.guild_id else {
            return self
                .respond(
                    &interaction,
                    InteractionResponseType::ChannelMessageWithSource,
                    Some(
                        InteractionResponseDataBuilder::new()
                            .embeds([EmbedBuilder::new()
                                .description(":warning: I can only be used in server channels!")
                                .color(colours::RED)
                                .build()])
                            .build(),
                    ),
                )
                .await;
        };

        match interaction.data.take() {
            Some(InteractionData::ApplicationCommand(data)) => match interaction.kind {
                InteractionType::ApplicationCommandAutocomplete => {
                    self.handle_autocomplete(&interaction, &data).await
                }
                _ => self.handle_command(&interaction, guild_id, *data).await,
            },
            Some(InteractionData::MessageComponent(data)) => {
                buttons::handle(&self.0, &interaction, guild_id, &data).await
            }
            _ => Ok(()),
        }
    }

    async fn handle_command(
        &self,
        interaction: &Interaction,
        guild_id: Id<GuildMarker>,
        data: CommandData,
    ) -> Result<()> {
        let Some(user) = interaction.author() else {
            return Ok(());
        };

        tracing::info!("{} ran /{} in {guild_id}", user.name, data.name);

        if self.is_command_disabled(guild_id, &data.name) {
            return self
                .respond(
                    interaction,
                    InteractionResponseType::ChannelMessageWithSource,
                    Some(
                        InteractionResponseDataBuilder::new()
                            .embeds([EmbedBuilder::new()
                                .description(format!(
                                    ":no_entry: Command [**{}**] disabled!",
                                    data.name
                                ))
                                .color(colours::RED)
                                .build()])
                            .flags(MessageFlags::EPHEMERAL)
                            .build(),
                    ),
                )
                .await;
        }

        let deferred = commands::is_ephemeral(&data.name)
            .then(|| InteractionResponseDataBuilder::new().flags(MessageFlags::EPHEMERAL).build());
        self.respond(
            interaction,
            InteractionResponseType::DeferredChannelMessageWithSource,
            deferred,
        )
        .await?;

        let ctx = CommandContext {
            discord: &self.0,
            guild_id,
            user,
            token: &interaction.token,
        };

        let response = match commands::run(data, &ctx).await {
            Ok(response) => response,
            Err(err) => err.into(),
        };

        let (embed, components) = response.into_parts();

        self.http
            .interaction(self.application_id)
            .update_response(&interaction.token)
            .embeds(Some(&[embed]))?
            .components(Some(&components))?
            .await?;

        Ok(())
    }

    fn is_command_disabled(&self, guild_id: Id<GuildMarker>, name: &str) -> bool {
        !commands::ALWAYS_ENABLED.contains(&name)
            && self
                .storage
                .server_settings
                .is_disabled(guild_id, DisableKind::Commands, name)
    }

    async fn handle_autocomplete(&self, interaction: &Interaction, data: &CommandData) -> Result<()> {
        let choices = autocomplete::choices(data).unwrap_or_else(|err| {
            tracing::warn!("{err}");
            Vec::new()
        });

        self.respond(
            interaction,
            InteractionResponseType::ApplicationCommandAutocompleteResult,
            Some(InteractionResponseDataBuilder::new().choices(choices).build()),
        )
        .await
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        kind: InteractionResponseType,
        data: Option<InteractionResponseData>,
    ) -> Result<()> {
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &InteractionResponse { kind, data })
            .await?;

        Ok(())
    }
}

/// `<@id>` or `<@!id>` and nothing else
fn is_bare_mention(content: &str, id: u64) -> bool {
    let content = content.trim();

    content == format!("<@{id}>") || content == format!("<@!{id}>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("<@712>", true ; "Mention")]
    #[test_case(" <@!712> ", true ; "Nickname mention")]
    #[test_case("<@712> hello", false ; "Mention with text")]
    #[test_case("<@713>", false ; "Someone else")]
    fn bare_mentions(content: &str, expected: bool) {
        assert_eq!(is_bare_mention(content, 712), expected);
    }
}
