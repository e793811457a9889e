//! The Discord half of the bot

mod autocomplete;
mod buttons;
mod commands;
mod handler;
mod reactions;

use crate::{
    config,
    oauth::OAuth,
    payloads::Relay,
    protocol::{Protocol, Protocols},
    storage::{ServerConnection, Storage},
    Result,
};
use std::sync::Arc;
use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{Config, Intents, Shard, ShardId};
use twilight_http::Client as HttpClient;
use twilight_model::{
    channel::{message::Embed, Channel, Webhook},
    gateway::{
        payload::outgoing::update_presence::UpdatePresencePayload,
        presence::{ActivityType, MinimalActivity, Status},
    },
    id::{
        marker::{ApplicationMarker, ChannelMarker, GuildMarker},
        Id,
    },
};
use twilight_util::builder::embed::EmbedBuilder;
use twilight_webhook::{cache::WebhooksCache, util::owner_channel_id};

pub mod colours {
    /// Embed colour to indicate a successful operation
    pub const GREEN: u32 = 0x47F04A;
    /// Embed colour to indicate a failed operation
    pub const RED: u32 = 0xF04A47;
    /// Embed colour for warnings and advancements
    pub const YELLOW: u32 = 0xF0C747;
}

/// State shared by everything that talks to Discord
pub struct Discord {
    pub http: Arc<HttpClient>,
    pub cache: InMemoryCache,
    pub webhook_cache: WebhooksCache,
    pub application_id: Id<ApplicationMarker>,
    pub storage: Arc<Storage>,
    pub protocols: Arc<Protocols>,
    pub oauth: Arc<OAuth>,
}

impl Discord {
    pub fn new(
        http: Arc<HttpClient>,
        application_id: Id<ApplicationMarker>,
        storage: Arc<Storage>,
        protocols: Arc<Protocols>,
        oauth: Arc<OAuth>,
    ) -> Self {
        let cache = InMemoryCache::builder()
            .resource_types(
                ResourceType::CHANNEL
                    | ResourceType::GUILD
                    | ResourceType::ROLE
                    | ResourceType::USER_CURRENT,
            )
            .build();

        Self {
            http,
            cache,
            webhook_cache: WebhooksCache::new(),
            application_id,
            storage,
            protocols,
            oauth,
        }
    }

    /// Fetches the id of the application the token belongs to
    pub async fn fetch_application_id(http: &HttpClient) -> Result<Id<ApplicationMarker>> {
        Ok(http.current_user_application().await?.model().await?.id)
    }

    /// Registers the slash commands, to `COMMANDS_GUILD_ID` if it is set, and the linked
    /// role metadata
    pub async fn register_commands(&self) -> Result<()> {
        let commands = commands::all();
        let interaction = self.http.interaction(self.application_id);

        match config().commands_guild_id {
            Some(guild_id) => {
                interaction
                    .set_guild_commands(Id::new(guild_id), &commands)
                    .await?;
                tracing::info!("Registered {} commands to {guild_id}", commands.len());
            }
            None => {
                interaction.set_global_commands(&commands).await?;
                tracing::info!("Registered {} global commands", commands.len());
            }
        }

        if let Err(err) = self.oauth.register_metadata(&config().discord_token).await {
            tracing::warn!("Could not register linked role metadata: {err}");
        }

        Ok(())
    }

    /// Runs the gateway, handling Discord events and relaying plugin events until the
    /// gateway fails fatally
    pub async fn run(self: Arc<Self>, relay: async_broadcast::Receiver<Relay>) -> Result<()> {
        let minecraft = Arc::new(handler::Minecraft::new(self.clone()));
        tokio::spawn(minecraft.run(relay));

        let discord = Arc::new(handler::Discord::new(self.clone()));

        let mut shard = Shard::with_config(
            ShardId::ONE,
            Config::builder(
                config().discord_token.clone(),
                Intents::GUILDS
                    | Intents::GUILD_MESSAGES
                    | Intents::MESSAGE_CONTENT
                    | Intents::GUILD_WEBHOOKS,
            )
            .presence(presence()?)
            .build(),
        );

        loop {
            let event = match shard.next_event().await {
                Ok(event) => event,
                Err(source) => {
                    tracing::warn!(?source, "Error receiving gateway event");

                    if source.is_fatal() {
                        return Err(anyhow::anyhow!("Gateway connection failed: {source}").into());
                    }

                    continue;
                }
            };

            let discord = discord.clone();
            tokio::spawn(async move { discord.handle_discord_event(event).await });
        }
    }

    /// The stored server of a guild and the protocol to reach it
    pub fn server(&self, guild_id: Id<GuildMarker>) -> Option<(ServerConnection, Protocol)> {
        let server = self.storage.servers.get(guild_id)?;
        let protocol = self.protocols.for_server(&server);

        Some((server, protocol))
    }

    /// The channel from the cache, or from the API if it isn't cached
    pub async fn channel(&self, channel_id: Id<ChannelMarker>) -> Result<Channel> {
        if let Some(channel) = self.cache.channel(channel_id) {
            return Ok(channel.clone());
        }

        Ok(self.http.channel(channel_id).await?.model().await?)
    }

    /// Creates a webhook chat can be relayed through in `channel`, or in its parent if it
    /// is a thread
    pub async fn create_webhook(&self, channel: &Channel, name: &str) -> Result<Webhook> {
        let request = self
            .http
            .create_webhook(owner_channel_id(channel), name)?;

        Ok(self.webhook_cache.create(request).await?)
    }

    /// Sends an embed, logging failures
    pub async fn send_embed(&self, channel_id: Id<ChannelMarker>, embed: Embed) {
        let result = match self.http.create_message(channel_id).embeds(&[embed]) {
            Ok(request) => request.await.map(|_| ()).map_err(crate::Error::from),
            Err(err) => Err(err.into()),
        };

        if let Err(err) = result {
            tracing::warn!("Failed to send embed to {channel_id}: {err}");
        }
    }
}

/// "Listening to /help"
fn presence() -> Result<UpdatePresencePayload> {
    let activity = MinimalActivity {
        kind: ActivityType::Listening,
        name: "/help".to_string(),
        url: None,
    };

    UpdatePresencePayload::new(vec![activity.into()], false, None, Status::Online)
        .map_err(|err| anyhow::anyhow!("Invalid presence: {err}").into())
}

/// An embed with just a description and colour
pub fn basic_embed(description: impl Into<String>, colour: u32) -> Embed {
    EmbedBuilder::new()
        .description(description)
        .color(colour)
        .build()
}
