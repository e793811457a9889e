use dashmap::{mapref::one::Ref, DashMap};
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::{request::channel::webhook::CreateWebhook, Client};
use twilight_model::{
    channel::Webhook,
    gateway::event::Event,
    guild::Permissions,
    id::{
        marker::{ChannelMarker, GuildMarker, UserMarker, WebhookMarker},
        Id,
    },
};

#[derive(thiserror::Error, Debug)]
/// An error occurred when trying to update the cache
pub enum Error {
    /// An error was returned by Twilight's HTTP client while making the request
    #[error("An error was returned by Twilight's HTTP client: {0}")]
    Http(#[from] twilight_http::error::Error),
    /// An error was returned by Twilight's HTTP client while deserializing the
    /// response
    #[error(
        "An error was returned by Twilight's HTTP client while deserializing the response: {0}"
    )]
    Deserialize(#[from] twilight_http::response::DeserializeBodyError),
    /// An error was returned by Twilight while validating a request
    #[error("An error was returned by Twilight while validating a request: {0}")]
    Validation(#[from] twilight_validate::request::ValidationError),
    /// An error was returned by Twilight while trying to get the permissions
    /// from the cache
    #[error(
        "An error was returned by Twilight while trying to get the permissions from the cache: {0}"
    )]
    CachePermissions(#[from] twilight_cache_inmemory::permission::ChannelError),
}

#[derive(Debug, Clone)]
/// Specify how permissions are handled on [`WebhooksCache::update`]
pub enum PermissionsSource<'cache> {
    /// Use the given permissions
    Given(Permissions),
    /// Use the cache to get permissions
    ///
    /// Refer to [Twilight's docs] to make sure the passed cache is valid
    ///
    /// [Twilight's docs]:https://api.twilight.rs/twilight_cache_inmemory/permission/index.html
    Cached {
        /// The cache to get the permissions from
        cache: &'cache InMemoryCache,
        /// The bot's ID
        current_user_id: Id<UserMarker>,
    },
    /// Understand the permissions from the error-response of the API request
    Request,
}

impl PermissionsSource<'_> {
    fn get(self, channel_id: Id<ChannelMarker>) -> Result<Permissions, Error> {
        Ok(match self {
            PermissionsSource::Given(permissions) => permissions,
            PermissionsSource::Cached {
                cache,
                current_user_id,
            } => cache
                .permissions()
                .in_channel(current_user_id, channel_id)?,
            PermissionsSource::Request => Permissions::all(),
        })
    }
}

/// Cache to hold executable webhooks, keyed by webhook ID
///
/// Several channels of a guild may share one webhook, and a stored webhook ID
/// may point to a webhook that was deleted in the meantime, so lookups go by
/// ID and the guild's webhooks can be refreshed in bulk with
/// [`WebhooksCache::refresh_guild`]
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct WebhooksCache(DashMap<Id<WebhookMarker>, Webhook>);

impl Default for WebhooksCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhooksCache {
    /// Creates a new webhook cache
    ///
    /// # Invalidation warning
    /// Refer to the docs for [`WebhooksCache::update`] to avoid invalidation
    #[must_use]
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    /// Returns the webhook with the given ID, if it is cached
    #[must_use]
    pub fn get(&self, webhook_id: Id<WebhookMarker>) -> Option<Ref<'_, Id<WebhookMarker>, Webhook>> {
        self.0.get(&webhook_id)
    }

    /// Replaces the cached webhooks of a guild with the ones returned by the
    /// API, keeping only those which can be executed (the ones with a token)
    ///
    /// # Required permissions
    /// Make sure the bot has `MANAGE_WEBHOOKS` permission in the given guild
    ///
    /// # Errors
    /// Returns [`Error::Http`] or [`Error::Deserialize`], in which case the
    /// cache is left untouched
    pub async fn refresh_guild(&self, http: &Client, guild_id: Id<GuildMarker>) -> Result<(), Error> {
        let webhooks = http.guild_webhooks(guild_id).await?.models().await?;

        self.0.retain(|_, webhook| webhook.guild_id != Some(guild_id));
        for webhook in webhooks.into_iter().filter(|w| w.token.is_some()) {
            self.0.insert(webhook.id, webhook);
        }

        Ok(())
    }

    /// Creates the passed webhook, caches it and returns it. It takes a
    /// `CreateWebhook` instead of a `Webhook` to reduce boilerplate
    ///
    /// # Errors
    /// Returns [`Error::Http`] or [`Error::Deserialize`]
    pub async fn create(&self, create_webhook: CreateWebhook<'_>) -> Result<Webhook, Error> {
        let webhook = create_webhook.await?.model().await?;
        self.0.insert(webhook.id, webhook.clone());

        Ok(webhook)
    }

    /// Renames the webhook unless its cached name already matches
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the name isn't a valid webhook name,
    /// or [`Error::Http`] if the request failed
    pub async fn rename(
        &self,
        http: &Client,
        webhook_id: Id<WebhookMarker>,
        name: &str,
    ) -> Result<(), Error> {
        if self
            .get(webhook_id)
            .is_some_and(|webhook| webhook.name.as_deref() == Some(name))
        {
            return Ok(());
        }

        http.update_webhook(webhook_id).name(name)?.await?;

        if let Some(mut webhook) = self.0.get_mut(&webhook_id) {
            webhook.name = Some(name.to_string());
        }

        Ok(())
    }

    /// Deletes the webhook and removes it from the cache
    ///
    /// # Errors
    /// Returns [`Error::Http`], the webhook is removed from the cache anyway
    pub async fn delete(&self, http: &Client, webhook_id: Id<WebhookMarker>) -> Result<(), Error> {
        self.0.remove(&webhook_id);
        http.delete_webhook(webhook_id).await?;

        Ok(())
    }

    /// Removes the cached webhooks for the given event's channel or guild
    ///
    /// Unless the event is `WebhookUpdate`, this function isn't actually
    /// `async`, `http` and `permissions` aren't used, and it isn't fallible
    ///
    /// # Invalidation warning
    /// You should run this on `ChannelDelete`, `GuildDelete` and
    /// `WebhookUpdate` events to make sure deleted webhooks are removed
    /// from the cache, or else executing a cached webhook will return
    /// `Unknown Webhook` errors
    ///
    /// # Errors
    /// Returns [`Error::Http`], [`Error::Deserialize`], or when
    /// [`PermissionsSource::Cached`] is passed, [`Error::CachePermissions`]
    #[allow(clippy::wildcard_enum_match_arm)]
    pub async fn update(
        &self,
        event: &Event,
        http: &Client,
        permissions: PermissionsSource<'_>,
    ) -> Result<(), Error> {
        match event {
            Event::ChannelDelete(channel) => {
                self.0.retain(|_, webhook| webhook.channel_id != channel.id);
            }
            Event::GuildDelete(guild) => self
                .0
                .retain(|_, webhook| webhook.guild_id != Some(guild.id)),
            Event::WebhooksUpdate(update) => {
                if !self
                    .0
                    .iter()
                    .any(|webhook| webhook.channel_id == update.channel_id)
                {
                    return Ok(());
                }

                if !permissions
                    .get(update.channel_id)?
                    .contains(Permissions::MANAGE_WEBHOOKS)
                {
                    self.0
                        .retain(|_, webhook| webhook.channel_id != update.channel_id);
                    return Ok(());
                }

                let fresh = match http.channel_webhooks(update.channel_id).await {
                    Ok(response) => response.models().await?,
                    Err(_) => Vec::new(),
                };

                self.0
                    .retain(|_, webhook| webhook.channel_id != update.channel_id);
                for webhook in fresh.into_iter().filter(|w| w.token.is_some()) {
                    self.0.insert(webhook.id, webhook);
                }
            }
            _ => (),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use twilight_http::Client;
    use twilight_model::{
        channel::{Channel, ChannelType, Webhook, WebhookType},
        gateway::{
            event::Event,
            payload::incoming::{ChannelDelete, GuildDelete, WebhooksUpdate},
        },
        id::Id,
    };

    use super::{PermissionsSource, WebhooksCache};

    fn webhook(id: u64, channel_id: u64) -> Webhook {
        Webhook {
            id: Id::new(id),
            channel_id: Id::new(channel_id),
            kind: WebhookType::Incoming,
            application_id: None,
            avatar: None,
            guild_id: Some(Id::new(10)),
            name: Some("Steve".to_string()),
            source_channel: None,
            source_guild: None,
            token: Some("token".to_string()),
            url: None,
            user: None,
        }
    }

    fn text_channel(id: u64) -> Channel {
        Channel {
            id: Id::new(id),
            guild_id: Some(Id::new(10)),
            kind: ChannelType::GuildText,
            application_id: None,
            applied_tags: None,
            available_tags: None,
            bitrate: None,
            default_auto_archive_duration: None,
            default_reaction_emoji: None,
            default_thread_rate_limit_per_user: None,
            icon: None,
            invitable: None,
            last_message_id: None,
            last_pin_timestamp: None,
            member: None,
            member_count: None,
            message_count: None,
            name: None,
            newly_created: None,
            nsfw: None,
            owner_id: None,
            parent_id: None,
            permission_overwrites: None,
            position: None,
            rate_limit_per_user: None,
            recipients: None,
            rtc_region: None,
            thread_metadata: None,
            topic: None,
            user_limit: None,
            video_quality_mode: None,
            flags: None,
            default_forum_layout: None,
            default_sort_order: None,
            managed: None,
        }
    }

    #[allow(clippy::unwrap_used)]
    async fn mock_update(cache: &WebhooksCache, event: &Event) {
        cache
            .update(
                event,
                &Client::builder().build(),
                PermissionsSource::Request,
            )
            .await
            .unwrap();
    }

    #[test]
    fn get_by_webhook_id() {
        let cache = WebhooksCache::new();
        cache.0.insert(Id::new(1), webhook(1, 5));

        assert!(cache.get(Id::new(5)).is_none());
        assert_eq!(cache.get(Id::new(1)).as_deref(), Some(&webhook(1, 5)));
    }

    #[tokio::test]
    async fn rename_is_skipped_when_name_matches() {
        let cache = WebhooksCache::new();
        cache.0.insert(Id::new(1), webhook(1, 5));

        // No request is made, so an unauthenticated client is fine
        cache
            .rename(&Client::builder().build(), Id::new(1), "Steve")
            .await
            .unwrap();

        assert_eq!(
            cache.get(Id::new(1)).and_then(|w| w.name.clone()).as_deref(),
            Some("Steve")
        );
    }

    #[tokio::test]
    async fn guild_delete_drops_the_guilds_webhooks() {
        let cache = WebhooksCache::new();

        cache.0.insert(Id::new(1), webhook(1, 5));
        mock_update(
            &cache,
            &Event::GuildDelete(GuildDelete {
                id: Id::new(11),
                unavailable: false,
            }),
        )
        .await;
        assert!(cache.get(Id::new(1)).is_some());

        cache.0.insert(Id::new(2), webhook(2, 6));
        mock_update(
            &cache,
            &Event::GuildDelete(GuildDelete {
                id: Id::new(10),
                unavailable: false,
            }),
        )
        .await;
        assert!(cache.get(Id::new(1)).is_none());
        assert!(cache.get(Id::new(2)).is_none());
    }

    #[tokio::test]
    async fn channel_delete_drops_the_channels_webhooks() {
        let cache = WebhooksCache::new();

        cache.0.insert(Id::new(3), webhook(3, 3));
        cache.0.insert(Id::new(4), webhook(4, 4));
        mock_update(
            &cache,
            &Event::ChannelDelete(Box::new(ChannelDelete(text_channel(3)))),
        )
        .await;

        assert!(cache.get(Id::new(3)).is_none());
        assert!(cache.get(Id::new(4)).is_some());
    }

    #[tokio::test]
    async fn webhooks_update_in_unrelated_channel_is_ignored() {
        let cache = WebhooksCache::new();

        cache.0.insert(Id::new(4), webhook(4, 4));
        mock_update(
            &cache,
            &Event::WebhooksUpdate(WebhooksUpdate {
                channel_id: Id::new(12),
                guild_id: Id::new(10),
            }),
        )
        .await;

        assert_eq!(cache.get(Id::new(4)).as_deref(), Some(&webhook(4, 4)));
    }
}
