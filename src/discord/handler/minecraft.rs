use crate::{
    discord::{basic_embed, colours, Discord},
    minecraft::{self, advancements},
    payloads::{ChatChannel, ChatPayload, ChatType, Relay},
    storage::{DisableKind, ServerConnection},
    Result,
};
use async_broadcast::{Receiver, RecvError};
use lazy_regex::{regex, regex_replace_all};
use std::{
    collections::HashMap,
    ops::{ControlFlow, Deref},
    sync::Arc,
};
use twilight_model::{
    channel::message::{AllowedMentions, Embed, MentionType},
    id::{
        marker::{GuildMarker, UserMarker},
        Id,
    },
    util::Timestamp,
};
use twilight_util::builder::embed::{EmbedAuthorBuilder, EmbedBuilder, ImageSource};
use twilight_webhook::util::ExecuteWebhookExt;

pub struct MinecraftHandler(Arc<Discord>);

impl Deref for MinecraftHandler {
    type Target = Discord;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MinecraftHandler {
    pub fn new(discord: Arc<Discord>) -> Self {
        Self(discord)
    }

    /// Relays plugin events until every sender is gone. Events are handled one at a time
    /// so chat keeps its order.
    pub async fn run(self: Arc<Self>, mut relay: Receiver<Relay>) {
        loop {
            match relay.recv().await {
                Ok(Relay { server, payload }) => self.handle_payload(server, payload).await,
                Err(RecvError::Overflowed(skipped)) => {
                    tracing::warn!("Relay fell behind, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::debug!("Relay channel closed");
    }

    pub async fn handle_payload(&self, server: ServerConnection, payload: ChatPayload) {
        tracing::debug!("{payload:?}");

        let targets = server.target_channels(&payload.channels);
        if targets.is_empty() {
            return;
        }

        if payload.kind.is_command()
            && self.storage.server_settings.is_disabled(
                server.id,
                DisableKind::ChatCommands,
                payload.command_name(),
            )
        {
            return;
        }

        if payload.kind == ChatType::Chat {
            if let Err(err) = self.relay_chat(&server, &payload, &targets).await {
                tracing::warn!("Failed to relay chat of {}: {err}", server.id);
            }
            return;
        }

        let Some(embed) = event_embed(&payload, now()) else {
            return;
        };

        for channel in &targets {
            self.send_embed(channel.id, embed.clone()).await;
        }
    }

    async fn relay_chat(
        &self,
        server: &ServerConnection,
        payload: &ChatPayload,
        targets: &[ChatChannel],
    ) -> Result<()> {
        let content = self.resolve_mentions(server.id, &payload.message).await;

        let uncached = targets
            .iter()
            .filter_map(|channel| channel.webhook)
            .any(|webhook| self.webhook_cache.get(webhook).is_none());

        if uncached {
            if let Err(err) = self.webhook_cache.refresh_guild(&self.http, server.id).await {
                tracing::debug!("Could not fetch webhooks of {}: {err}", server.id);

                let embed = basic_embed(
                    ":warning: I need the **Manage Webhooks** permission to relay chat through webhooks.",
                    colours::RED,
                );
                for channel in targets {
                    self.send_embed(channel.id, embed.clone()).await;
                }

                return Ok(());
            }
        }

        for target in targets {
            match self.deliver_chat(server, payload, target, &content).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(err) => {
                    tracing::warn!("Failed to relay chat of {} to {}: {err}", server.id, target.id);
                }
            }
        }

        Ok(())
    }

    /// Sends chat to one channel, through its webhook if it has one. Breaks if the
    /// webhook could not be replaced.
    async fn deliver_chat(
        &self,
        server: &ServerConnection,
        payload: &ChatPayload,
        target: &ChatChannel,
        content: &str,
    ) -> Result<ControlFlow<()>> {
        let Some(webhook) = target.webhook else {
            self.send_embed(target.id, chat_embed(payload, content)).await;
            return Ok(ControlFlow::Continue(()));
        };

        let channel = self.channel(target.id).await?;

        let webhook = match self.webhook_cache.get(webhook).map(|webhook| webhook.id) {
            Some(id) => {
                if let Err(err) = self.webhook_cache.rename(&self.http, id, &payload.player).await {
                    tracing::debug!("Could not rename webhook {id}: {err}");
                }
                id
            }
            None => match self.replace_webhook(server, target, &channel, &payload.player).await {
                Some(id) => id,
                None => return Ok(ControlFlow::Break(())),
            },
        };

        let Some(token) = self
            .webhook_cache
            .get(webhook)
            .and_then(|webhook| webhook.token.clone())
        else {
            return Ok(ControlFlow::Continue(()));
        };

        self.http
            .execute_webhook(webhook, &token)
            .username(&payload.player)?
            .avatar_url(&minecraft::avatar_url(&payload.player))
            .content(content)?
            .allowed_mentions(Some(&AllowedMentions {
                parse: vec![MentionType::Users],
                ..Default::default()
            }))
            .in_channel(&channel)
            .await?;

        Ok(ControlFlow::Continue(()))
    }

    /// The channel's webhook was deleted, so a new one is created and the plugin is told
    /// about it. `None` if that failed.
    async fn replace_webhook(
        &self,
        server: &ServerConnection,
        target: &ChatChannel,
        channel: &twilight_model::channel::Channel,
        name: &str,
    ) -> Option<Id<twilight_model::id::marker::WebhookMarker>> {
        let webhook = match self.create_webhook(channel, name).await {
            Ok(webhook) => webhook,
            Err(err) => {
                tracing::warn!("Could not create webhook in {}: {err}", target.id);
                return None;
            }
        };

        let registered = ChatChannel {
            webhook: Some(webhook.id),
            ..target.clone()
        };

        let protocol = self.protocols.for_server(server);
        let channels = match protocol.add_chat_channel(&registered).await {
            Ok(channels) => channels,
            Err(err) => {
                tracing::warn!("Could not register webhook with the server of {}: {err}", server.id);

                self.send_embed(
                    target.id,
                    basic_embed(
                        format!(":warning: Could not add the new webhook to the server: {}", err.user_message()),
                        colours::RED,
                    ),
                )
                .await;

                if let Err(err) = self.webhook_cache.delete(&self.http, webhook.id).await {
                    tracing::warn!("Could not delete webhook {}: {err}", webhook.id);
                }

                return None;
            }
        };

        if let Err(err) = self
            .storage
            .servers
            .edit(server.id, |server| server.channels = channels)
            .await
        {
            tracing::error!("Could not store the channels of {}: {err}", server.id);
        }

        Some(webhook.id)
    }

    /// Replaces `@name` with a mention of the first member whose name matches
    async fn resolve_mentions(&self, guild_id: Id<GuildMarker>, message: &str) -> String {
        let mut members = HashMap::new();
        for name in mention_names(message) {
            if let Some(id) = self.search_member(guild_id, name).await {
                members.insert(name.to_lowercase(), id);
            }
        }

        replace_mentions(message, &members)
    }

    async fn search_member(&self, guild_id: Id<GuildMarker>, name: &str) -> Option<Id<UserMarker>> {
        let request = self.http.search_guild_members(guild_id, name).limit(1).ok()?;

        match request.await {
            Ok(response) => response
                .models()
                .await
                .ok()?
                .into_iter()
                .next()
                .map(|member| member.user.id),
            Err(err) => {
                tracing::debug!("Member search for {name} failed: {err}");
                None
            }
        }
    }
}

/// Every distinct `@name` in `message`, without the `@`
fn mention_names(message: &str) -> Vec<&str> {
    let mut names: Vec<&str> = regex!(r"@(\S+)")
        .captures_iter(message)
        .filter_map(|captures| captures.get(1).map(|name| name.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();

    names
}

fn replace_mentions(message: &str, members: &HashMap<String, Id<UserMarker>>) -> String {
    if members.is_empty() {
        return message.to_string();
    }

    regex_replace_all!(r"@(\S+)", message, |whole: &str, name: &str| {
        members
            .get(&name.to_lowercase())
            .map_or_else(|| whole.to_string(), |id| format!("<@{id}>"))
    })
    .to_string()
}

fn now() -> Option<Timestamp> {
    Timestamp::from_micros(chrono::Utc::now().timestamp_micros()).ok()
}

fn player_author(name: &str, title: String) -> EmbedAuthorBuilder {
    let author = EmbedAuthorBuilder::new(title);

    match ImageSource::url(minecraft::avatar_url(name)) {
        Ok(icon) if !name.is_empty() => author.icon_url(icon),
        _ => author,
    }
}

/// Chat in channels without a webhook
fn chat_embed(payload: &ChatPayload, content: &str) -> Embed {
    EmbedBuilder::new()
        .author(player_author(&payload.player, payload.player.clone()))
        .description(content)
        .color(colours::GREEN)
        .build()
}

/// The embed for anything but chat, `None` for events that aren't shown
fn event_embed(payload: &ChatPayload, timestamp: Option<Timestamp>) -> Option<Embed> {
    let player = payload.player.as_str();

    let embed = match payload.kind {
        ChatType::Chat => return None,
        ChatType::Join => EmbedBuilder::new()
            .author(player_author(player, format!("{player} joined the game")))
            .color(colours::GREEN),
        ChatType::Quit => EmbedBuilder::new()
            .author(player_author(player, format!("{player} left the game")))
            .color(colours::RED),
        ChatType::Death => EmbedBuilder::new()
            .author(player_author(player, payload.message.clone()))
            .color(colours::RED),
        ChatType::Advancement => {
            let (category, id) = advancements::from_key(&payload.message)?;
            let (title, description) = match advancements::find(category, id) {
                Some(advancement) => (advancement.name.to_string(), advancement.description),
                None => (payload.message.clone(), "No description available."),
            };

            EmbedBuilder::new()
                .author(player_author(player, format!("{player} has made the advancement")))
                .title(title)
                .description(description)
                .color(colours::YELLOW)
        }
        ChatType::PlayerCommand | ChatType::ConsoleCommand | ChatType::BlockCommand => {
            let source = match payload.kind {
                ChatType::ConsoleCommand => "Console",
                ChatType::BlockCommand => "Command Block",
                _ => player,
            };

            EmbedBuilder::new()
                .author(player_author(player, format!("{source} executed")))
                .description(format!("`{}`", payload.message))
                .color(colours::YELLOW)
        }
        ChatType::Start => EmbedBuilder::new()
            .description(":green_circle: The server has opened!")
            .color(colours::GREEN),
        ChatType::Close => EmbedBuilder::new()
            .description(":red_circle: The server has shutdown!")
            .color(colours::RED),
    };

    Some(match timestamp {
        Some(timestamp) => embed.timestamp(timestamp).build(),
        None => embed.build(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn payload(kind: ChatType, player: &str, message: &str) -> ChatPayload {
        ChatPayload {
            id: Id::new(1),
            ip: None,
            kind,
            player: player.to_string(),
            message: message.to_string(),
            channels: Vec::new(),
        }
    }

    #[test_case(ChatType::Join, "Steve joined the game", colours::GREEN ; "Join")]
    #[test_case(ChatType::Quit, "Steve left the game", colours::RED ; "Quit")]
    #[test_case(ChatType::Death, "Steve fell from a high place", colours::RED ; "Death")]
    #[test_case(ChatType::PlayerCommand, "Steve executed", colours::YELLOW ; "Player command")]
    #[test_case(ChatType::ConsoleCommand, "Console executed", colours::YELLOW ; "Console command")]
    fn event_embeds(kind: ChatType, author: &str, colour: u32) {
        let embed = event_embed(&payload(kind, "Steve", "Steve fell from a high place"), None).unwrap();

        assert_eq!(embed.author.unwrap().name, author);
        assert_eq!(embed.color, Some(colour));
    }

    #[test]
    fn known_advancement() {
        let embed = event_embed(
            &payload(ChatType::Advancement, "Steve", "minecraft:story/mine_stone"),
            None,
        )
        .unwrap();

        assert_eq!(embed.title.as_deref(), Some("Stone Age"));
        assert_eq!(embed.description.as_deref(), Some("Mine Stone with your new Pickaxe"));
    }

    #[test]
    fn unknown_advancement() {
        let embed = event_embed(
            &payload(ChatType::Advancement, "Steve", "minecraft:custom/secret"),
            None,
        )
        .unwrap();

        assert_eq!(embed.title.as_deref(), Some("minecraft:custom/secret"));
        assert_eq!(embed.description.as_deref(), Some("No description available."));
    }

    #[test_case("minecraft:recipes/misc/bread" ; "Recipe")]
    #[test_case("garbage" ; "Not a key")]
    fn hidden_advancements(message: &str) {
        assert!(event_embed(&payload(ChatType::Advancement, "Steve", message), None).is_none());
    }

    #[test]
    fn chat_has_no_event_embed() {
        assert!(event_embed(&payload(ChatType::Chat, "Steve", "hi"), None).is_none());
    }

    #[test]
    fn embeds_are_timestamped() {
        let embed = event_embed(&payload(ChatType::Start, "", ""), now()).unwrap();

        assert!(embed.timestamp.is_some());
    }

    #[test]
    fn replaces_known_mentions() {
        let members = HashMap::from([
            ("alex".to_string(), Id::new(42)),
            ("mr.steve-1".to_string(), Id::new(43)),
        ]);

        assert_eq!(
            replace_mentions("hi @Alex and @Alexander and @bob, @Mr.Steve-1", &members),
            "hi <@42> and @Alexander and @bob, @Mr.Steve-1"
        );
        assert_eq!(
            replace_mentions("@Mr.Steve-1 look", &members),
            "<@43> look"
        );
    }

    #[test]
    fn mention_names_keep_punctuation() {
        assert_eq!(
            mention_names("@Mr.Steve-1 @bob @bob hi"),
            ["Mr.Steve-1", "bob"]
        );
        assert!(mention_names("no mentions here").is_empty());
    }

    mod relay_chat {
        use super::*;
        use crate::{
            api::testing,
            storage::{hash_token, ServerProtocol},
        };
        use axum::{
            extract::{Path, State},
            http::StatusCode,
            response::IntoResponse,
            routing::{get, post},
            Json, Router,
        };
        use parking_lot::Mutex;
        use serde_json::{json, Value};
        use std::net::SocketAddr;
        use twilight_http::Client as HttpClient;

        type Executed = Arc<Mutex<Vec<(u64, Value)>>>;

        fn webhook(id: u64, channel: u64) -> Value {
            json!({
                "id": id.to_string(),
                "type": 1,
                "channel_id": channel.to_string(),
                "guild_id": "5",
                "name": "Steve",
                "token": format!("token{id}"),
            })
        }

        async fn channel(Path(id): Path<u64>) -> impl IntoResponse {
            // Channel 1 was deleted
            if id == 1 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "message": "Unknown Channel", "code": 10003 })),
                )
                    .into_response();
            }

            Json(json!({ "id": id.to_string(), "type": 0, "guild_id": "5" })).into_response()
        }

        async fn execute(
            State(executed): State<Executed>,
            Path((id, _token)): Path<(u64, String)>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            executed.lock().push((id, body));
            StatusCode::NO_CONTENT
        }

        /// The Discord routes chat relaying hits, served over plain HTTP
        async fn fake_discord(executed: Executed) -> SocketAddr {
            let app = Router::new()
                .route(
                    "/api/v10/guilds/{guild}/webhooks",
                    get(|| async { Json(json!([webhook(10, 1), webhook(20, 2)])) }),
                )
                .route("/api/v10/channels/{id}", get(channel))
                .route("/api/v10/webhooks/{id}/{token}", post(execute))
                .with_state(executed);

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await });

            address
        }

        fn chat_channel(id: u64, webhook: u64) -> ChatChannel {
            ChatChannel {
                id: Id::new(id),
                types: vec![ChatType::Chat],
                webhook: Some(Id::new(webhook)),
            }
        }

        #[tokio::test]
        async fn failing_channel_does_not_stop_the_others() {
            let executed = Executed::default();
            let address = fake_discord(executed.clone()).await;

            let http = HttpClient::builder()
                .token("token".to_string())
                .proxy(address.to_string(), true)
                .ratelimiter(None)
                .build();
            let (state, _rx) = testing::state().await;
            let discord = Discord::new(
                Arc::new(http),
                Id::new(1),
                state.storage,
                state.protocols,
                state.oauth,
            );
            let handler = MinecraftHandler::new(Arc::new(discord));

            let channels = vec![chat_channel(1, 10), chat_channel(2, 20)];
            let server = ServerConnection {
                id: Id::new(5),
                ip: "127.0.0.1".to_string(),
                port: 11111,
                version: 20,
                path: "world".to_string(),
                protocol: ServerProtocol::Http {
                    token: "token".to_string(),
                    hash: hash_token("token"),
                },
                channels: channels.clone(),
            };
            let payload = ChatPayload {
                id: Id::new(5),
                channels,
                ..payload(ChatType::Chat, "Steve", "hello")
            };

            handler.handle_payload(server, payload).await;

            let executed = executed.lock();
            assert_eq!(executed.len(), 1);
            assert_eq!(executed[0].0, 20);
            assert_eq!(executed[0].1["content"], "hello");
            assert_eq!(executed[0].1["username"], "Steve");
        }
    }
}
