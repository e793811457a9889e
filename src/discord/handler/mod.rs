mod discord;
mod minecraft;

pub use discord::DiscordHandler as Discord;
pub use minecraft::MinecraftHandler as Minecraft;

use super::reactions;
use lazy_regex::regex_replace_all;
use std::sync::Arc;
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::{request::channel::reaction::RequestReactionType, Client as HttpClient};
use twilight_model::channel::{message::Mention, Message};

trait MessageExt {
    /// Returns the display name of the author of the message
    fn get_author_display_name(&self) -> &str;
    /// Returns the display name of the mention
    fn get_mention_display_name(mention: &Mention) -> &str;
    /// Returns the content of the message with user, role and channel mentions replaced
    /// with their names
    fn content_clean(&self, cache: &InMemoryCache) -> String;
    /// Reacts to the message with the given reaction
    fn react(&self, http: Arc<HttpClient>, reaction: &'static reactions::Reaction);
}

impl MessageExt for Message {
    fn get_author_display_name(&self) -> &str {
        if let Some(nick) = self.member.as_ref().and_then(|member| member.nick.as_ref()) {
            return nick;
        }

        self.author
            .global_name
            .as_deref()
            .unwrap_or(&self.author.name)
    }

    fn get_mention_display_name(mention: &Mention) -> &str {
        if let Some(nick) = mention.member.as_ref().and_then(|member| member.nick.as_ref()) {
            return nick;
        }

        &mention.name
    }

    fn content_clean(&self, cache: &InMemoryCache) -> String {
        let mut result = self.content.clone();

        for mention in &self.mentions {
            let name = format!("@{}", Self::get_mention_display_name(mention));

            result = result
                .replace(&format!("<@{}>", mention.id), &name)
                .replace(&format!("<@!{}>", mention.id), &name);
        }

        for id in &self.mention_roles {
            let name = match cache.role(*id) {
                Some(role) => format!("@{}", role.name),
                None => "@deleted-role".to_string(),
            };

            result = result.replace(&format!("<@&{id}>"), &name);
        }

        regex_replace_all!(r"<#(\d+)>", &result, |_, id: &str| {
            id.parse()
                .ok()
                .and_then(|id| cache.channel(id))
                .and_then(|channel| channel.name.clone())
                .map_or_else(|| "#deleted-channel".to_string(), |name| format!("#{name}"))
        })
        .to_string()
    }

    fn react(&self, http: Arc<HttpClient>, reaction: &'static reactions::Reaction) {
        let channel_id = self.channel_id;
        let id = self.id;

        tokio::spawn(async move {
            if let Err(err) = http
                .create_reaction(
                    channel_id,
                    id,
                    &RequestReactionType::Unicode {
                        name: reaction.emoji(),
                    },
                )
                .await
            {
                tracing::warn!("Failed to react to message: {err}");
            }
        });
    }
}
