use super::{CommandContext, CommandResponse, CommandResult, Player, RunCommand};
use crate::{
    discord::colours,
    minecraft::{self, stats},
    storage::DisableKind,
};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CommandOption, CreateCommand, CreateOption};
use twilight_util::builder::embed::{EmbedAuthorBuilder, EmbedBuilder, ImageSource};

#[derive(CommandModel, CreateCommand)]
#[command(name = "stats", desc = "Look up a statistic of a player", dm_permission = false)]
pub struct StatsCommand {
    /// A Minecraft username or a mention of a user with a connected account
    #[command(min_length = 1, max_length = 32)]
    player: String,
    /// The category of the statistic
    category: StatCategory,
    /// The statistic, like stone, zombie or play_time
    #[command(min_length = 1, max_length = 64)]
    stat: String,
}

#[derive(CommandOption, CreateOption, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCategory {
    #[option(name = "Blocks mined", value = "mined")]
    Mined,
    #[option(name = "Items broken", value = "broken")]
    Broken,
    #[option(name = "Items crafted", value = "crafted")]
    Crafted,
    #[option(name = "Items used", value = "used")]
    Used,
    #[option(name = "Items picked up", value = "picked_up")]
    PickedUp,
    #[option(name = "Items dropped", value = "dropped")]
    Dropped,
    #[option(name = "Mobs killed", value = "killed")]
    Killed,
    #[option(name = "Killed by", value = "killed_by")]
    KilledBy,
    #[option(name = "Custom", value = "custom")]
    Custom,
}

impl StatCategory {
    pub fn name(self) -> &'static str {
        match self {
            StatCategory::Mined => "mined",
            StatCategory::Broken => "broken",
            StatCategory::Crafted => "crafted",
            StatCategory::Used => "used",
            StatCategory::PickedUp => "picked_up",
            StatCategory::Dropped => "dropped",
            StatCategory::Killed => "killed",
            StatCategory::KilledBy => "killed_by",
            StatCategory::Custom => "custom",
        }
    }

    /// The category's key in stats files from before 1.13
    pub fn legacy_name(self) -> &'static str {
        match self {
            StatCategory::Mined => "mineBlock",
            StatCategory::Broken => "breakItem",
            StatCategory::Crafted => "craftItem",
            StatCategory::Used => "useItem",
            StatCategory::PickedUp => "pickup",
            StatCategory::Dropped => "drop",
            StatCategory::Killed => "killEntity",
            StatCategory::KilledBy => "entityKilledBy",
            StatCategory::Custom => "custom",
        }
    }
}

#[async_trait]
impl RunCommand for StatsCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let stat = normalise_stat(&self.stat);
        let category = self.category;

        let settings = ctx.discord.storage.server_settings.get_or_default(ctx.guild_id);
        for name in [category.name(), stat.as_str()] {
            if settings.is_disabled(DisableKind::Stats, name) {
                return Err(CommandResponse::Failure(format!(
                    ":no_entry: Stat [**{name}**] disabled!"
                )));
            }
        }

        let (server, protocol) = ctx.server()?;
        let player = ctx.player(&self.player).await?;

        let file = protocol
            .get_file(&format!("{}/stats/{}.json", server.path, player.uuid))
            .await?;
        let file = serde_json::from_slice::<serde_json::Value>(&file).map_err(|err| {
            tracing::debug!("Invalid stats file of {}: {err}", player.uuid);
            CommandResponse::Failure(":warning: The player's stats file is invalid.".to_string())
        })?;

        let category_key = match server.version >= 13 {
            true => category.name(),
            false => category.legacy_name(),
        };

        let Some(value) = stats::find_stat(&file, server.version, category_key, &stat) else {
            return Err(CommandResponse::Failure(
                ":warning: No Match found! Stat is either 0 or misspelled!".to_string(),
            ));
        };

        Ok(CommandResponse::Embed(Box::new(embed(
            &player,
            &stats::describe(category.name(), &stat, value),
        ))))
    }
}

/// `Play Time` -> `play_time`
fn normalise_stat(stat: &str) -> String {
    let stat = stat.trim().to_lowercase();
    let stat = stat.strip_prefix("minecraft:").unwrap_or(&stat);

    stat.split_whitespace().collect::<Vec<_>>().join("_")
}

fn embed(player: &Player, description: &str) -> twilight_model::channel::message::Embed {
    let mut author = EmbedAuthorBuilder::new(player.name.clone());
    if let Ok(icon) = ImageSource::url(minecraft::avatar_url(&player.name)) {
        author = author.icon_url(icon);
    }

    EmbedBuilder::new()
        .author(author)
        .description(format!("**{}** {description}", player.name))
        .color(colours::GREEN)
        .build()
}
