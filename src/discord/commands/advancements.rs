use super::{CommandContext, CommandResponse, CommandResult, Player, RunCommand};
use crate::{
    discord::colours,
    minecraft::{
        self,
        advancements::{self, Advancement, Progress},
    },
    storage::DisableKind,
};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::channel::message::{embed::EmbedField, Embed};
use twilight_util::builder::embed::{EmbedAuthorBuilder, EmbedBuilder, ImageSource};

/// Advancements files were added in 1.12
const FIRST_VERSION: u8 = 12;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "advancements",
    desc = "Look up a player's progress on an advancement",
    dm_permission = false
)]
pub struct AdvancementsCommand {
    /// A Minecraft username or a mention of a user with a connected account
    #[command(min_length = 1, max_length = 32)]
    player: String,
    /// The advancement
    #[command(min_length = 1, max_length = 100, autocomplete = true)]
    advancement: String,
}

#[async_trait]
impl RunCommand for AdvancementsCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let Some(advancement) = resolve(&self.advancement) else {
            return Err(CommandResponse::Failure(format!(
                ":warning: Advancement [**{}**] not found",
                self.advancement
            )));
        };

        let settings = ctx.discord.storage.server_settings.get_or_default(ctx.guild_id);
        for name in [advancement.category.to_string(), advancement.id.to_string()] {
            if settings.is_disabled(DisableKind::Advancements, &name) {
                return Err(CommandResponse::Failure(format!(
                    ":no_entry: Advancement [**{name}**] disabled!"
                )));
            }
        }

        let (server, protocol) = ctx.server()?;
        if server.version < FIRST_VERSION {
            return Err(CommandResponse::Failure(
                ":warning: Advancements are only available on Minecraft 1.12 and later.".to_string(),
            ));
        }

        let player = ctx.player(&self.player).await?;

        let file = protocol
            .get_file(&format!("{}/advancements/{}.json", server.path, player.uuid))
            .await?;
        let file = serde_json::from_slice::<serde_json::Value>(&file).map_err(|err| {
            tracing::debug!("Invalid advancements file of {}: {err}", player.uuid);
            CommandResponse::Failure(
                ":warning: The player's advancements file is invalid.".to_string(),
            )
        })?;

        let progress = advancements::progress(&file, advancement);

        Ok(CommandResponse::Embed(Box::new(embed(
            &player,
            advancement,
            progress.as_ref(),
        ))))
    }
}

/// The advancement of an autocompleted `category/id` value, or the best match for
/// anything typed by hand
fn resolve(input: &str) -> Option<&'static Advancement> {
    let input = input.trim();
    let key = input.strip_prefix("minecraft:").unwrap_or(input);

    if let Some((category, id)) = key.split_once('/') {
        if let Some(advancement) = advancements::find(category, id) {
            return Some(advancement);
        }
    }

    advancements::search(input).into_iter().next()
}

fn embed(player: &Player, advancement: &Advancement, progress: Option<&Progress>) -> Embed {
    let mut author = EmbedAuthorBuilder::new(player.name.clone());
    if let Ok(icon) = ImageSource::url(minecraft::avatar_url(&player.name)) {
        author = author.icon_url(icon);
    }

    let (status, colour) = match progress {
        Some(progress) if progress.done => ("has completed", colours::GREEN),
        Some(_) => ("is working on", colours::YELLOW),
        None => ("has not started", colours::RED),
    };

    let mut embed = EmbedBuilder::new()
        .author(author)
        .title(advancement.name)
        .description(format!(
            "**{}** {status} [**{}**]\n*{}*",
            player.name, advancement.name, advancement.description
        ))
        .color(colour);

    if let Some(progress) = progress.filter(|progress| !progress.criteria.is_empty()) {
        embed = embed.field(EmbedField {
            name: "Criteria".to_string(),
            value: progress
                .criteria
                .iter()
                .take(20)
                .map(|(criterion, date)| format!("`{criterion}` {date}"))
                .collect::<Vec<_>>()
                .join("\n"),
            inline: false,
        });
    }

    embed.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("story/mine_stone", Some("Stone Age") ; "Key")]
    #[test_case("minecraft:story/mine_stone", Some("Stone Age") ; "Namespaced key")]
    #[test_case("Stone Age", Some("Stone Age") ; "Name")]
    #[test_case("zzzzqqqq", None ; "Nothing")]
    fn resolves_advancements(input: &str, name: Option<&str>) {
        assert_eq!(resolve(input).map(|advancement| advancement.name), name);
    }

    #[test]
    fn completed_embed() {
        let player = Player {
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_string(),
            name: "Notch".to_string(),
        };
        let advancement = resolve("story/mine_stone").unwrap();
        let progress = Progress {
            done: true,
            criteria: vec![(
                "stone".to_string(),
                "2022-06-01 12:00:00 +0200".to_string(),
            )],
        };

        let embed = embed(&player, advancement, Some(&progress));

        assert_eq!(embed.color, Some(colours::GREEN));
        assert!(embed.description.unwrap().contains("has completed"));
        assert_eq!(embed.fields.len(), 1);
    }

    #[test]
    fn not_started_embed() {
        let player = Player {
            uuid: String::new(),
            name: "Notch".to_string(),
        };
        let embed = embed(&player, resolve("story/mine_stone").unwrap(), None);

        assert_eq!(embed.color, Some(colours::RED));
        assert!(embed.fields.is_empty());
    }
}
