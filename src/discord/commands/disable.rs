use super::{CommandContext, CommandResponse, CommandResult, RunCommand, ALWAYS_ENABLED};
use crate::{discord::buttons::Toggle, storage::DisableKind};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::guild::Permissions;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "disable",
    desc = "Disable a command, chat command, stat or advancement",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct DisableCommand {
    /// What to disable
    kind: DisableKind,
    /// The name of the command, stat or advancement
    #[command(min_length = 1, max_length = 100)]
    name: String,
}

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "enable",
    desc = "Enable a disabled command, chat command, stat or advancement",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct EnableCommand {
    /// What to enable
    kind: DisableKind,
    /// The name of the command, stat or advancement
    #[command(min_length = 1, max_length = 100)]
    name: String,
}

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

#[async_trait]
impl RunCommand for DisableCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        toggle(ctx, false, self.kind, &self.name).await
    }
}

#[async_trait]
impl RunCommand for EnableCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        toggle(ctx, true, self.kind, &self.name).await
    }
}

async fn toggle(ctx: &CommandContext<'_>, enable: bool, kind: DisableKind, name: &str) -> CommandResult {
    let name = normalise(name);
    check(kind, &name)?;

    Ok(Toggle::new(enable, kind, name)
        .apply(ctx.discord, ctx.guild_id)
        .await?)
}

fn normalise(name: &str) -> String {
    let name = name.trim().to_lowercase();
    let name = name.trim_start_matches('/');

    name.strip_prefix("minecraft:").unwrap_or(name).to_string()
}

fn check(kind: DisableKind, name: &str) -> Result<(), CommandResponse> {
    if name.is_empty() {
        return Err(CommandResponse::Failure(":warning: Name a thing to toggle.".to_string()));
    }

    if kind == DisableKind::Commands {
        if !super::exists(name) {
            return Err(CommandResponse::Failure(format!(
                ":warning: There is no command called `/{name}`"
            )));
        }

        if ALWAYS_ENABLED.contains(&name) {
            return Err(CommandResponse::Failure(format!(
                ":warning: `/{name}` can't be disabled"
            )));
        }
    }

    Ok(())
}
