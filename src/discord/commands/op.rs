use super::{command::respond, CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::payloads::PluginResponse;
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::guild::Permissions;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "op",
    desc = "Make a player an operator on the server",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct OpCommand {
    /// A Minecraft username or a mention of a user with a connected account
    #[command(min_length = 1, max_length = 32)]
    player: String,
}

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "deop",
    desc = "Take operator status away from a player",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct DeopCommand {
    /// A Minecraft username or a mention of a user with a connected account
    #[command(min_length = 1, max_length = 32)]
    player: String,
}

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

/// Whether a player gains or loses operator status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Op,
    Deop,
}

impl Operator {
    fn command(self, player: &str) -> String {
        match self {
            Operator::Op => format!("op {player}"),
            Operator::Deop => format!("deop {player}"),
        }
    }

    fn response(self, response: &PluginResponse, player: &str) -> CommandResponse {
        let done = match self {
            Operator::Op => "Opped",
            Operator::Deop => "Deopped",
        };

        respond(response, format!(":white_check_mark: {done} **{player}**."))
    }

    async fn run(self, ctx: &CommandContext<'_>, player: &str) -> CommandResult {
        let (_, protocol) = ctx.server()?;
        let player = ctx.player(player).await?;

        let response = protocol.execute_command(&self.command(&player.name)).await?;

        Ok(self.response(&response, &player.name))
    }
}

#[async_trait]
impl RunCommand for OpCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        Operator::Op.run(ctx, &self.player).await
    }
}

#[async_trait]
impl RunCommand for DeopCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        Operator::Deop.run(ctx, &self.player).await
    }
}
