use super::{CommandContext, CommandResponse, CommandResult, RunCommand};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::guild::Permissions;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "disconnect",
    desc = "Disconnect the bot from your Minecraft server",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct DisconnectCommand;

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

#[async_trait]
impl RunCommand for DisconnectCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let (server, protocol) = ctx.server()?;

        // The plugin may be offline, the bot forgets the server either way
        if let Err(err) = protocol.disconnect().await {
            tracing::debug!("Plugin of {} did not acknowledge the disconnect: {err}", ctx.guild_id);
        }

        let sockets = &ctx.discord.protocols.sockets;
        if let Some(socket) = sockets.get(ctx.guild_id) {
            sockets.unregister(ctx.guild_id, &socket);
        }

        ctx.discord.storage.disconnect_server(ctx.guild_id).await?;
        tracing::info!("Disconnected {} from {}:{}", ctx.guild_id, server.ip, server.port);

        Ok(CommandResponse::Success(format!(
            ":white_check_mark: Disconnected from the server `{}:{}`.",
            server.ip, server.port
        )))
    }
}
