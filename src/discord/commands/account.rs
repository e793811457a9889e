use super::{lookup_profile, CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::{sanitizer::ValidIGN, storage::UserConnection};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};

#[derive(CommandModel, CreateCommand)]
#[command(name = "account", desc = "Connect your Discord account to your Minecraft account")]
pub enum AccountCommand {
    #[command(name = "connect")]
    Connect(ConnectAccount),
    #[command(name = "disconnect")]
    Disconnect(DisconnectAccount),
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "connect", desc = "Connect your Minecraft account")]
pub struct ConnectAccount {
    /// Your Minecraft username
    #[command(min_length = 1, max_length = 17)]
    username: String,
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "disconnect", desc = "Disconnect your Minecraft account")]
pub struct DisconnectAccount;

#[async_trait]
impl RunCommand for AccountCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        match self {
            AccountCommand::Connect(command) => command.run(ctx).await,
            AccountCommand::Disconnect(_) => disconnect(ctx).await,
        }
    }
}

impl ConnectAccount {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let ign = ValidIGN::try_from(self.username.as_str()).map_err(|err| {
            CommandResponse::Failure(format!(
                ":warning: `{}` is not a valid Minecraft username, {err}",
                self.username
            ))
        })?;

        let profile = lookup_profile(ctx.discord.protocols.client(), &ign).await?;

        let user = ctx
            .discord
            .storage
            .users
            .connect(UserConnection {
                id: ctx.user.id,
                uuid: profile.uuid,
                username: profile.name,
            })
            .await?;

        update_linked_role(ctx, Some(&user.username)).await;

        Ok(CommandResponse::Success(format!(
            ":white_check_mark: Connected your account to **{}**.",
            user.username
        )))
    }
}

async fn disconnect(ctx: &CommandContext<'_>) -> CommandResult {
    let storage = &ctx.discord.storage;

    if storage.users.disconnect(ctx.user.id).await?.is_none() {
        return Err(CommandResponse::Failure(
            ":warning: You haven't connected a Minecraft account.".to_string(),
        ));
    }

    update_linked_role(ctx, None).await;

    Ok(CommandResponse::Success(
        ":white_check_mark: Disconnected your Minecraft account.".to_string(),
    ))
}

/// Users who authorised the linked role get it updated right away
async fn update_linked_role(ctx: &CommandContext<'_>, username: Option<&str>) {
    let discord = ctx.discord;

    if let Err(err) = discord
        .oauth
        .update_role_connection(&discord.storage.user_settings, ctx.user.id, username)
        .await
    {
        tracing::warn!("Could not update the linked role of {}: {err}", ctx.user.id);
    }
}
