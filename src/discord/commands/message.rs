use super::{command::respond, CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::sanitizer::CleanString;
use async_trait::async_trait;
use serde_json::{json, Value};
use twilight_interactions::command::{CommandModel, CreateCommand};

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "message",
    desc = "Whisper a message to a player on the server",
    dm_permission = false
)]
pub struct MessageCommand {
    /// A Minecraft username or a mention of a user with a connected account
    #[command(min_length = 1, max_length = 32)]
    player: String,
    /// The message
    #[command(min_length = 1, max_length = 256)]
    message: String,
}

#[async_trait]
impl RunCommand for MessageCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let (_, protocol) = ctx.server()?;
        let player = ctx.player(&self.player).await?;

        let message = CleanString::from(self.message);
        if message.is_empty() {
            return Err(CommandResponse::Failure(
                ":warning: The message has no content after cleaning.".to_string(),
            ));
        }

        let component = whisper(&sender_tag(ctx), &message);
        let response = protocol
            .execute_command(&format!("tellraw {} {component}", player.name))
            .await?;

        Ok(respond(
            &response,
            format!(":white_check_mark: Sent **{}**: {message}", player.name),
        ))
    }
}

fn sender_tag(ctx: &CommandContext<'_>) -> String {
    match ctx.user.discriminator {
        0 => ctx.user.name.clone(),
        discriminator => format!("{}#{discriminator:04}", ctx.user.name),
    }
}

/// `Discord | <tag> whispers to you: <message>`
fn whisper(tag: &str, message: &str) -> Value {
    json!([
        { "text": "Discord", "bold": true, "italic": true, "color": "blue" },
        { "text": " | ", "italic": true, "color": "gray" },
        { "text": format!("{tag} whispers to you: {message}"), "italic": true, "color": "gray" },
    ])
}
