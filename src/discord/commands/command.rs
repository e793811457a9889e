use super::{CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::payloads::PluginResponse;
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::guild::Permissions;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "command",
    desc = "Run a command on the Minecraft server",
    default_permissions = "permissions",
    dm_permission = false
)]
pub struct CommandCommand {
    /// The command, without the leading slash
    #[command(min_length = 1, max_length = 256)]
    command: String,
}

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

#[async_trait]
impl RunCommand for CommandCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let (_, protocol) = ctx.server()?;
        let command = self.command.trim().trim_start_matches('/');

        let response = protocol.execute_command(command).await?;

        Ok(respond(&response, format!("Executed `{command}`.")))
    }
}

/// The plugin's answer, as a warning if the command only partly worked
pub fn respond(response: &PluginResponse, fallback: String) -> CommandResponse {
    let message = response
        .message()
        .filter(|message| !message.trim().is_empty())
        .map_or(fallback, |message| format!("```\n{message}\n```"));

    match response.is_warning() {
        true => CommandResponse::Warning(message),
        false => CommandResponse::Success(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shows_plugin_message() {
        let response = PluginResponse::new(200, json!({ "message": "Set the time to 1000" }));

        assert!(matches!(
            respond(&response, "fallback".to_string()),
            CommandResponse::Success(message) if message.contains("Set the time to 1000")
        ));
    }

    #[test]
    fn warns_on_partial_content() {
        let response = PluginResponse::new(PluginResponse::WARNING, json!({ "message": "Unknown command" }));

        assert!(matches!(
            respond(&response, "fallback".to_string()),
            CommandResponse::Warning(_)
        ));
    }

    #[test]
    fn falls_back_without_message() {
        let response = PluginResponse::new(200, json!({}));

        assert!(matches!(
            respond(&response, "fallback".to_string()),
            CommandResponse::Success(message) if message == "fallback"
        ));
    }
}
