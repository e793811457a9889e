use super::{CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::{config, discord::{colours, reactions::Reaction}};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    application::command::{Command, CommandOptionType},
    channel::message::embed::EmbedField,
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFooterBuilder};

#[derive(CommandModel, CreateCommand)]
#[command(name = "help", desc = "Detailed description of all commands or one command")]
pub struct HelpCommand {
    /// The command to describe
    #[command(min_length = 1, max_length = 32)]
    command: Option<String>,
}

#[async_trait]
impl RunCommand for HelpCommand {
    async fn run(self, _: &CommandContext<'_>) -> CommandResult {
        let commands = super::all();

        let embed = match self.command {
            Some(name) => {
                let name = name.trim().trim_start_matches('/').to_lowercase();
                let Some(command) = commands.iter().find(|command| command.name == name) else {
                    return Err(CommandResponse::Failure(format!(
                        ":warning: There is no command called `/{name}`"
                    )));
                };

                describe(command)
            }
            None => overview(&commands),
        };

        Ok(CommandResponse::Embed(Box::new(embed)))
    }
}

fn overview(commands: &[Command]) -> twilight_model::channel::message::Embed {
    EmbedBuilder::new()
        .title("MC Linker Help")
        .description(format!(
            "Connect a Minecraft server with `/connect`, then relay its chat with `/chatchannel add`.\nMore at {}",
            config().website_url
        ))
        .field(EmbedField {
            name: "Commands".to_string(),
            value: commands
                .iter()
                .map(|command| format!("`/{}` {}", command.name, command.description))
                .collect::<Vec<_>>()
                .join("\n"),
            inline: false,
        })
        .field(EmbedField {
            name: "Reactions".to_string(),
            value: Reaction::all()
                .iter()
                .map(|reaction| format!("{} {}", reaction.emoji(), reaction.description()))
                .collect::<Vec<_>>()
                .join("\n"),
            inline: false,
        })
        .footer(EmbedFooterBuilder::new(format!(
            "Version {}",
            env!("CARGO_PKG_VERSION")
        )))
        .color(colours::GREEN)
        .build()
}

fn describe(command: &Command) -> twilight_model::channel::message::Embed {
    let mut usage = vec![format!("/{}", command.name)];
    let mut fields = Vec::new();

    for option in &command.options {
        match option.kind {
            CommandOptionType::SubCommand => {
                let arguments = option
                    .options
                    .iter()
                    .flatten()
                    .map(|argument| format!("<{}>", argument.name))
                    .collect::<Vec<_>>()
                    .join(" ");

                fields.push(EmbedField {
                    name: format!("/{} {} {arguments}", command.name, option.name),
                    value: option.description.clone(),
                    inline: false,
                });
            }
            _ => {
                let argument = match option.required {
                    Some(true) => format!("<{}>", option.name),
                    _ => format!("[{}]", option.name),
                };
                usage.push(argument);
                fields.push(EmbedField {
                    name: option.name.clone(),
                    value: option.description.clone(),
                    inline: true,
                });
            }
        }
    }

    let mut embed = EmbedBuilder::new()
        .title(format!("/{}", command.name))
        .description(format!("{}\n`{}`", command.description, usage.join(" ")))
        .color(colours::GREEN);

    for field in fields {
        embed = embed.field(field);
    }

    embed.build()
}
