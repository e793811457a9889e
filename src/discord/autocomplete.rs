use crate::minecraft::advancements;
use twilight_model::application::{
    command::{CommandOptionChoice, CommandOptionChoiceValue},
    interaction::application_command::{CommandData, CommandDataOption, CommandOptionValue},
};

/// Discord shows at most this many choices
const MAX_CHOICES: usize = 25;

/// Answers autocomplete for the focused option of `data`
pub fn choices(data: &CommandData) -> anyhow::Result<Vec<CommandOptionChoice>> {
    let (name, value) = focused(&data.options)
        .ok_or_else(|| anyhow::anyhow!("No focused option in /{}", data.name))?;

    match name {
        "advancement" => Ok(advancement_choices(value)),
        _ => Err(anyhow::anyhow!(
            "Unexpected autocomplete option {name} in /{}",
            data.name
        )),
    }
}

fn focused(options: &[CommandDataOption]) -> Option<(&str, &str)> {
    options.iter().find_map(|option| match &option.value {
        CommandOptionValue::Focused(value, _) => Some((option.name.as_str(), value.as_str())),
        CommandOptionValue::SubCommand(options) | CommandOptionValue::SubCommandGroup(options) => {
            focused(options)
        }
        _ => None,
    })
}

/// Choices are named after the advancement, their value is its `category/id` key
pub fn advancement_choices(query: &str) -> Vec<CommandOptionChoice> {
    advancements::search(query)
        .into_iter()
        .take(MAX_CHOICES)
        .map(|advancement| CommandOptionChoice {
            name: advancement.name.to_string(),
            name_localizations: None,
            value: CommandOptionChoiceValue::String(advancement.key()),
        })
        .collect()
}
