//! The enable/disable buttons below `/enable` and `/disable` replies

use super::{commands::CommandResponse, Discord};
use crate::{storage::DisableKind, Result};
use std::{fmt, str::FromStr};
use strum::IntoEnumIterator;
use twilight_model::{
    application::interaction::{message_component::MessageComponentInteractionData, Interaction},
    channel::message::{
        component::{ActionRow, Button, ButtonStyle},
        Component, MessageFlags,
    },
    guild::Permissions,
    http::interaction::{InteractionResponse, InteractionResponseType},
    id::{marker::GuildMarker, Id},
};
use twilight_util::builder::InteractionResponseDataBuilder;

/// Turns `name` of `kind` on or off, encoded in a button's custom id as
/// `enable_<kind>_<name>` or `disable_<kind>_<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub enable: bool,
    pub kind: DisableKind,
    pub name: String,
}

impl Toggle {
    pub fn new(enable: bool, kind: DisableKind, name: impl Into<String>) -> Self {
        Self {
            enable,
            kind,
            name: name.into(),
        }
    }

    /// The toggle undoing this one
    pub fn opposite(&self) -> Self {
        Self::new(!self.enable, self.kind, self.name.clone())
    }

    pub fn action_row(&self) -> Component {
        let (label, style) = match self.enable {
            true => ("Enable", ButtonStyle::Success),
            false => ("Disable", ButtonStyle::Danger),
        };

        Component::ActionRow(ActionRow {
            components: vec![Component::Button(Button {
                custom_id: Some(self.to_string()),
                disabled: false,
                emoji: None,
                label: Some(label.to_string()),
                style,
                url: None,
            })],
        })
    }

    /// Applies the toggle to the guild's settings
    pub async fn apply(&self, discord: &Discord, guild_id: Id<GuildMarker>) -> Result<CommandResponse> {
        let changed = discord
            .storage
            .server_settings
            .update(guild_id, |settings| match self.enable {
                true => settings.enable(self.kind, &self.name),
                false => settings.disable(self.kind, &self.name),
            })
            .await?;

        let state = match self.enable {
            true => "enabled",
            false => "disabled",
        };

        if !changed {
            return Ok(CommandResponse::Failure(format!(
                ":warning: {} [**{}**] is already {state}.",
                self.kind_label(),
                self.name
            )));
        }

        tracing::info!("{} {} {} in {guild_id}", state, self.kind, self.name);

        Ok(CommandResponse::toggled(
            format!(
                ":white_check_mark: Successfully {state} {} [**{}**].",
                self.kind_label(),
                self.name
            ),
            self.opposite(),
        ))
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            DisableKind::Commands => "command",
            DisableKind::ChatCommands => "chat command",
            DisableKind::Stats => "stat",
            DisableKind::Advancements => "advancement",
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.enable {
            true => "enable",
            false => "disable",
        };

        write!(f, "{action}_{}_{}", self.kind, self.name)
    }
}

impl FromStr for Toggle {
    type Err = ();

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let (enable, rest) = if let Some(rest) = id.strip_prefix("enable_") {
            (true, rest)
        } else if let Some(rest) = id.strip_prefix("disable_") {
            (false, rest)
        } else {
            return Err(());
        };

        // Kinds contain underscores themselves, so match them as prefixes
        DisableKind::iter()
            .find_map(|kind| {
                let name = rest.strip_prefix(&format!("{kind}_"))?;
                (!name.is_empty()).then(|| Self::new(enable, kind, name))
            })
            .ok_or(())
    }
}

/// Handles a click on a toggle button, only admins may press them
pub async fn handle(
    discord: &Discord,
    interaction: &Interaction,
    guild_id: Id<GuildMarker>,
    data: &MessageComponentInteractionData,
) -> Result<()> {
    let response = match data.custom_id.parse::<Toggle>() {
        Err(()) => {
            tracing::warn!("Unknown button pressed: {}", data.custom_id);
            return Ok(());
        }
        Ok(_) if !is_admin(interaction) => CommandResponse::Failure(
            ":no_entry: You need the Administrator permission to use this button.".to_string(),
        ),
        Ok(toggle) => toggle.apply(discord, guild_id).await?,
    };

    let (embed, components) = response.into_parts();

    discord
        .http
        .interaction(discord.application_id)
        .create_response(
            interaction.id,
            &interaction.token,
            &InteractionResponse {
                kind: InteractionResponseType::ChannelMessageWithSource,
                data: Some(
                    InteractionResponseDataBuilder::new()
                        .embeds([embed])
                        .components(components)
                        .flags(MessageFlags::EPHEMERAL)
                        .build(),
                ),
            },
        )
        .await?;

    Ok(())
}

fn is_admin(interaction: &Interaction) -> bool {
    interaction
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.contains(Permissions::ADMINISTRATOR))
}
