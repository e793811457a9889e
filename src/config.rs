use once_cell::sync::OnceCell;
use std::{env::var, path::PathBuf};

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init(config: Config) {
    if CONFIG.set(config).is_err() {
        // The existing config isn't printed so as not to leak any secrets
        tracing::warn!("Config already initialized, keeping the first one");
    }
}

/// # Panics
/// If [`init`] hasn't been called yet
#[allow(clippy::expect_used)]
pub fn config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// OAuth2 client secret, used for linked roles
    pub client_secret: String,
    /// Absolute URL of `/linked-role/callback`, as registered in the developer portal
    pub linked_roles_redirect_url: String,

    pub bot_port: u16,
    pub plugin_version: String,
    pub data_dir: PathBuf,
    pub prefix: String,
    pub website_url: String,

    /// Register slash commands to this guild only instead of globally
    pub commands_guild_id: Option<u64>,
}

impl Config {
    pub fn new_from_env() -> Result<Config, EnvError> {
        Ok(Config {
            discord_token: required("DISCORD_TOKEN")?,
            client_secret: required("CLIENT_SECRET")?,
            linked_roles_redirect_url: required("LINKED_ROLES_REDIRECT_URL")?,
            bot_port: match var("BOT_PORT") {
                Ok(port) => port.parse()?,
                Err(_) => 3100,
            },
            plugin_version: var("PLUGIN_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            prefix: var("PREFIX").unwrap_or_else(|_| "^".to_string()),
            website_url: var("WEBSITE_URL").unwrap_or_else(|_| "https://mclinker.ml".to_string()),
            commands_guild_id: match var("COMMANDS_GUILD_ID") {
                Ok(id) => Some(id.parse()?),
                Err(_) => None,
            },
        })
    }
}

fn required(key: &str) -> Result<String, EnvError> {
    var(key).map_err(|error| match error {
        std::env::VarError::NotPresent => EnvError::Missing(key.to_string()),
        std::env::VarError::NotUnicode(_) => EnvError::Invalid(key.to_string()),
    })
}

#[derive(thiserror::Error, Debug)]
pub enum EnvError {
    #[error("Missing environment variable: {0:?}")]
    Missing(String),

    #[error("Invalid environment variable: {0:?}")]
    Invalid(String),
}

impl From<std::num::ParseIntError> for EnvError {
    fn from(error: std::num::ParseIntError) -> Self {
        EnvError::Invalid(error.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Initialises the global config with values pointing at `data_dir`, ignoring
    /// later calls
    pub fn init_test_config() {
        init(Config {
            discord_token: "token".to_string(),
            client_secret: "secret".to_string(),
            linked_roles_redirect_url: "http://localhost:3100/linked-role/callback".to_string(),
            bot_port: 3100,
            plugin_version: "1.0.0".to_string(),
            data_dir: std::env::temp_dir().join("mclinker-tests"),
            prefix: "^".to_string(),
            website_url: "https://mclinker.ml".to_string(),
            commands_guild_id: None,
        });
    }
}
