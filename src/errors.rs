#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Config
    #[error(transparent)]
    Config(#[from] crate::config::EnvError),

    // Discord
    #[error("Discord request failed: {0}")]
    Http(#[from] twilight_http::Error),
    #[error("Could not deserialise Discord response: {0}")]
    Deserialize(#[from] twilight_http::response::DeserializeBodyError),
    #[error("Invalid Discord request: {0}")]
    Validation(#[from] twilight_validate::request::ValidationError),
    #[error("Invalid Discord message: {0}")]
    MessageValidation(#[from] twilight_validate::message::MessageValidationError),
    #[error("Could not parse interaction: {0}")]
    Interaction(#[from] twilight_interactions::error::ParseError),
    #[error(transparent)]
    Webhook(#[from] twilight_webhook::cache::Error),

    // Minecraft server
    #[error(transparent)]
    Protocol(#[from] crate::protocol::ProtocolError),

    // Linked roles
    #[error(transparent)]
    OAuth(#[from] crate::oauth::OAuthError),
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    // Storage and plumbing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    // Ctrl + C was pressed
    #[error("Process terminated by user")]
    Terminated,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
