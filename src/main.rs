//! A Discord bot linking Minecraft servers to Discord guilds through a server plugin or
//! FTP/SFTP

mod api;
mod bridge;
mod config;
mod discord;
mod errors;
mod minecraft;
mod oauth;
mod payloads;
mod protocol;
mod sanitizer;
mod storage;

pub use config::config;
pub use errors::{Error, Result};

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,mclinker=debug")),
        )
        .init();

    match config::Config::new_from_env() {
        Ok(config) => config::init(config),
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    }

    match bridge::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Terminated) => ExitCode::from(130),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
