use crate::{
    api::{self, ApiState},
    config,
    discord::Discord,
    errors::{Error, Result},
    oauth::OAuth,
    protocol::Protocols,
    storage::Storage,
};
use std::sync::Arc;
use twilight_http::Client as HttpClient;

/// Starts the API and the Discord bot, returning once either fails or Ctrl + C is pressed
pub async fn run() -> Result<()> {
    let http = Arc::new(HttpClient::new(config().discord_token.clone()));
    let application_id = Discord::fetch_application_id(&http).await?;

    let oauth = Arc::new(OAuth::new(
        application_id,
        &config().client_secret,
        &config().linked_roles_redirect_url,
    )?);
    let storage = Arc::new(Storage::open(&config().data_dir).await?);
    let protocols = Arc::new(Protocols::new());

    let (mut relay, from_plugins) = async_broadcast::broadcast(64);
    // Slow Discord requests drop the oldest events instead of stalling plugins
    relay.set_overflow(true);

    let discord = Arc::new(Discord::new(
        http,
        application_id,
        storage.clone(),
        protocols.clone(),
        oauth.clone(),
    ));
    discord.register_commands().await?;

    let state = ApiState {
        storage,
        protocols,
        oauth,
        relay,
    };

    tokio::try_join!(api::serve(state), discord.run(from_plugins), shutdown())?;

    Ok(())
}

async fn shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    Err(Error::Terminated)
}
