//! Discord OAuth2 for linked roles
//!
//! Users authorise the bot once through `/linked-role`. Their tokens are stored so the
//! `connectedaccount` role metadata can be updated whenever they link or unlink their
//! Minecraft account.

use crate::storage::{Tokens, UserSettingsConnections};
use chrono::Utc;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use twilight_model::id::{
    marker::{ApplicationMarker, UserMarker},
    Id,
};
use url::Url;

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const API_URL: &str = "https://discord.com/api/v10";

/// Discord doesn't always send `expires_in`, access tokens last a week
const DEFAULT_EXPIRY: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Role connection metadata key for "has a linked Minecraft account"
pub const CONNECTED_ACCOUNT: &str = "connectedaccount";

pub type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("Invalid OAuth URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Token request failed: {0}")]
    Token(String),

    #[error("Discord API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Discord responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("Discord did not return a refresh token")]
    MissingRefreshToken,
}

/// The fields of `/users/@me` the bot cares about
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscordUser {
    pub id: Id<UserMarker>,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl DiscordUser {
    /// `name#1234`, or just `name` for users without a discriminator
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(discriminator) if discriminator != "0" => {
                format!("{}#{discriminator}", self.username)
            }
            _ => self.username.clone(),
        }
    }
}

pub struct OAuth {
    client: OAuthClient,
    http: reqwest::Client,
    application_id: Id<ApplicationMarker>,
    api_url: String,
}

impl OAuth {
    pub fn new(
        application_id: Id<ApplicationMarker>,
        client_secret: &str,
        redirect_url: &str,
    ) -> Result<Self, OAuthError> {
        let client = BasicClient::new(ClientId::new(application_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(AuthUrl::new(AUTHORIZE_URL.to_string())?)
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::new(redirect_url.to_string())?);

        // Following redirects from the token endpoint would allow SSRF
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            http,
            application_id,
            api_url: API_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Where to send users, and the state to expect back on the callback
    pub fn login_url(&self) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("identify".to_string()))
            .add_scope(Scope::new("role_connections.write".to_string()))
            .url()
    }

    pub async fn exchange_code(&self, code: String) -> Result<Tokens, OAuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .map_err(|err| OAuthError::Token(err.to_string()))?;

        let refresh_token = response
            .refresh_token()
            .ok_or(OAuthError::MissingRefreshToken)?
            .secret()
            .clone();

        Ok(tokens(
            response.access_token().secret().clone(),
            refresh_token,
            response.expires_in(),
        ))
    }

    pub async fn refresh(&self, tokens: &Tokens) -> Result<Tokens, OAuthError> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(tokens.refresh_token.clone()))
            .request_async(&self.http)
            .await
            .map_err(|err| OAuthError::Token(err.to_string()))?;

        let refresh_token = response
            .refresh_token()
            .map(|token| token.secret().clone())
            .unwrap_or_else(|| tokens.refresh_token.clone());

        Ok(self::tokens(
            response.access_token().secret().clone(),
            refresh_token,
            response.expires_in(),
        ))
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<DiscordUser, OAuthError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Status(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Pushes the user's linked account to Discord, refreshing their tokens first if they
    /// expired. Returns `false` if the user never authorised the linked role.
    pub async fn update_role_connection(
        &self,
        user_settings: &UserSettingsConnections,
        id: Id<UserMarker>,
        username: Option<&str>,
    ) -> crate::Result<bool> {
        let Some(settings) = user_settings.get(id) else {
            return Ok(false);
        };

        let tokens = if settings.tokens.is_expired() {
            let tokens = self.refresh(&settings.tokens).await?;
            user_settings.upsert_tokens(id, tokens.clone()).await?;
            tokens
        } else {
            settings.tokens
        };

        let connected = u8::from(username.is_some());
        let body = json!({
            "platform_name": "Minecraft",
            "platform_username": username,
            "metadata": { CONNECTED_ACCOUNT: connected.to_string() },
        });

        let response = self
            .http
            .put(format!(
                "{}/users/@me/applications/{}/role-connection",
                self.api_url, self.application_id
            ))
            .bearer_auth(&tokens.access_token)
            .json(&body)
            .send()
            .await
            .map_err(OAuthError::from)?;

        if !response.status().is_success() {
            return Err(OAuthError::Status(response.status()).into());
        }

        tracing::debug!("Updated role connection of {id} (connected: {connected})");
        Ok(true)
    }

    /// Registers the role connection metadata server admins can require
    pub async fn register_metadata(&self, bot_token: &str) -> Result<(), OAuthError> {
        let body = json!([{
            "key": CONNECTED_ACCOUNT,
            "name": "Connected Account",
            "description": "Must have a Minecraft account linked with the bot",
            // BOOLEAN_EQUAL
            "type": 7,
        }]);

        let response = self
            .http
            .put(format!(
                "{}/applications/{}/role-connections/metadata",
                self.api_url, self.application_id
            ))
            .header("Authorization", format!("Bot {bot_token}"))
            .json(&body)
            .send()
            .await?;

        match response.status().is_success() {
            true => Ok(()),
            false => Err(OAuthError::Status(response.status())),
        }
    }
}

fn tokens(access_token: String, refresh_token: String, expires_in: Option<Duration>) -> Tokens {
    let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRY);

    Tokens {
        access_token,
        refresh_token,
        expires: Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::days(7)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{testing::temp_dir, Storage};
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, put},
        Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;
    use test_case::test_case;

    fn oauth() -> OAuth {
        OAuth::new(
            Id::new(712759741528408064),
            "secret",
            "http://localhost:3100/linked-role/callback",
        )
        .unwrap()
    }

    #[test]
    fn login_url_requests_linked_role_scopes() {
        let (url, state) = oauth().login_url();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(AUTHORIZE_URL));
        assert!(query.contains(&("client_id".to_string(), "712759741528408064".to_string())));
        assert!(query.contains(&(
            "scope".to_string(),
            "identify role_connections.write".to_string()
        )));
        assert!(query.contains(&("state".to_string(), state.secret().clone())));
    }

    #[test_case("Steve", Some("1234"), "Steve#1234" ; "Legacy tag")]
    #[test_case("steve", Some("0"), "steve" ; "Pomelo username")]
    #[test_case("steve", None, "steve" ; "No discriminator")]
    fn tags(username: &str, discriminator: Option<&str>, expected: &str) {
        let user = DiscordUser {
            id: Id::new(1),
            username: username.to_string(),
            discriminator: discriminator.map(str::to_string),
        };

        assert_eq!(user.tag(), expected);
    }

    /// Serves `/users/@me` and records role connection updates
    async fn fake_discord() -> (String, Arc<Mutex<Option<Value>>>) {
        let updates = Arc::new(Mutex::new(None));

        let router = Router::new()
            .route(
                "/users/@me",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").is_some_and(|value| value == "Bearer access") {
                        true => Ok(Json(json!({ "id": "5", "username": "steve", "discriminator": "0" }))),
                        false => Err(StatusCode::UNAUTHORIZED),
                    }
                }),
            )
            .route(
                "/users/@me/applications/{app}/role-connection",
                put({
                    let updates = updates.clone();
                    move |Path(_app): Path<u64>, Json(body): Json<Value>| async move {
                        *updates.lock() = Some(body);
                        StatusCode::OK
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        (url, updates)
    }

    #[tokio::test]
    async fn fetch_user() {
        let (url, _) = fake_discord().await;
        let oauth = oauth().with_api_url(url);

        let user = oauth.fetch_user("access").await.unwrap();
        assert_eq!(user.id, Id::new(5));
        assert!(matches!(
            oauth.fetch_user("wrong").await,
            Err(OAuthError::Status(reqwest::StatusCode::UNAUTHORIZED))
        ));
    }

    #[tokio::test]
    async fn role_connection_needs_stored_tokens() {
        let (url, updates) = fake_discord().await;
        let oauth = oauth().with_api_url(url);
        let storage = Storage::open(temp_dir()).await.unwrap();

        let updated = oauth
            .update_role_connection(&storage.user_settings, Id::new(5), Some("Steve"))
            .await
            .unwrap();
        assert!(!updated);
        assert!(updates.lock().is_none());

        storage
            .user_settings
            .upsert_tokens(
                Id::new(5),
                tokens("access".to_string(), "refresh".to_string(), None),
            )
            .await
            .unwrap();

        let updated = oauth
            .update_role_connection(&storage.user_settings, Id::new(5), Some("Steve"))
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(
            updates.lock().clone().unwrap(),
            json!({
                "platform_name": "Minecraft",
                "platform_username": "Steve",
                "metadata": { "connectedaccount": "1" },
            })
        );
    }
}
