use super::{ProtocolError, ProtocolResult, TIMEOUT};
use crate::payloads::{PluginResponse, ServerInfo};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use twilight_model::id::{marker::GuildMarker, Id};

/// The plugin's REST API, authorised with the token handed out on `/connect`
pub struct HttpProtocol {
    client: Client,
    base: String,
    token: String,
}

impl HttpProtocol {
    pub fn new(client: Client, ip: &str, port: u16, token: &str) -> Self {
        Self {
            client,
            base: base_url(ip, port),
            token: token.to_string(),
        }
    }

    /// Makes the plugin print a verification code to the server console
    pub async fn verify_guild(client: &Client, ip: &str, port: u16) -> ProtocolResult<()> {
        let request = client.get(format!("{}/verify/guild", base_url(ip, port)));
        send(request).await.map(|_| ())
    }

    /// Finishes the verification, the plugin remembers `token` from now on
    pub async fn connect(
        client: &Client,
        ip: &str,
        port: u16,
        code: &str,
        guild: Id<GuildMarker>,
        token: &str,
    ) -> ProtocolResult<ServerInfo> {
        let request = client
            .post(format!("{}/connect", base_url(ip, port)))
            .bearer_auth(code)
            .json(&json!({ "id": guild, "token": token }));

        let response = send(request).await?;
        Ok(serde_json::from_value(response.data)?)
    }

    pub(super) async fn request(&self, event: &str, data: Value) -> ProtocolResult<PluginResponse> {
        let request = self
            .client
            .post(format!("{}{}", self.base, route(event)))
            .bearer_auth(&self.token)
            .json(&data);

        send(request).await
    }

    pub(super) async fn get_file(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/file/get", self.base))
            .query(&[("path", remote_path)])
            .bearer_auth(&self.token)
            .timeout(TIMEOUT)
            .send()
            .await?;

        let (_, body) = checked(response).await?;
        Ok(body)
    }

    pub(super) async fn disconnect(&self) -> ProtocolResult<()> {
        let request = self
            .client
            .get(format!("{}/disconnect", self.base))
            .bearer_auth(&self.token);

        send(request).await.map(|_| ())
    }
}

fn base_url(ip: &str, port: u16) -> String {
    format!("http://{ip}:{port}")
}

fn route(event: &str) -> String {
    match event {
        "add-channel" => "/channels/add".to_string(),
        "remove-channel" => "/channels/remove".to_string(),
        event => format!("/{event}"),
    }
}

async fn send(request: RequestBuilder) -> ProtocolResult<PluginResponse> {
    into_response(request.timeout(TIMEOUT).send().await?).await
}

/// Reads the body as JSON, failing on non-2xx statuses
async fn into_response(response: Response) -> ProtocolResult<PluginResponse> {
    let (status, body) = checked(response).await?;

    let data = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    Ok(PluginResponse::new(status, data))
}

async fn checked(response: Response) -> ProtocolResult<(u16, Vec<u8>)> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        tracing::debug!(
            "Plugin responded with {status}: {}",
            String::from_utf8_lossy(&body)
        );

        let message = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|data| data.get("message")?.as_str().map(str::to_string));

        return Err(ProtocolError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok((status.as_u16(), body.to_vec()))
}
