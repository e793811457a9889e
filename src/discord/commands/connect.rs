use super::{CommandContext, CommandResponse, CommandResult, RunCommand};
use crate::{
    minecraft::parse_version,
    protocol::{FtpProtocol, HttpProtocol, Protocol, Verified},
    storage::{hash_token, FtpCredentials, ServerConnection, ServerProtocol},
};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use std::time::Duration;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::guild::Permissions;

/// How long the plugin has to connect with the verification code
const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(180);

const DEFAULT_PLUGIN_PORT: u16 = 11111;
const DEFAULT_FTP_PORT: u16 = 21;
const DEFAULT_SFTP_PORT: u16 = 22;

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "connect",
    desc = "Connect your Minecraft server with the bot",
    default_permissions = "permissions",
    dm_permission = false
)]
pub enum ConnectCommand {
    #[command(name = "http")]
    Http(ConnectHttp),
    #[command(name = "websocket")]
    WebSocket(ConnectWebSocket),
    #[command(name = "ftp")]
    Ftp(ConnectFtp),
    #[command(name = "sftp")]
    Sftp(ConnectSftp),
}

fn permissions() -> Permissions {
    Permissions::ADMINISTRATOR
}

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "http",
    desc = "Connect to the plugin's REST API. Run without a code first to get one"
)]
pub struct ConnectHttp {
    /// The server's address, `ip:port`. The port defaults to 11111
    #[command(min_length = 1, max_length = 100)]
    ip: String,
    /// The code the plugin printed to the server console
    #[command(min_length = 1, max_length = 32)]
    code: Option<String>,
}

#[derive(CommandModel, CreateCommand)]
#[command(
    name = "websocket",
    desc = "Let the plugin connect to the bot, for servers behind a firewall"
)]
pub struct ConnectWebSocket;

#[derive(CommandModel, CreateCommand)]
#[command(name = "ftp", desc = "Connect over FTP, only stats and advancements work")]
pub struct ConnectFtp {
    /// The FTP server's address, `host:port`. The port defaults to 21
    #[command(min_length = 1, max_length = 100)]
    host: String,
    /// The FTP username
    #[command(min_length = 1, max_length = 100)]
    user: String,
    /// The FTP password
    #[command(min_length = 1, max_length = 100)]
    password: String,
    /// The world folder, relative to the FTP root
    #[command(min_length = 1, max_length = 200)]
    path: String,
    /// The server's Minecraft version, like 1.19.2
    #[command(min_length = 3, max_length = 10)]
    version: String,
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "sftp", desc = "Connect over SFTP, only stats and advancements work")]
pub struct ConnectSftp {
    /// The SFTP server's address, `host:port`. The port defaults to 22
    #[command(min_length = 1, max_length = 100)]
    host: String,
    /// The SFTP username
    #[command(min_length = 1, max_length = 100)]
    user: String,
    /// The SFTP password
    #[command(min_length = 1, max_length = 100)]
    password: String,
    /// The world folder, relative to the SFTP root
    #[command(min_length = 1, max_length = 200)]
    path: String,
    /// The server's Minecraft version, like 1.19.2
    #[command(min_length = 3, max_length = 10)]
    version: String,
}

#[async_trait]
impl RunCommand for ConnectCommand {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        match self {
            ConnectCommand::Http(command) => command.run(ctx).await,
            ConnectCommand::WebSocket(_) => connect_websocket(ctx).await,
            ConnectCommand::Ftp(command) => {
                connect_files(
                    ctx,
                    Files {
                        host: command.host,
                        user: command.user,
                        password: command.password,
                        path: command.path,
                        version: command.version,
                        secure: false,
                    },
                )
                .await
            }
            ConnectCommand::Sftp(command) => {
                connect_files(
                    ctx,
                    Files {
                        host: command.host,
                        user: command.user,
                        password: command.password,
                        path: command.path,
                        version: command.version,
                        secure: true,
                    },
                )
                .await
            }
        }
    }
}

impl ConnectHttp {
    async fn run(self, ctx: &CommandContext<'_>) -> CommandResult {
        let Some((ip, port)) = parse_address(&self.ip, DEFAULT_PLUGIN_PORT) else {
            return Err(invalid_address(&self.ip));
        };
        let client = ctx.discord.protocols.client();

        let Some(code) = self.code else {
            HttpProtocol::verify_guild(client, &ip, port).await?;

            return Ok(CommandResponse::Success(format!(
                "A verification code was printed to the server console. Run `/connect http ip:{ip}:{port} code:<code>` with it to finish connecting."
            )));
        };

        let token = generate_token();
        let info = HttpProtocol::connect(client, &ip, port, code.trim(), ctx.guild_id, &token)
            .await?;
        let version = parse_version(&info.version).ok_or_else(|| invalid_version(&info.version))?;

        store(
            ctx,
            ServerConnection {
                id: ctx.guild_id,
                ip,
                port,
                version,
                path: info.path,
                protocol: ServerProtocol::Http {
                    hash: hash_token(&token),
                    token,
                },
                channels: Vec::new(),
            },
        )
        .await
    }
}

async fn connect_websocket(ctx: &CommandContext<'_>) -> CommandResult {
    let sockets = &ctx.discord.protocols.sockets;
    let code = rand::thread_rng().gen_range(0..1_000_000).to_string();
    let verification = sockets.await_verification(ctx.guild_id, code.clone());

    if let Err(err) = ctx
        .update(CommandResponse::Warning(format!(
            "Run `/linker connect {guild}:{code}` in the server console within {minutes} minutes.",
            guild = ctx.guild_id,
            minutes = VERIFICATION_TIMEOUT.as_secs() / 60
        )))
        .await
    {
        tracing::warn!("Could not show the verification code: {err}");
    }

    let Verified { socket, handshake } =
        match tokio::time::timeout(VERIFICATION_TIMEOUT, verification).await {
            Ok(Ok(verified)) => verified,
            Ok(Err(_)) => {
                return Err(CommandResponse::Failure(
                    ":warning: This verification was replaced by a newer `/connect`.".to_string(),
                ))
            }
            Err(_) => {
                sockets.cancel_verification(ctx.guild_id);
                return Err(CommandResponse::Failure(
                    ":warning: The plugin did not connect in time.".to_string(),
                ));
            }
        };

    let address = handshake.ip.as_deref().unwrap_or_default();
    let Some((ip, port)) = parse_address(address, DEFAULT_PLUGIN_PORT) else {
        socket.close();
        return Err(invalid_address(address));
    };
    let version = handshake.version.as_deref().unwrap_or_default();
    let Some(version) = parse_version(version) else {
        socket.close();
        return Err(invalid_version(version));
    };

    let token = generate_token();
    socket.emit("auth-success", json!({ "token": token }))?;

    let response = store(
        ctx,
        ServerConnection {
            id: ctx.guild_id,
            ip,
            port,
            version,
            path: handshake.path.unwrap_or_else(|| "world".to_string()),
            protocol: ServerProtocol::WebSocket {
                hash: hash_token(&token),
            },
            channels: Vec::new(),
        },
    )
    .await?;

    sockets.register(ctx.guild_id, socket);

    Ok(response)
}

struct Files {
    host: String,
    user: String,
    password: String,
    path: String,
    version: String,
    secure: bool,
}

async fn connect_files(ctx: &CommandContext<'_>, files: Files) -> CommandResult {
    let default_port = match files.secure {
        true => DEFAULT_SFTP_PORT,
        false => DEFAULT_FTP_PORT,
    };
    let Some((host, port)) = parse_address(&files.host, default_port) else {
        return Err(invalid_address(&files.host));
    };
    let version = parse_version(&files.version).ok_or_else(|| invalid_version(&files.version))?;

    let credentials = FtpCredentials {
        user: files.user,
        password: files.password,
    };
    let (ftp, protocol) = match files.secure {
        true => (
            FtpProtocol::sftp(&host, port, credentials.clone()),
            ServerProtocol::Sftp(credentials),
        ),
        false => (
            FtpProtocol::ftp(&host, port, credentials.clone()),
            ServerProtocol::Ftp(credentials),
        ),
    };

    if let Err(err) = Protocol::test_ftp(&ftp).await {
        return Err(CommandResponse::Failure(format!(
            ":warning: Could not log in to `{host}:{port}`: {err}"
        )));
    }

    store(
        ctx,
        ServerConnection {
            id: ctx.guild_id,
            ip: host,
            port,
            version,
            path: files.path.trim_matches('/').to_string(),
            protocol,
            channels: Vec::new(),
        },
    )
    .await
}

/// Replaces the guild's server, telling a previous plugin to forget the bot
async fn store(ctx: &CommandContext<'_>, server: ServerConnection) -> CommandResult {
    if let Some((old, protocol)) = ctx.discord.server(ctx.guild_id) {
        if old.protocol.has_plugin() && (old.ip != server.ip || old.port != server.port) {
            if let Err(err) = protocol.disconnect().await {
                tracing::debug!("Could not disconnect the previous server of {}: {err}", ctx.guild_id);
            }
        }
    }

    let server = ctx.discord.storage.servers.connect(server).await?;
    tracing::info!(
        "Connected {} to {}:{} over {}",
        ctx.guild_id,
        server.ip,
        server.port,
        server.protocol.name()
    );

    Ok(CommandResponse::Success(format!(
        ":white_check_mark: Connected to the server `{}:{}` over {}.",
        server.ip,
        server.port,
        server.protocol.name()
    )))
}

/// Splits `host:port`, using `default_port` if there's none
fn parse_address(input: &str, default_port: u16) -> Option<(String, u16)> {
    let input = input.trim();

    let (host, port) = match input.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (input, default_port),
    };

    match host.is_empty() || host.contains(char::is_whitespace) {
        true => None,
        false => Some((host.to_string(), port)),
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn invalid_address(input: &str) -> CommandResponse {
    CommandResponse::Failure(format!(":warning: `{input}` is not a valid address"))
}

fn invalid_version(input: &str) -> CommandResponse {
    CommandResponse::Failure(format!(
        ":warning: `{input}` is not a valid Minecraft version, use one like `1.19.2`"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("play.example.com", 21, Some(("play.example.com", 21)) ; "Default port")]
    #[test_case("127.0.0.1:25585", 21, Some(("127.0.0.1", 25585)) ; "Explicit port")]
    #[test_case(" 127.0.0.1:11111 ", 21, Some(("127.0.0.1", 11111)) ; "Padded")]
    #[test_case("127.0.0.1:port", 21, None ; "Invalid port")]
    #[test_case("127.0.0.1:99999", 21, None ; "Port out of range")]
    #[test_case(":25565", 21, None ; "No host")]
    #[test_case("my server", 21, None ; "Whitespace")]
    fn parses_addresses(input: &str, default_port: u16, expected: Option<(&str, u16)>) {
        assert_eq!(
            parse_address(input, default_port),
            expected.map(|(host, port)| (host.to_string(), port))
        );
    }

    #[test]
    fn tokens_are_random() {
        let token = generate_token();

        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }
}
