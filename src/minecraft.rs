//! Minecraft data: player profiles, statistics and advancements

pub mod advancements;
pub mod stats;

use serde::Deserialize;
use uuid::Uuid;

const PROFILE_URL: &str = "https://api.mojang.com/users/profiles/minecraft";

/// A player as known to Mojang
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Hyphenated
    pub uuid: String,
    pub name: String,
}

#[derive(Deserialize)]
struct RawProfile {
    id: String,
    name: String,
}

/// Looks up a player by name, `None` if no such player exists
pub async fn fetch_profile(
    client: &reqwest::Client,
    name: &str,
) -> Result<Option<Profile>, reqwest::Error> {
    let response = client.get(format!("{PROFILE_URL}/{name}")).send().await?;

    // Unknown players get a 204 on older API versions and a 404 on newer ones
    if matches!(
        response.status(),
        reqwest::StatusCode::NO_CONTENT | reqwest::StatusCode::NOT_FOUND
    ) {
        return Ok(None);
    }

    let raw = response.error_for_status()?.json::<RawProfile>().await?;

    Ok(hyphenate(&raw.id).map(|uuid| Profile {
        uuid,
        name: raw.name,
    }))
}

/// `069a79f444e94726a5befca90e38aaf5` -> `069a79f4-44e9-4726-a5be-fca90e38aaf5`
pub fn hyphenate(uuid: &str) -> Option<String> {
    Uuid::parse_str(uuid)
        .ok()
        .map(|uuid| uuid.hyphenated().to_string())
}

/// Player head shown next to relayed messages
pub fn avatar_url(name: &str) -> String {
    format!("https://minotar.net/helm/{name}/64.png")
}

/// The minor version, which decides the layout of stats files
pub fn parse_version(version: &str) -> Option<u8> {
    version.trim().split('.').nth(1)?.parse().ok()
}
