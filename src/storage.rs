//! Per-guild and per-user JSON files under `DATA_DIR`, cached in memory
//!
//! ```text
//! servers/<guild_id>/connection.json
//! servers/<guild_id>/settings.json
//! users/<user_id>/connection.json
//! users/<user_id>/settings.json
//! ```

mod server;
mod settings;
mod user;

pub use server::{FtpCredentials, ServerConnection, ServerProtocol};
pub use settings::{DisableKind, Disabled, ServerSettings};
pub use user::{Tokens, UserConnection, UserSettings};

use crate::Result;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use twilight_model::id::{marker::GuildMarker, Id};

pub type ServerConnections = Records<ServerConnection>;
pub type ServerSettingsConnections = Records<ServerSettings>;
pub type UserConnections = Records<UserConnection>;
pub type UserSettingsConnections = Records<UserSettings>;

/// Everything the bot persists
pub struct Storage {
    dir: PathBuf,
    pub servers: ServerConnections,
    pub server_settings: ServerSettingsConnections,
    pub users: UserConnections,
    pub user_settings: UserSettingsConnections,
}

impl Storage {
    /// Loads every stored record below `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let servers_dir = dir.join("servers");
        let users_dir = dir.join("users");

        let storage = Self {
            servers: Records::load(&servers_dir).await?,
            server_settings: Records::load(&servers_dir).await?,
            users: Records::load(&users_dir).await?,
            user_settings: Records::load(&users_dir).await?,
            dir,
        };

        tracing::info!(
            "Loaded {} server connections and {} user connections from {}",
            storage.servers.len(),
            storage.users.len(),
            storage.dir.display()
        );

        Ok(storage)
    }

    /// Drops the guild's server connection together with its settings and directory,
    /// returning the connection
    pub async fn disconnect_server(&self, id: Id<GuildMarker>) -> Result<Option<ServerConnection>> {
        let removed = self.servers.evict(id);
        self.server_settings.evict(id);
        remove_dir(&self.dir.join("servers").join(id.to_string())).await?;

        Ok(removed)
    }
}

async fn remove_dir(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

/// A value stored as `<id>/<FILE_NAME>` inside its collection directory
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Marker;

    const FILE_NAME: &'static str;

    fn id(&self) -> Id<Self::Marker>;
}

/// A directory of [`Record`]s, mirrored in a [`DashMap`]
pub struct Records<T: Record> {
    dir: PathBuf,
    cache: DashMap<Id<T::Marker>, T>,
}

impl<T: Record> Records<T> {
    /// Reads every `<dir>/*/<FILE_NAME>`, skipping (and logging) unreadable ones
    pub async fn load(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let cache = DashMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(T::FILE_NAME);

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!("Could not read {}: {err}", path.display());
                    continue;
                }
            };

            match serde_json::from_slice::<T>(&bytes) {
                Ok(record) => {
                    cache.insert(record.id(), record);
                }
                Err(err) => tracing::warn!("Could not parse {}: {err}", path.display()),
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            cache,
        })
    }

    pub fn get(&self, id: Id<T::Marker>) -> Option<T> {
        self.cache.get(&id).map(|record| record.clone())
    }

    pub fn contains(&self, id: Id<T::Marker>) -> bool {
        self.cache.contains_key(&id)
    }

    /// The first cached record matching `predicate`
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.cache
            .iter()
            .find(|record| predicate(record.value()))
            .map(|record| record.value().clone())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Persists a record, replacing any previous one with the same id
    pub async fn connect(&self, record: T) -> Result<T> {
        self.write(&record).await?;
        self.cache.insert(record.id(), record.clone());

        Ok(record)
    }

    /// Applies `f` to the stored record and persists the result
    pub async fn edit(&self, id: Id<T::Marker>, f: impl FnOnce(&mut T)) -> Result<Option<T>> {
        let Some(mut record) = self.get(id) else {
            return Ok(None);
        };

        f(&mut record);
        self.connect(record).await.map(Some)
    }

    /// Removes the record from the cache and from disk, returning it
    pub async fn disconnect(&self, id: Id<T::Marker>) -> Result<Option<T>> {
        let removed = self.evict(id);

        match tokio::fs::remove_file(self.path(id)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(removed),
        }
    }

    fn evict(&self, id: Id<T::Marker>) -> Option<T> {
        self.cache.remove(&id).map(|(_, record)| record)
    }

    fn path(&self, id: Id<T::Marker>) -> PathBuf {
        self.dir.join(id.to_string()).join(T::FILE_NAME)
    }

    async fn write(&self, record: &T) -> Result<()> {
        let path = self.path(record.id());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, serde_json::to_vec_pretty(record)?).await?;
        tracing::trace!("Wrote {}", path.display());

        Ok(())
    }
}

/// Hex encoded SHA-256 of a plugin token, the only form tokens are matched by
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    /// A fresh, empty directory below the system temp dir
    pub fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("mclinker-{}", uuid::Uuid::new_v4()))
    }
}
