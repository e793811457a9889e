use super::{Record, Records};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twilight_model::id::{marker::UserMarker, Id};

/// A Discord user linked to a Minecraft account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConnection {
    pub id: Id<UserMarker>,
    /// Hyphenated
    pub uuid: String,
    pub username: String,
}

impl Record for UserConnection {
    type Marker = UserMarker;

    const FILE_NAME: &'static str = "connection.json";

    fn id(&self) -> Id<UserMarker> {
        self.id
    }
}

/// OAuth2 tokens of a user who authorised the linked role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub id: Id<UserMarker>,
    pub tokens: Tokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: DateTime<Utc>,
}

impl Tokens {
    pub fn is_expired(&self) -> bool {
        self.expires <= Utc::now()
    }
}

impl Record for UserSettings {
    type Marker = UserMarker;

    const FILE_NAME: &'static str = "settings.json";

    fn id(&self) -> Id<UserMarker> {
        self.id
    }
}

impl Records<UserSettings> {
    /// Stores fresh tokens for a user, whether or not they had any before
    pub async fn upsert_tokens(
        &self,
        id: Id<UserMarker>,
        tokens: Tokens,
    ) -> crate::Result<UserSettings> {
        self.connect(UserSettings { id, tokens }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{testing::temp_dir, Storage};
    use chrono::Duration;

    fn tokens(access: &str, expires_in: Duration) -> Tokens {
        Tokens {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            expires: Utc::now() + expires_in,
        }
    }

    #[test]
    fn expiry() {
        assert!(tokens("a", Duration::seconds(-1)).is_expired());
        assert!(!tokens("a", Duration::hours(1)).is_expired());
    }

    #[tokio::test]
    async fn upsert_replaces_tokens() {
        let storage = Storage::open(temp_dir()).await.unwrap();
        let id = Id::new(7);

        storage
            .user_settings
            .upsert_tokens(id, tokens("first", Duration::hours(1)))
            .await
            .unwrap();
        storage
            .user_settings
            .upsert_tokens(id, tokens("second", Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(
            storage.user_settings.get(id).unwrap().tokens.access_token,
            "second"
        );
    }

    #[tokio::test]
    async fn users_and_settings_share_a_directory() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).await.unwrap();
        let id = Id::new(7);

        storage
            .users
            .connect(UserConnection {
                id,
                uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_string(),
                username: "Notch".to_string(),
            })
            .await
            .unwrap();
        storage
            .user_settings
            .upsert_tokens(id, tokens("a", Duration::hours(1)))
            .await
            .unwrap();

        storage.users.disconnect(id).await.unwrap();

        let storage = Storage::open(&dir).await.unwrap();
        assert!(storage.users.get(id).is_none());
        assert!(storage.user_settings.get(id).is_some());
    }
}
