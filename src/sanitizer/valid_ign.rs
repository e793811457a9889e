use std::ops::Deref;

/// A string which could be a Minecraft username
///
/// Java usernames are 1-16 characters of `[A-Za-z0-9_]`. Bedrock players
/// joining through Floodgate carry a `.` prefix on top of that
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidIGN(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidIGN {
    #[error("usernames can't be empty")]
    Empty,
    #[error("usernames are at most 16 characters long")]
    TooLong,
    #[error("usernames can't contain `{0}`")]
    Character(char),
}

impl ValidIGN {
    /// Floodgate names a Bedrock player's Java profile with a `.` prefix
    pub fn is_bedrock(&self) -> bool {
        self.0.starts_with('.')
    }
}

impl TryFrom<&str> for ValidIGN {
    type Error = InvalidIGN;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        let name = value.strip_prefix('.').unwrap_or(value);

        if name.is_empty() {
            return Err(InvalidIGN::Empty);
        }
        if name.chars().count() > 16 {
            return Err(InvalidIGN::TooLong);
        }
        if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
            return Err(InvalidIGN::Character(c));
        }

        Ok(Self(value.to_string()))
    }
}

impl Deref for ValidIGN {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidIGN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
