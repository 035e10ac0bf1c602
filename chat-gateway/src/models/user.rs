use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// The device registration for a user. One per user; re-subscribing replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserToken {
    pub user_id: i64,
    pub token: String,
}

/// What a login carrying `oldUsername` does to the old account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Move the old user's messages to the new name, then delete the old user.
    #[default]
    Transfer,
    /// Rename the old user record in place; messages keep their old sender.
    Rename,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::Transfer => write!(f, "transfer"),
            MergeStrategy::Rename => write!(f, "rename"),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(MergeStrategy::Transfer),
            "rename" => Ok(MergeStrategy::Rename),
            other => Err(format!(
                "unknown merge strategy '{}', expected 'transfer' or 'rename'",
                other
            )),
        }
    }
}
