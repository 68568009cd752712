use std::fmt;

use crate::domain::models::{identity::UserId, registration::Avatar};

/// Object key of an uploaded avatar: `{user_id}/{timestamp_millis}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn for_avatar(user_id: UserId, submitted_at_millis: i64, avatar: &Avatar) -> Self {
        Self(format!(
            "{}/{}.{}",
            user_id,
            submitted_at_millis,
            avatar.extension()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: StorageKey,
    pub public_url: String,
}
