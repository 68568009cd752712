use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier the identity provider assigns to a new account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to an account owned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: UserId,
}

impl Identity {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// Result of asking the identity provider for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCreation {
    Created(Identity),
    /// Accepted, but no identifier until the user confirms their email.
    PendingConfirmation,
}
