use serde::{Deserialize, Serialize};

use crate::domain::models::{
    identity::UserId,
    registration::{Gender, RegistrationInput},
};

/// Durable profile row, keyed by the identity provider's user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub avatar_url: Option<String>,
}

impl ProfileRecord {
    pub fn new(user_id: UserId, input: &RegistrationInput, avatar_url: Option<String>) -> Self {
        Self {
            id: user_id,
            full_name: input.full_name().to_string(),
            email: input.email().as_str().to_string(),
            gender: input.gender(),
            avatar_url,
        }
    }
}
