use async_trait::async_trait;

use crate::domain::{
    error::ProviderError,
    models::{
        identity::AccountCreation,
        registration::{EmailAddress, Password},
    },
};

/// External service that owns user accounts and enforces email uniqueness
#[async_trait]
pub trait IdentityProvider {
    async fn create_account(
        &self,
        email: &EmailAddress,
        password: &Password,
    ) -> Result<AccountCreation, ProviderError>;
}
