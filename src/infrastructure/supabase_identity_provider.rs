use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::{
        error::ProviderError,
        models::{
            identity::{AccountCreation, Identity, UserId},
            registration::{EmailAddress, Password},
        },
        services::identity_provider::IdentityProvider,
    },
    infrastructure::supabase_client::{SupabaseClient, error_from_response},
};

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Supabase Auth (GoTrue) sign-up
#[derive(Clone)]
pub struct SupabaseIdentityProvider {
    client: SupabaseClient,
    redirect_to: Option<String>,
}

impl SupabaseIdentityProvider {
    pub fn new(client: SupabaseClient, redirect_to: Option<String>) -> Self {
        Self {
            client,
            redirect_to,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn create_account(
        &self,
        email: &EmailAddress,
        password: &Password,
    ) -> Result<AccountCreation, ProviderError> {
        let mut request = self.client.post("auth/v1/signup").json(&SignUpRequest {
            email: email.as_str(),
            password: password.expose(),
        });
        if let Some(redirect_to) = &self.redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }

        let response = request.send().await.map_err(ProviderError::transport)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response.json().await.map_err(ProviderError::transport)?;
        let creation = account_from_body(&body)?;
        if creation == AccountCreation::PendingConfirmation {
            info!("sign-up accepted without a user id");
        }
        Ok(creation)
    }
}

// Autoconfirmed sign-ups answer `{ access_token, user: {..} }`, others the bare user.
fn account_from_body(body: &Value) -> Result<AccountCreation, ProviderError> {
    let user = body
        .get("user")
        .filter(|user| !user.is_null())
        .unwrap_or(body);

    let Some(raw_id) = user.get("id").and_then(Value::as_str) else {
        return Ok(AccountCreation::PendingConfirmation);
    };

    let uuid = Uuid::parse_str(raw_id).map_err(|_| ProviderError::Payload(body.clone()))?;
    Ok(AccountCreation::Created(Identity::new(UserId::from_uuid(uuid))))
}
