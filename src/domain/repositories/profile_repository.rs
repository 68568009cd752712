use async_trait::async_trait;

use crate::domain::{error::ProviderError, models::profile::ProfileRecord};

#[async_trait]
pub trait ProfileRepository {
    /// Insert a new profile row; `record.id` must be the identity's user id.
    async fn insert(&self, record: &ProfileRecord) -> Result<(), ProviderError>;
}
