use async_trait::async_trait;

use crate::domain::{error::ProviderError, models::asset::StorageKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Cache lifetime hint in seconds
    pub cache_control: String,
    /// Overwrite an existing object under the same key
    pub upsert: bool,
    pub content_type: String,
}

/// Binary asset storage with publicly resolvable objects
#[async_trait]
pub trait ObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &StorageKey,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<(), ProviderError>;

    fn public_url(&self, bucket: &str, key: &StorageKey) -> String;
}
